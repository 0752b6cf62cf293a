//! src/domain/mod.rs

mod access_token;
mod new_user;
mod person_name;
mod user;
mod user_email;
mod user_update;

pub use access_token::AccessToken;
pub use new_user::NewUser;
pub use person_name::PersonName;
pub use user::{User, UserRead};
pub use user_email::UserEmail;
pub use user_update::UserUpdate;

/// Validation error for domain data
#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("`{0}` is not a valid email.")]
    InvalidEmail(String),
    #[error("`{0}` is not a valid name.")]
    InvalidName(String),
    #[error("{0}")]
    MalformedBody(String),
}
