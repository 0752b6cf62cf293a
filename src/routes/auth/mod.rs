//! src/routes/auth/mod.rs

mod login;
mod register;
mod reset;
mod verify;

pub use login::*;
pub use register::*;
pub use reset::*;
pub use verify::*;

/// Body of the endpoints that only take an email.
#[derive(serde::Deserialize, Debug)]
pub struct EmailBody {
    pub email: String,
}
