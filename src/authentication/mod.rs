//! src/authentication/mod.rs

mod manager;
mod middleware;
mod password;
mod token_db;
mod tokens;
mod user_db;

pub use manager::{UserManager, UserManagerError};
pub use middleware::{reject_anonymous_users, CurrentUser};
pub use password::{
    compute_password_hash, hash_password, validate_password, verify_password,
    PasswordPolicyViolation, MIN_PASSWORD_LENGTH,
};
pub use token_db::ACCESS_TOKEN_LIFETIME;
pub use tokens::{TokenSigner, RESET_AUDIENCE, TOKEN_LIFETIME, VERIFY_AUDIENCE};
