//! src/routes/users/mod.rs

mod admin;
mod me;

pub use admin::*;
pub use me::*;

use crate::authentication::UserManagerError;
use crate::domain::{PersonName, UserEmail, UserUpdate, ValidationError};
use crate::error::{Error, ErrorCode};
use secrecy::Secret;

/// Partial user update. Status flags are honoured on the superuser routes only.
#[derive(serde::Deserialize, Default)]
pub struct UserUpdateBody {
    email: Option<String>,
    password: Option<Secret<String>>,
    first_name: Option<String>,
    last_name: Option<String>,
    is_active: Option<bool>,
    is_superuser: Option<bool>,
    is_verified: Option<bool>,
}

impl TryFrom<UserUpdateBody> for UserUpdate {
    type Error = ValidationError;

    fn try_from(value: UserUpdateBody) -> Result<Self, Self::Error> {
        Ok(Self {
            email: value.email.map(UserEmail::parse).transpose()?,
            password: value.password,
            first_name: value.first_name.map(PersonName::parse).transpose()?,
            last_name: value.last_name.map(PersonName::parse).transpose()?,
            is_active: value.is_active,
            is_superuser: value.is_superuser,
            is_verified: value.is_verified,
        })
    }
}

fn update_error(e: UserManagerError) -> Error {
    match e {
        UserManagerError::UserAlreadyExists => {
            Error::Rejected(ErrorCode::UpdateUserEmailAlreadyExists)
        }
        UserManagerError::InvalidPassword(violation) => Error::InvalidPassword {
            code: ErrorCode::UpdateUserInvalidPassword,
            reason: violation.to_string(),
        },
        e => e.into(),
    }
}
