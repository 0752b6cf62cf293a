//! src/routes/auth/register.rs

use crate::authentication::{UserManager, UserManagerError};
use crate::domain::{NewUser, PersonName, UserEmail, UserRead, ValidationError};
use crate::error::{ApiResult, Error, ErrorCode};
use actix_web::{web, HttpResponse};
use secrecy::Secret;

#[derive(serde::Deserialize)]
pub struct RegisterData {
    email: String,
    password: Secret<String>,
    first_name: String,
    last_name: String,
}

impl TryFrom<RegisterData> for NewUser {
    type Error = ValidationError;

    fn try_from(value: RegisterData) -> Result<Self, Self::Error> {
        Ok(Self {
            email: UserEmail::parse(value.email)?,
            password: value.password,
            first_name: PersonName::parse(value.first_name)?,
            last_name: PersonName::parse(value.last_name)?,
        })
    }
}

#[tracing::instrument(
    name = "Register user",
    skip(body, manager),
    fields(user_email = %body.email)
)]
pub async fn register(
    body: web::Json<RegisterData>,
    manager: UserManager,
) -> ApiResult<HttpResponse> {
    let new_user: NewUser = body.0.try_into()?;
    let user = manager.create(new_user).await.map_err(|e| match e {
        UserManagerError::InvalidPassword(violation) => Error::InvalidPassword {
            code: ErrorCode::RegisterInvalidPassword,
            reason: violation.to_string(),
        },
        UserManagerError::UserAlreadyExists => {
            Error::Rejected(ErrorCode::RegisterUserAlreadyExists)
        }
        e => e.into(),
    })?;
    Ok(HttpResponse::Created().json(UserRead::from(user)))
}
