//! src/error.rs

use crate::authentication::UserManagerError;
use crate::domain::ValidationError;
use actix_web::http::{header, header::HeaderValue, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;

pub type ApiResult<T> = Result<T, Error>;

pub fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        current = cause.source();
    }
    Ok(())
}

/// Machine readable codes returned in `detail`.
#[derive(serde::Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    RegisterInvalidPassword,
    RegisterUserAlreadyExists,
    LoginBadCredentials,
    LoginUserNotVerified,
    ResetPasswordBadToken,
    ResetPasswordInvalidPassword,
    VerifyUserBadToken,
    VerifyUserAlreadyVerified,
    UpdateUserEmailAlreadyExists,
    UpdateUserInvalidPassword,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::RegisterInvalidPassword => "REGISTER_INVALID_PASSWORD",
            ErrorCode::RegisterUserAlreadyExists => "REGISTER_USER_ALREADY_EXISTS",
            ErrorCode::LoginBadCredentials => "LOGIN_BAD_CREDENTIALS",
            ErrorCode::LoginUserNotVerified => "LOGIN_USER_NOT_VERIFIED",
            ErrorCode::ResetPasswordBadToken => "RESET_PASSWORD_BAD_TOKEN",
            ErrorCode::ResetPasswordInvalidPassword => "RESET_PASSWORD_INVALID_PASSWORD",
            ErrorCode::VerifyUserBadToken => "VERIFY_USER_BAD_TOKEN",
            ErrorCode::VerifyUserAlreadyVerified => "VERIFY_USER_ALREADY_VERIFIED",
            ErrorCode::UpdateUserEmailAlreadyExists => "UPDATE_USER_EMAIL_ALREADY_EXISTS",
            ErrorCode::UpdateUserInvalidPassword => "UPDATE_USER_INVALID_PASSWORD",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error)]
pub enum Error {
    #[error("{code}: {reason}")]
    InvalidPassword { code: ErrorCode, reason: String },
    #[error("{0}")]
    Rejected(ErrorCode),
    #[error(transparent)]
    ValidationError(#[from] ValidationError),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden")]
    Forbidden,
    #[error("Not Found")]
    NotFound,
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl From<UserManagerError> for Error {
    fn from(e: UserManagerError) -> Self {
        // flow errors carry a route specific code and are mapped by the handlers
        Error::UnexpectedError(anyhow::Error::new(e))
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidPassword { .. } | Error::Rejected(_) => StatusCode::BAD_REQUEST,
            Error::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::UnexpectedError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let detail = match self {
            Error::InvalidPassword { code, reason } => json!({ "code": code, "reason": reason }),
            Error::Rejected(code) => json!(code),
            Error::UnexpectedError(_) => json!("Internal Server Error"),
            other => json!(other.to_string()),
        };
        let mut response = HttpResponse::build(self.status_code());
        if let Error::Unauthorized = self {
            response.insert_header((header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer")));
        }
        response.json(json!({ "detail": detail }))
    }
}
