//! src/routes/auth/reset.rs

use super::EmailBody;
use crate::authentication::{UserManager, UserManagerError};
use crate::domain::UserEmail;
use crate::error::{ApiResult, Error, ErrorCode};
use actix_web::{web, HttpResponse};
use secrecy::Secret;
use serde_json::Value;

#[derive(serde::Deserialize)]
pub struct ResetPasswordBody {
    token: String,
    password: Secret<String>,
}

#[tracing::instrument(name = "Forgot password", skip(body, manager))]
pub async fn forgot_password(
    body: web::Json<EmailBody>,
    manager: UserManager,
) -> ApiResult<HttpResponse> {
    let email = UserEmail::parse(body.0.email)?;
    manager.forgot_password(email.as_ref()).await?;
    Ok(HttpResponse::Accepted().json(Value::Null))
}

#[tracing::instrument(name = "Reset password", skip(body, manager))]
pub async fn reset_password(
    body: web::Json<ResetPasswordBody>,
    manager: UserManager,
) -> ApiResult<HttpResponse> {
    let ResetPasswordBody { token, password } = body.0;
    manager
        .reset_password(&token, password)
        .await
        .map_err(|e| match e {
            UserManagerError::BadToken => Error::Rejected(ErrorCode::ResetPasswordBadToken),
            UserManagerError::InvalidPassword(violation) => Error::InvalidPassword {
                code: ErrorCode::ResetPasswordInvalidPassword,
                reason: violation.to_string(),
            },
            e => e.into(),
        })?;
    Ok(HttpResponse::Ok().json(Value::Null))
}
