//! src/routes/auth/verify.rs

use super::EmailBody;
use crate::authentication::{UserManager, UserManagerError};
use crate::domain::{UserEmail, UserRead};
use crate::error::{ApiResult, Error, ErrorCode};
use actix_web::{web, HttpResponse};
use serde_json::Value;

#[derive(serde::Deserialize)]
pub struct TokenBody {
    token: String,
}

/// Always accepted, whether or not the email is registered.
#[tracing::instrument(name = "Request verify token", skip(body, manager))]
pub async fn request_verify_token(
    body: web::Json<EmailBody>,
    manager: UserManager,
) -> ApiResult<HttpResponse> {
    let email = UserEmail::parse(body.0.email)?;
    manager.request_verify(email.as_ref()).await?;
    Ok(HttpResponse::Accepted().json(Value::Null))
}

#[tracing::instrument(name = "Verify user", skip(body, manager))]
pub async fn verify(body: web::Json<TokenBody>, manager: UserManager) -> ApiResult<HttpResponse> {
    let user = manager.verify(&body.token).await.map_err(|e| match e {
        UserManagerError::BadToken => Error::Rejected(ErrorCode::VerifyUserBadToken),
        UserManagerError::AlreadyVerified => {
            Error::Rejected(ErrorCode::VerifyUserAlreadyVerified)
        }
        e => e.into(),
    })?;
    Ok(HttpResponse::Ok().json(UserRead::from(user)))
}
