//! src/routes/auth/login.rs

use crate::authentication::{CurrentUser, UserManager};
use crate::error::{ApiResult, Error, ErrorCode};
use actix_web::{web, HttpResponse};
use secrecy::Secret;

/// OAuth2 password form; `username` holds the email.
#[derive(serde::Deserialize)]
pub struct LoginForm {
    username: String,
    password: Secret<String>,
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct BearerResponse {
    pub access_token: String,
    pub token_type: String,
}

#[tracing::instrument(
    skip(form, manager),
    fields(username = %form.username, user_id = tracing::field::Empty)
)]
pub async fn login(form: web::Form<LoginForm>, manager: UserManager) -> ApiResult<HttpResponse> {
    let LoginForm { username, password } = form.0;
    let user = match manager.authenticate(&username, password).await? {
        Some(user) if user.is_active => user,
        _ => return Err(Error::Rejected(ErrorCode::LoginBadCredentials)),
    };
    tracing::Span::current().record("user_id", tracing::field::display(&user.id));
    if !user.is_verified {
        return Err(Error::Rejected(ErrorCode::LoginUserNotVerified));
    }
    let token = manager.write_access_token(&user).await?;
    Ok(HttpResponse::Ok().json(BearerResponse {
        access_token: token.token,
        token_type: "bearer".to_string(),
    }))
}

#[tracing::instrument(skip(current_user, manager), fields(user_id = %current_user.id))]
pub async fn logout(
    current_user: web::ReqData<CurrentUser>,
    manager: UserManager,
) -> ApiResult<HttpResponse> {
    manager.destroy_access_token(&current_user.token).await?;
    Ok(HttpResponse::NoContent().finish())
}
