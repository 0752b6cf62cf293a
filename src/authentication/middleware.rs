//! src/authentication/middleware.rs

use crate::authentication::token_db::read_token;
use crate::domain::User;
use crate::error::Error;
use actix_web::{
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    http::header::Header,
    web, HttpMessage,
};
use actix_web_httpauth::headers::authorization::{Authorization, Bearer};
use actix_web_lab::middleware::Next;
use anyhow::Context;
use sqlx::PgPool;
use std::ops::Deref;

/// Authenticated user of the current request, with the bearer token it presented.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub token: String,
}

impl Deref for CurrentUser {
    type Target = User;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

/// Token of the `Authorization: Bearer <token>` header, 401 if absent or malformed.
fn access_token(req: &ServiceRequest) -> Result<String, Error> {
    let credentials = Authorization::<Bearer>::parse(req).map_err(|_| Error::Unauthorized)?;
    Ok(credentials.into_scheme().token().to_string())
}

/// Lets through active and verified users only.
pub async fn reject_anonymous_users(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, actix_web::Error> {
    let token = access_token(&req)?;
    let pool = req
        .app_data::<web::Data<PgPool>>()
        .context("Database pool is not registered.")
        .map_err(Error::from)?
        .clone();
    let user = read_token(pool.get_ref(), &token)
        .await
        .context("Failed to look up access token.")
        .map_err(Error::from)?
        .filter(|user| user.is_active)
        .ok_or(Error::Unauthorized)?;
    if !user.is_verified {
        return Err(Error::Forbidden.into());
    }
    req.extensions_mut().insert(CurrentUser { user, token });
    next.call(req).await
}
