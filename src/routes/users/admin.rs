//! src/routes/users/admin.rs

use super::{update_error, UserUpdateBody};
use crate::authentication::{CurrentUser, UserManager};
use crate::domain::{User, UserRead, UserUpdate};
use crate::error::{ApiResult, Error};
use actix_web::{web, HttpResponse};
use uuid::Uuid;

async fn target_user(
    current_user: &CurrentUser,
    manager: &UserManager,
    user_id: Uuid,
) -> ApiResult<User> {
    if !current_user.is_superuser {
        return Err(Error::Forbidden);
    }
    manager.get(user_id).await?.ok_or(Error::NotFound)
}

#[tracing::instrument(name = "Get user", skip(current_user, manager))]
pub async fn get_user(
    current_user: web::ReqData<CurrentUser>,
    path: web::Path<Uuid>,
    manager: UserManager,
) -> ApiResult<HttpResponse> {
    let user = target_user(&current_user, &manager, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(UserRead::from(user)))
}

#[tracing::instrument(name = "Update user", skip(current_user, body, manager))]
pub async fn patch_user(
    current_user: web::ReqData<CurrentUser>,
    path: web::Path<Uuid>,
    body: web::Json<UserUpdateBody>,
    manager: UserManager,
) -> ApiResult<HttpResponse> {
    let user = target_user(&current_user, &manager, path.into_inner()).await?;
    let update: UserUpdate = body.0.try_into()?;
    let user = manager
        .update(user, update, false)
        .await
        .map_err(update_error)?;
    Ok(HttpResponse::Ok().json(UserRead::from(user)))
}

#[tracing::instrument(name = "Delete user", skip(current_user, manager))]
pub async fn delete_user(
    current_user: web::ReqData<CurrentUser>,
    path: web::Path<Uuid>,
    manager: UserManager,
) -> ApiResult<HttpResponse> {
    let user = target_user(&current_user, &manager, path.into_inner()).await?;
    manager.delete(user).await?;
    Ok(HttpResponse::NoContent().finish())
}
