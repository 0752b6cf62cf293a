//! src/routes/users/me.rs

use super::{update_error, UserUpdateBody};
use crate::authentication::{CurrentUser, UserManager};
use crate::domain::{UserRead, UserUpdate};
use crate::error::ApiResult;
use actix_web::{web, HttpResponse};

#[tracing::instrument(name = "Read own profile", skip_all, fields(user_id = %current_user.id))]
pub async fn get_me(current_user: web::ReqData<CurrentUser>) -> HttpResponse {
    HttpResponse::Ok().json(UserRead::from(current_user.into_inner().user))
}

#[tracing::instrument(name = "Update own profile", skip_all, fields(user_id = %current_user.id))]
pub async fn patch_me(
    current_user: web::ReqData<CurrentUser>,
    body: web::Json<UserUpdateBody>,
    manager: UserManager,
) -> ApiResult<HttpResponse> {
    let update: UserUpdate = body.0.try_into()?;
    let user = manager
        .update(current_user.into_inner().user, update, true)
        .await
        .map_err(update_error)?;
    Ok(HttpResponse::Ok().json(UserRead::from(user)))
}
