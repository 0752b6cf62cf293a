//! src/authentication/token_db.rs

use crate::domain::{AccessToken, User};
use chrono::{TimeDelta, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

/// Access tokens older than this are ignored, in seconds.
pub const ACCESS_TOKEN_LIFETIME: i64 = 3600;

/// Store `token` for the user, replacing the token of a previous login.
#[tracing::instrument(name = "Write access token", skip(executor, token))]
pub async fn write_token<'e, E: PgExecutor<'e>>(
    executor: E,
    user_id: Uuid,
    token: &str,
) -> Result<AccessToken, sqlx::Error> {
    sqlx::query_as::<_, AccessToken>(
        r#"
        INSERT INTO access_tokens (token, user_id, created_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id) DO UPDATE
        SET token = EXCLUDED.token, created_at = EXCLUDED.created_at
        RETURNING token, user_id, created_at
        "#,
    )
    .bind(token)
    .bind(user_id)
    .bind(Utc::now())
    .fetch_one(executor)
    .await
}

/// Owner of a token that has not yet expired.
#[tracing::instrument(name = "Read access token", skip(executor, token))]
pub async fn read_token<'e, E: PgExecutor<'e>>(
    executor: E,
    token: &str,
) -> Result<Option<User>, sqlx::Error> {
    let oldest = Utc::now() - TimeDelta::seconds(ACCESS_TOKEN_LIFETIME);
    sqlx::query_as::<_, User>(
        r#"
        SELECT u.id, u.email, u.hashed_password, u.is_active, u.is_superuser, u.is_verified,
            u.first_name, u.last_name
        FROM access_tokens t
        JOIN users u ON u.id = t.user_id
        WHERE t.token = $1 AND t.created_at >= $2
        "#,
    )
    .bind(token)
    .bind(oldest)
    .fetch_optional(executor)
    .await
}

#[tracing::instrument(name = "Destroy access token", skip(executor, token))]
pub async fn destroy_token<'e, E: PgExecutor<'e>>(
    executor: E,
    token: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM access_tokens WHERE token = $1")
        .bind(token)
        .execute(executor)
        .await?;
    Ok(())
}
