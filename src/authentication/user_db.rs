//! src/authentication/user_db.rs

use crate::domain::User;
use sqlx::{PgExecutor, Postgres, Transaction};
use uuid::Uuid;

const USER_COLUMNS: &str =
    "id, email, hashed_password, is_active, is_superuser, is_verified, first_name, last_name";

/// Checks if err results from a unique constraint, e.g. a second user with the same email
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

#[tracing::instrument(name = "Get user by id", skip(executor))]
pub async fn get_user<'e, E: PgExecutor<'e>>(
    executor: E,
    user_id: Uuid,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
        .bind(user_id)
        .fetch_optional(executor)
        .await
}

/// Locks the row until the surrounding transaction ends.
#[tracing::instrument(name = "Get user by id for update", skip(transaction))]
pub async fn get_user_for_update(
    transaction: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE id = $1 FOR UPDATE",
        USER_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(&mut **transaction)
    .await
}

/// Emails are compared case-insensitively.
#[tracing::instrument(name = "Get user by email", skip(executor))]
pub async fn get_user_by_email<'e, E: PgExecutor<'e>>(
    executor: E,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE lower(email) = lower($1)",
        USER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(executor)
    .await
}

#[tracing::instrument(name = "Saving new user in the database", skip(executor, hashed_password))]
pub async fn insert_user<'e, E: PgExecutor<'e>>(
    executor: E,
    email: &str,
    hashed_password: &str,
    first_name: &str,
    last_name: &str,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (id, email, hashed_password, is_active, is_superuser, is_verified, first_name, last_name)
        VALUES ($1, $2, $3, TRUE, FALSE, FALSE, $4, $5)
        RETURNING {}
        "#,
        USER_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(hashed_password)
    .bind(first_name)
    .bind(last_name)
    .fetch_one(executor)
    .await
}

/// Write every column of `user` back to its row.
#[tracing::instrument(name = "Update user in the database", skip(executor))]
pub async fn update_user<'e, E: PgExecutor<'e>>(
    executor: E,
    user: &User,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        r#"
        UPDATE users
        SET email = $2, hashed_password = $3, is_active = $4, is_superuser = $5,
            is_verified = $6, first_name = $7, last_name = $8
        WHERE id = $1
        RETURNING {}
        "#,
        USER_COLUMNS
    ))
    .bind(user.id)
    .bind(&user.email)
    .bind(&user.hashed_password)
    .bind(user.is_active)
    .bind(user.is_superuser)
    .bind(user.is_verified)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .fetch_one(executor)
    .await
}

#[tracing::instrument(name = "Delete user from the database", skip(executor))]
pub async fn delete_user<'e, E: PgExecutor<'e>>(
    executor: E,
    user_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(executor)
        .await?;
    Ok(())
}
