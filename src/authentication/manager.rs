//! src/authentication/manager.rs

use crate::authentication::password::{
    hash_password, validate_password, verify_password, PasswordPolicyViolation,
    DUMMY_PASSWORD_HASH,
};
use crate::authentication::token_db::{destroy_token, write_token};
use crate::authentication::tokens::TokenSigner;
use crate::authentication::user_db::{
    delete_user, get_user, get_user_by_email, get_user_for_update, insert_user,
    is_unique_violation, update_user,
};
use crate::configuration::FrontendSettings;
use crate::domain::{AccessToken, NewUser, User, UserUpdate};
use crate::email_client::{EmailClient, EmailError};
use crate::error::error_chain_fmt;
use crate::utils::FrontendUrl;
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use anyhow::Context;
use secrecy::{ExposeSecret, Secret};
use sqlx::PgPool;
use std::future::{ready, Ready};
use uuid::Uuid;

#[derive(thiserror::Error)]
pub enum UserManagerError {
    #[error("{0}")]
    InvalidPassword(#[from] PasswordPolicyViolation),
    #[error("A user with this email already exists.")]
    UserAlreadyExists,
    #[error("The token is invalid or expired.")]
    BadToken,
    #[error("The user is already verified.")]
    AlreadyVerified,
    #[error("Failed to send mail.")]
    EmailError(#[from] EmailError),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for UserManagerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

type ManagerResult<T> = Result<T, UserManagerError>;

/// Request scoped access to users: registration, login, verification and password reset.
pub struct UserManager {
    pool: web::Data<PgPool>,
    email_client: web::Data<EmailClient>,
    frontend: web::Data<FrontendUrl>,
    frontend_settings: web::Data<FrontendSettings>,
    tokens: web::Data<TokenSigner>,
}

fn app_data<T: 'static>(req: &HttpRequest) -> anyhow::Result<web::Data<T>> {
    req.app_data::<web::Data<T>>()
        .cloned()
        .with_context(|| format!("`{}` is not registered.", std::any::type_name::<T>()))
}

impl FromRequest for UserManager {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let manager = (|| -> anyhow::Result<Self> {
            Ok(Self {
                pool: app_data(req)?,
                email_client: app_data(req)?,
                frontend: app_data(req)?,
                frontend_settings: app_data(req)?,
                tokens: app_data(req)?,
            })
        })();
        ready(manager.map_err(|e| crate::error::Error::from(e).into()))
    }
}

impl UserManager {
    #[tracing::instrument(
        name = "Register a new user",
        skip(self, new_user),
        fields(user_email = %new_user.email)
    )]
    pub async fn create(&self, new_user: NewUser) -> ManagerResult<User> {
        validate_password(new_user.password.expose_secret(), new_user.email.as_ref())?;
        let hashed_password = hash_password(new_user.password).await?;

        let mut transaction = self
            .pool
            .begin()
            .await
            .context("Failed to acquire a Postgres connection from the pool")?;
        if get_user_by_email(&mut *transaction, new_user.email.as_ref())
            .await
            .context("Failed to look up user by email.")?
            .is_some()
        {
            return Err(UserManagerError::UserAlreadyExists);
        }
        let user = insert_user(
            &mut *transaction,
            new_user.email.as_ref(),
            hashed_password.expose_secret(),
            new_user.first_name.as_ref(),
            new_user.last_name.as_ref(),
        )
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                UserManagerError::UserAlreadyExists
            } else {
                anyhow::Error::new(e)
                    .context("Failed to insert new user in the database.")
                    .into()
            }
        })?;
        transaction
            .commit()
            .await
            .context("Failed to commit SQL transaction to store a new user.")?;
        tracing::info!(user_id = %user.id, "User has registered.");
        Ok(user)
    }

    /// `None` for unknown emails and wrong passwords alike.
    #[tracing::instrument(name = "Authenticate user", skip(self, password))]
    pub async fn authenticate(
        &self,
        email: &str,
        password: Secret<String>,
    ) -> ManagerResult<Option<User>> {
        let user = get_user_by_email(self.pool.get_ref(), email)
            .await
            .context("Failed to look up user by email.")?;
        match user {
            None => {
                verify_password(Secret::new(DUMMY_PASSWORD_HASH.to_string()), password).await?;
                Ok(None)
            }
            Some(user) => {
                let verified =
                    verify_password(Secret::new(user.hashed_password.clone()), password).await?;
                Ok(verified.then_some(user))
            }
        }
    }

    #[tracing::instrument(name = "Request verification token", skip(self))]
    pub async fn request_verify(&self, email: &str) -> ManagerResult<()> {
        let user = get_user_by_email(self.pool.get_ref(), email)
            .await
            .context("Failed to look up user by email.")?;
        match user {
            Some(user) if user.is_active && !user.is_verified => {
                let token = self
                    .tokens
                    .issue_verify_token(user.id, &user.email)
                    .context("Failed to sign verification token.")?;
                self.on_after_request_verify(&user, &token).await?;
            }
            _ => tracing::info!("No verification mail sent."),
        }
        Ok(())
    }

    #[tracing::instrument(name = "Verify user", skip(self, token))]
    pub async fn verify(&self, token: &str) -> ManagerResult<User> {
        let claims = self
            .tokens
            .read_verify_token(token)
            .map_err(|_| UserManagerError::BadToken)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| UserManagerError::BadToken)?;

        let mut transaction = self
            .pool
            .begin()
            .await
            .context("Failed to acquire a Postgres connection from the pool")?;
        let mut user = get_user_for_update(&mut transaction, user_id)
            .await
            .context("Failed to look up user by id.")?
            .filter(|user| user.email == claims.email)
            .ok_or(UserManagerError::BadToken)?;
        if user.is_verified {
            return Err(UserManagerError::AlreadyVerified);
        }
        user.is_verified = true;
        let user = update_user(&mut *transaction, &user)
            .await
            .context("Failed to mark user as verified.")?;
        transaction
            .commit()
            .await
            .context("Failed to commit SQL transaction to verify a user.")?;
        Ok(user)
    }

    #[tracing::instrument(name = "Forgot password", skip(self))]
    pub async fn forgot_password(&self, email: &str) -> ManagerResult<()> {
        let user = get_user_by_email(self.pool.get_ref(), email)
            .await
            .context("Failed to look up user by email.")?;
        match user {
            Some(user) if user.is_active => {
                let fingerprint =
                    hash_password(Secret::new(user.hashed_password.clone())).await?;
                let token = self
                    .tokens
                    .issue_reset_token(user.id, fingerprint.expose_secret())
                    .context("Failed to sign reset token.")?;
                self.on_after_forgot_password(&user, &token).await?;
            }
            _ => tracing::info!("No reset mail sent."),
        }
        Ok(())
    }

    /// A token is bound to the password hash it was issued for, so it works once.
    #[tracing::instrument(name = "Reset password", skip(self, token, password))]
    pub async fn reset_password(&self, token: &str, password: Secret<String>) -> ManagerResult<User> {
        let claims = self
            .tokens
            .read_reset_token(token)
            .map_err(|_| UserManagerError::BadToken)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| UserManagerError::BadToken)?;
        let mut transaction = self
            .pool
            .begin()
            .await
            .context("Failed to acquire a Postgres connection from the pool")?;
        let mut user = get_user_for_update(&mut transaction, user_id)
            .await
            .context("Failed to look up user by id.")?
            .filter(|user| user.is_active)
            .ok_or(UserManagerError::BadToken)?;
        let fingerprint_matches = verify_password(
            Secret::new(claims.password_fgpt),
            Secret::new(user.hashed_password.clone()),
        )
        .await
        .unwrap_or(false);
        if !fingerprint_matches {
            return Err(UserManagerError::BadToken);
        }
        validate_password(password.expose_secret(), &user.email)?;
        user.hashed_password = hash_password(password).await?.expose_secret().clone();
        let user = update_user(&mut *transaction, &user)
            .await
            .context("Failed to store new password.")?;
        transaction
            .commit()
            .await
            .context("Failed to commit SQL transaction to reset a password.")?;
        tracing::info!(user_id = %user.id, "User has reset their password.");
        Ok(user)
    }

    /// Apply `update` to `user`. Unless `safe` is false, status flags are left untouched.
    #[tracing::instrument(name = "Update user", skip(self, update))]
    pub async fn update(&self, mut user: User, update: UserUpdate, safe: bool) -> ManagerResult<User> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .context("Failed to acquire a Postgres connection from the pool")?;
        if let Some(email) = update.email {
            if email.as_ref() != user.email {
                let existing = get_user_by_email(&mut *transaction, email.as_ref())
                    .await
                    .context("Failed to look up user by email.")?;
                if existing.is_some_and(|existing| existing.id != user.id) {
                    return Err(UserManagerError::UserAlreadyExists);
                }
                user.email = email.as_ref().to_string();
                user.is_verified = false;
            }
        }
        if let Some(password) = update.password {
            validate_password(password.expose_secret(), &user.email)?;
            user.hashed_password = hash_password(password).await?.expose_secret().clone();
        }
        if let Some(first_name) = update.first_name {
            user.first_name = first_name.as_ref().to_string();
        }
        if let Some(last_name) = update.last_name {
            user.last_name = last_name.as_ref().to_string();
        }
        if !safe {
            if let Some(is_active) = update.is_active {
                user.is_active = is_active;
            }
            if let Some(is_superuser) = update.is_superuser {
                user.is_superuser = is_superuser;
            }
            if let Some(is_verified) = update.is_verified {
                user.is_verified = is_verified;
            }
        }
        let user = update_user(&mut *transaction, &user)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    UserManagerError::UserAlreadyExists
                } else {
                    anyhow::Error::new(e)
                        .context("Failed to update user in the database.")
                        .into()
                }
            })?;
        transaction
            .commit()
            .await
            .context("Failed to commit SQL transaction to update a user.")?;
        Ok(user)
    }

    pub async fn get(&self, user_id: Uuid) -> ManagerResult<Option<User>> {
        Ok(get_user(self.pool.get_ref(), user_id)
            .await
            .context("Failed to look up user by id.")?)
    }

    pub async fn delete(&self, user: User) -> ManagerResult<()> {
        delete_user(self.pool.get_ref(), user.id)
            .await
            .context("Failed to delete user.")?;
        tracing::info!(user_id = %user.id, "User has been deleted.");
        Ok(())
    }

    /// Issue a new bearer token, replacing any previous token of the user.
    pub async fn write_access_token(&self, user: &User) -> ManagerResult<AccessToken> {
        Ok(
            write_token(self.pool.get_ref(), user.id, &AccessToken::generate_token())
                .await
                .context("Failed to store access token.")?,
        )
    }

    pub async fn destroy_access_token(&self, token: &str) -> ManagerResult<()> {
        destroy_token(self.pool.get_ref(), token)
            .await
            .context("Failed to delete access token.")?;
        Ok(())
    }

    async fn on_after_request_verify(&self, user: &User, token: &str) -> Result<(), EmailError> {
        let mut context = tera::Context::new();
        context.insert("fullname", &user.fullname());
        context.insert(
            "verify_link",
            &self.frontend.build(
                &self.frontend_settings.verify_path,
                Some(&[("token", token)]),
                None,
            ),
        );
        self.email_client
            .send_with_template(
                "Verify your account",
                &[user.email.as_str()],
                "users/request_verify.html",
                &context,
            )
            .await
    }

    async fn on_after_forgot_password(&self, user: &User, token: &str) -> Result<(), EmailError> {
        let mut context = tera::Context::new();
        context.insert("fullname", &user.fullname());
        context.insert(
            "reset_password_link",
            &self.frontend.build(
                &self.frontend_settings.reset_password_path,
                Some(&[("token", token)]),
                None,
            ),
        );
        self.email_client
            .send_with_template(
                "Reset your password",
                &[user.email.as_str()],
                "users/reset_password.html",
                &context,
            )
            .await
    }
}
