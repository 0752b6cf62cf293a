//! src/authentication/password.rs

use crate::telemetry::spawn_blocking_with_tracing;
use anyhow::Context;
use argon2::{
    password_hash::SaltString, Algorithm, Argon2, Params, PasswordHash, PasswordHasher,
    PasswordVerifier, Version,
};
use secrecy::{ExposeSecret, Secret};

/// Verified against when the user is unknown, so both paths take the same time.
pub const DUMMY_PASSWORD_HASH: &str = "$argon2id$v=19$m=15000,t=2,p=1$\
    gZiV/M1gPc22ElAH/Jh1Hw$\
    CWOrkoo7oJBQ/iyh7uJ0LO2aLEfrHwTWllSAxT0zRno";

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordPolicyViolation {
    #[error("Password should be at least 8 characters")]
    TooShort,
    #[error("Password should not contain e-mail")]
    ContainsEmail,
}

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Length is checked before the email.
pub fn validate_password(password: &str, email: &str) -> Result<(), PasswordPolicyViolation> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordPolicyViolation::TooShort);
    }
    if password.contains(email) {
        return Err(PasswordPolicyViolation::ContainsEmail);
    }
    Ok(())
}

#[tracing::instrument(name = "Hash password", skip(password))]
pub async fn hash_password(password: Secret<String>) -> anyhow::Result<Secret<String>> {
    spawn_blocking_with_tracing(move || compute_password_hash(password))
        .await
        .context("Failed to spawn computation of password hash")?
}

#[tracing::instrument(name = "Verify password", skip(expected_password_hash, password_candidate))]
pub async fn verify_password(
    expected_password_hash: Secret<String>,
    password_candidate: Secret<String>,
) -> anyhow::Result<bool> {
    spawn_blocking_with_tracing(move || {
        verify_password_hash(expected_password_hash, password_candidate)
    })
    .await
    .context("Failed to spawn blocking task.")?
}

pub fn compute_password_hash(password: Secret<String>) -> anyhow::Result<Secret<String>> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let params = Params::new(15_000, 2, 1, None).context("Invalid argon2 parameters.")?;
    let password_hash = Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(password.expose_secret().as_bytes(), &salt)
        .context("Failed to hash password.")?
        .to_string();
    Ok(Secret::new(password_hash))
}

/// `Ok(false)` on mismatch, `Err` if the stored hash cannot be parsed.
pub fn verify_password_hash(
    expected_password_hash: Secret<String>,
    password_candidate: Secret<String>,
) -> anyhow::Result<bool> {
    let expected_password_hash = PasswordHash::new(expected_password_hash.expose_secret())
        .context("Failed to parse hash in PHC string format.")?;
    match Argon2::default().verify_password(
        password_candidate.expose_secret().as_bytes(),
        &expected_password_hash,
    ) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e).context("Failed to verify password."),
    }
}
