//! src/authentication/tokens.rs

use chrono::{TimeDelta, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, Secret};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const VERIFY_AUDIENCE: &str = "miolingo:verify";
pub const RESET_AUDIENCE: &str = "miolingo:reset";
/// seconds
pub const TOKEN_LIFETIME: i64 = 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyClaims {
    pub sub: String,
    pub email: String,
    pub aud: String,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetClaims {
    pub sub: String,
    /// argon2 hash of the stored password hash
    pub password_fgpt: String,
    pub aud: String,
    pub exp: i64,
}

/// Signs and checks the HS256 tokens mailed for verification and password reset.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Secret<String>,
    lifetime: i64,
}

impl TokenSigner {
    pub fn new(secret: Secret<String>) -> Self {
        Self {
            secret,
            lifetime: TOKEN_LIFETIME,
        }
    }

    pub fn with_lifetime(mut self, seconds: i64) -> Self {
        self.lifetime = seconds;
        self
    }

    fn expiry(&self) -> i64 {
        (Utc::now() + TimeDelta::seconds(self.lifetime)).timestamp()
    }

    fn encode<C: Serialize>(&self, claims: &C) -> jsonwebtoken::errors::Result<String> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(self.secret.expose_secret().as_bytes()),
        )
    }

    fn decode<C: DeserializeOwned>(
        &self,
        token: &str,
        audience: &str,
    ) -> jsonwebtoken::errors::Result<C> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[audience]);
        validation.leeway = 0;
        let data = decode::<C>(
            token,
            &DecodingKey::from_secret(self.secret.expose_secret().as_bytes()),
            &validation,
        )?;
        Ok(data.claims)
    }

    pub fn issue_verify_token(
        &self,
        user_id: Uuid,
        email: &str,
    ) -> jsonwebtoken::errors::Result<String> {
        self.encode(&VerifyClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            aud: VERIFY_AUDIENCE.to_string(),
            exp: self.expiry(),
        })
    }

    pub fn read_verify_token(&self, token: &str) -> jsonwebtoken::errors::Result<VerifyClaims> {
        self.decode(token, VERIFY_AUDIENCE)
    }

    pub fn issue_reset_token(
        &self,
        user_id: Uuid,
        password_fgpt: &str,
    ) -> jsonwebtoken::errors::Result<String> {
        self.encode(&ResetClaims {
            sub: user_id.to_string(),
            password_fgpt: password_fgpt.to_string(),
            aud: RESET_AUDIENCE.to_string(),
            exp: self.expiry(),
        })
    }

    pub fn read_reset_token(&self, token: &str) -> jsonwebtoken::errors::Result<ResetClaims> {
        self.decode(token, RESET_AUDIENCE)
    }
}
