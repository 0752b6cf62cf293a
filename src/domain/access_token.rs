//! src/domain/access_token.rs

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use uuid::Uuid;

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl AccessToken {
    pub const LENGTH: usize = 43;

    /// Generate a random 43-characters-long case-sensitive bearer token.
    pub fn generate_token() -> String {
        let mut rng = thread_rng();
        std::iter::repeat_with(|| rng.sample(Alphanumeric))
            .map(char::from)
            .take(Self::LENGTH)
            .collect()
    }
}
