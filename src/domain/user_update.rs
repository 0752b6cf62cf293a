//! src/domain/user_update.rs

use crate::domain::{PersonName, UserEmail};
use secrecy::Secret;

/// Partial update of a user. `None` leaves the field untouched.
///
/// The flags are only honoured for unsafe (superuser) updates.
#[derive(Debug, Default)]
pub struct UserUpdate {
    pub email: Option<UserEmail>,
    pub password: Option<Secret<String>>,
    pub first_name: Option<PersonName>,
    pub last_name: Option<PersonName>,
    pub is_active: Option<bool>,
    pub is_superuser: Option<bool>,
    pub is_verified: Option<bool>,
}
