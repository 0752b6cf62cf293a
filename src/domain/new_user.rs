//! src/domain/new_user.rs

use crate::domain::{PersonName, UserEmail};
use secrecy::Secret;

#[derive(Debug)]
pub struct NewUser {
    pub email: UserEmail,
    pub password: Secret<String>,
    pub first_name: PersonName,
    pub last_name: PersonName,
}
