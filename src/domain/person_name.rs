//! src/domain/person_name.rs

use crate::domain::ValidationError;

/// First or last name of a user. May be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonName(String);

impl PersonName {
    pub const MAX_LENGTH: usize = 512;

    pub fn parse(s: String) -> Result<PersonName, ValidationError> {
        if s.chars().count() > Self::MAX_LENGTH {
            Err(ValidationError::InvalidName(s))
        } else {
            Ok(Self(s))
        }
    }
}

impl AsRef<str> for PersonName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
