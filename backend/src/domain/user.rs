//! User birthday record and its lookup key.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Maximum username length accepted by the `users.username` column.
pub const USERNAME_MAX: usize = 255;

/// Validation errors returned by [`Username::new`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsernameValidationError {
    /// The username was empty.
    #[error("username must not be empty")]
    Empty,
    /// The username exceeded [`USERNAME_MAX`] characters.
    #[error("username must be at most {max} characters")]
    TooLong { max: usize },
    /// The username contained something other than ASCII letters.
    #[error("Username must contain only letters")]
    InvalidCharacters,
}

/// Unique, letters-only user identifier used as the lookup key.
///
/// # Examples
/// ```
/// use birthday::domain::Username;
///
/// assert!(Username::new("alice").is_ok());
/// assert!(Username::new("alice42").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Validate and construct a [`Username`].
    pub fn new(value: impl Into<String>) -> Result<Self, UsernameValidationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(UsernameValidationError::Empty);
        }
        if value.len() > USERNAME_MAX {
            return Err(UsernameValidationError::TooLong { max: USERNAME_MAX });
        }
        if !value.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(UsernameValidationError::InvalidCharacters);
        }
        Ok(Self(value))
    }

    /// Borrow the username.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

impl TryFrom<String> for Username {
    type Error = UsernameValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// The sole persisted entity: a username and its date of birth.
///
/// Server-assigned timestamps are not part of the domain record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BirthdayRecord {
    username: Username,
    date_of_birth: NaiveDate,
}

impl BirthdayRecord {
    /// Build a record from validated parts.
    pub fn new(username: Username, date_of_birth: NaiveDate) -> Self {
        Self {
            username,
            date_of_birth,
        }
    }

    /// Lookup key.
    pub fn username(&self) -> &Username {
        &self.username
    }

    /// Stored calendar date of birth.
    pub fn date_of_birth(&self) -> NaiveDate {
        self.date_of_birth
    }
}
