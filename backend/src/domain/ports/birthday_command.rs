//! Driving port for saving a user's date of birth.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::{Error, Username};

/// What a save did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// A new record was inserted.
    Created,
    /// An existing record was updated in place.
    Updated,
}

/// Use-case port for the create-or-update flow behind `PUT /hello/{username}`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BirthdayCommand: Send + Sync {
    /// Create or update the record for `username`.
    async fn save_birthday(
        &self,
        username: &Username,
        date_of_birth: NaiveDate,
    ) -> Result<SaveOutcome, Error>;
}
