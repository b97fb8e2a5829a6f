//! Birthday use cases backed by the user repository port.
//!
//! `BirthdayService` implements both driving ports. Saving is a read followed
//! by an insert or an update; two concurrent first saves for one username race
//! and the loser surfaces the store's uniqueness rejection as a conflict.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use mockable::Clock;
use tracing::{info, warn};

use super::ports::{BirthdayCommand, BirthdayQuery, SaveOutcome, UserPersistenceError, UserRepository};
use super::{BirthdayGreeting, BirthdayRecord, Error, Username};

/// Create-or-update and greeting lookups over a [`UserRepository`].
#[derive(Clone)]
pub struct BirthdayService<R> {
    repository: Arc<R>,
    clock: Arc<dyn Clock>,
}

impl<R> BirthdayService<R> {
    /// Build the service around a repository and the clock that defines "today".
    pub fn new(repository: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// The reference day: today's date in UTC.
    fn today(&self) -> NaiveDate {
        self.clock.utc().date_naive()
    }
}

/// Translate persistence failures into HTTP-safe domain errors.
pub(crate) fn map_persistence_error(error: UserPersistenceError) -> Error {
    match error {
        UserPersistenceError::Connection { message } => Error::service_unavailable(message),
        UserPersistenceError::Query { message } => Error::internal(message),
        UserPersistenceError::Conflict { .. } => Error::conflict("Resource already exists"),
        UserPersistenceError::Constraint { message } => {
            Error::invalid_request(format!("Invalid data: {message}"))
        }
    }
}

#[async_trait]
impl<R> BirthdayCommand for BirthdayService<R>
where
    R: UserRepository,
{
    async fn save_birthday(
        &self,
        username: &Username,
        date_of_birth: NaiveDate,
    ) -> Result<SaveOutcome, Error> {
        let record = BirthdayRecord::new(username.clone(), date_of_birth);
        let existing = self
            .repository
            .find_by_username(username)
            .await
            .map_err(map_persistence_error)?;

        if existing.is_some() {
            let updated = self
                .repository
                .update(&record)
                .await
                .map_err(map_persistence_error)?;
            if updated {
                info!(%username, "updated birthday for existing user");
                return Ok(SaveOutcome::Updated);
            }
            // The row vanished between the read and the write; fall through to insert.
            warn!(%username, "user disappeared before update; inserting instead");
        }

        self.repository
            .create(&record)
            .await
            .map_err(map_persistence_error)?;
        info!(%username, "created new user");
        Ok(SaveOutcome::Created)
    }
}

#[async_trait]
impl<R> BirthdayQuery for BirthdayService<R>
where
    R: UserRepository,
{
    async fn greeting(&self, username: &Username) -> Result<Option<BirthdayGreeting>, Error> {
        let Some(record) = self
            .repository
            .find_by_username(username)
            .await
            .map_err(map_persistence_error)?
        else {
            return Ok(None);
        };

        let greeting = BirthdayGreeting::compute(
            record.username().clone(),
            record.date_of_birth(),
            self.today(),
        )
        .map_err(|err| Error::internal(err.to_string()))?;
        Ok(Some(greeting))
    }
}

#[cfg(test)]
#[path = "birthday_service_tests.rs"]
mod tests;
