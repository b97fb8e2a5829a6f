//! Port abstraction for birthday record persistence and its errors.
use async_trait::async_trait;

use crate::domain::{BirthdayRecord, Username};

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by user repository adapters.
    pub enum UserPersistenceError {
        /// No pool connection could be obtained (unreachable, timed out, or
        /// the pools are not initialised).
        Connection { message: String } => "user repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "user repository query failed: {message}",
        /// The store rejected the write because the username already exists.
        Conflict { message: String } => "user repository conflict: {message}",
        /// The store rejected the write through a check constraint.
        Constraint { message: String } => "user repository constraint violated: {message}",
    }
}

/// Driven port for the `users` table.
///
/// Lookups go through the read pool; mutations through the write pool.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fetch the record stored for `username`, if any.
    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<BirthdayRecord>, UserPersistenceError>;

    /// Insert a new record.
    async fn create(&self, record: &BirthdayRecord) -> Result<(), UserPersistenceError>;

    /// Overwrite the date of birth for an existing username.
    ///
    /// Returns `false` when no row matched.
    async fn update(&self, record: &BirthdayRecord) -> Result<bool, UserPersistenceError>;
}
