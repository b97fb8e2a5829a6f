//! Driving port for reading a user's greeting.

use async_trait::async_trait;

use crate::domain::{BirthdayGreeting, Error, Username};

/// Use-case port behind `GET /hello/{username}`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BirthdayQuery: Send + Sync {
    /// Greeting for `username`, or `None` when no record exists.
    async fn greeting(&self, username: &Username) -> Result<Option<BirthdayGreeting>, Error>;
}
