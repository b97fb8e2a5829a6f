//! PostgreSQL-backed `UserRepository` implementation using `sqlx`.
//!
//! Lookups run on the read pool and mutations on the write pool, both taken
//! from the [`ConnectionManager`] at call time so the repository can be built
//! before initialisation completes. Every statement is bounded by the pool's
//! client-side query timeout unless that timeout is disabled.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::error::ErrorKind;
use tokio::time::{error::Elapsed, timeout};
use tracing::{debug, warn};

use crate::domain::ports::{UserPersistenceError, UserRepository};
use crate::domain::{BirthdayRecord, Username};

use super::connection_manager::{ConnectionManager, DatabaseError};
use super::pool::DbPool;

/// Row shape returned by user lookups.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    username: String,
    date_of_birth: NaiveDate,
}

/// `sqlx`-backed implementation of the `UserRepository` port.
#[derive(Clone)]
pub struct PostgresUserRepository {
    manager: Arc<ConnectionManager>,
}

impl PostgresUserRepository {
    /// Create a repository over the managed pools.
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }
}

fn map_manager_error(error: DatabaseError) -> UserPersistenceError {
    UserPersistenceError::connection(error.to_string())
}

/// Map `sqlx` errors to domain persistence errors.
fn map_sqlx_error(error: sqlx::Error) -> UserPersistenceError {
    match error {
        sqlx::Error::Database(db) => {
            let constraint = db.constraint().unwrap_or("unknown").to_owned();
            match db.kind() {
                ErrorKind::UniqueViolation => {
                    debug!(%constraint, "unique constraint rejected write");
                    UserPersistenceError::conflict(constraint)
                }
                ErrorKind::CheckViolation => {
                    debug!(%constraint, "check constraint rejected write");
                    UserPersistenceError::constraint(db.message())
                }
                kind => {
                    debug!(?kind, code = ?db.code(), message = db.message(), "database error");
                    UserPersistenceError::query("database error")
                }
            }
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            UserPersistenceError::connection("database connection unavailable")
        }
        sqlx::Error::Io(err) => {
            debug!(error = %err, "database connection error");
            UserPersistenceError::connection("database connection error")
        }
        sqlx::Error::Tls(err) => {
            debug!(error = %err, "database tls error");
            UserPersistenceError::connection("database connection error")
        }
        other => {
            debug!(error = %other, "sqlx operation failed");
            UserPersistenceError::query("database error")
        }
    }
}

/// Await `future`, giving up after `deadline` when one is set.
async fn within<F: Future>(deadline: Option<Duration>, future: F) -> Result<F::Output, Elapsed> {
    match deadline {
        Some(deadline) => timeout(deadline, future).await,
        None => Ok(future.await),
    }
}

/// Run `operation` under the pool's query timeout.
async fn bounded<T, F>(
    pool: &DbPool,
    operation: &'static str,
    query: F,
) -> Result<T, UserPersistenceError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match within(pool.query_timeout(), query).await {
        Ok(result) => result.map_err(map_sqlx_error),
        Err(_) => {
            warn!(
                operation,
                pool = pool.label(),
                timeout_ms = pool.query_timeout().map_or(0, |t| t.as_millis()),
                "query timed out"
            );
            Err(UserPersistenceError::query("query timed out"))
        }
    }
}

fn row_to_record(row: UserRow) -> Result<BirthdayRecord, UserPersistenceError> {
    let username = Username::new(row.username)
        .map_err(|err| UserPersistenceError::query(format!("stored username invalid: {err}")))?;
    Ok(BirthdayRecord::new(username, row.date_of_birth))
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<BirthdayRecord>, UserPersistenceError> {
        let pool = self.manager.get_read_pool().map_err(map_manager_error)?;
        let row: Option<UserRow> = bounded(
            pool,
            "find_by_username",
            sqlx::query_as("SELECT username, date_of_birth FROM users WHERE username = $1")
                .bind(username.as_str())
                .fetch_optional(pool.inner()),
        )
        .await?;

        row.map(row_to_record).transpose()
    }

    async fn create(&self, record: &BirthdayRecord) -> Result<(), UserPersistenceError> {
        let pool = self.manager.get_write_pool().map_err(map_manager_error)?;
        bounded(
            pool,
            "create",
            sqlx::query("INSERT INTO users (username, date_of_birth) VALUES ($1, $2)")
                .bind(record.username().as_str())
                .bind(record.date_of_birth())
                .execute(pool.inner()),
        )
        .await
        .map(drop)
    }

    async fn update(&self, record: &BirthdayRecord) -> Result<bool, UserPersistenceError> {
        let pool = self.manager.get_write_pool().map_err(map_manager_error)?;
        let result = bounded(
            pool,
            "update",
            sqlx::query("UPDATE users SET date_of_birth = $1 WHERE username = $2")
                .bind(record.date_of_birth())
                .bind(record.username().as_str())
                .execute(pool.inner()),
        )
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
