//! Async PostgreSQL connection pool.
//!
//! This module wraps `sqlx`'s `PgPool` to provide the pool handle used by the
//! connection manager and the repositories. The pool bounds the number of
//! physical connections, reaps idle ones, and fails acquisition after the
//! configured timeout instead of blocking indefinitely.
//!
//! # Design
//!
//! - Each session sets `statement_timeout`, `TimeZone=UTC` and
//!   `application_name` at connect, so `CURRENT_DATE` agrees with the UTC
//!   calendar date used for validation
//! - A disabled (`None`) query or idle timeout is never applied
//! - `ssl` requires TLS but does not verify the server certificate
//! - All errors are mapped to `PoolError` variants

use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use tokio::time::timeout;

/// Upper bound on waiting for checked-out connections to return on close.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Acquire wait used when the connection timeout is disabled.
const UNBOUNDED_ACQUIRE: Duration = Duration::from_secs(24 * 60 * 60);

/// Errors that can occur during pool operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// Failed to build the pool or open its first connection.
    #[error("failed to build connection pool: {message}")]
    Build { message: String },

    /// A query on a pooled connection failed or timed out.
    #[error("pool query failed: {message}")]
    Query { message: String },

    /// Releasing the pool did not complete cleanly.
    #[error("failed to release connection pool: {message}")]
    Release { message: String },
}

impl PoolError {
    /// Create a build error with the given message.
    pub fn build(message: impl Into<String>) -> Self {
        Self::Build {
            message: message.into(),
        }
    }

    /// Create a query error with the given message.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Create a release error with the given message.
    pub fn release(message: impl Into<String>) -> Self {
        Self::Release {
            message: message.into(),
        }
    }
}

/// Configuration for one PostgreSQL connection pool.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use birthday::outbound::persistence::PoolConfig;
///
/// let config = PoolConfig::new("primary", "db.internal", 5432)
///     .with_max_size(20)
///     .with_min_idle(5)
///     .with_connection_timeout(Some(Duration::from_secs(2)));
/// assert_eq!(config.max_size(), 20);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct PoolConfig {
    label: &'static str,
    host: String,
    port: u16,
    database: String,
    user: String,
    password: String,
    ssl: bool,
    max_size: u32,
    min_idle: u32,
    idle_timeout: Option<Duration>,
    connection_timeout: Option<Duration>,
    statement_timeout: Duration,
    query_timeout: Option<Duration>,
    application_name: String,
}

impl std::fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolConfig")
            .field("label", &self.label)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("ssl", &self.ssl)
            .field("max_size", &self.max_size)
            .field("min_idle", &self.min_idle)
            .finish_non_exhaustive()
    }
}

impl PoolConfig {
    /// Create a configuration for the named pool at the given endpoint.
    ///
    /// Uses defaults matching the service's environment defaults:
    /// - `max_size`: 20 connections
    /// - `min_idle`: 5 connections
    /// - `idle_timeout`: 30 seconds
    /// - `connection_timeout`: 2 seconds
    /// - `statement_timeout` and `query_timeout`: 30 seconds
    pub fn new(label: &'static str, host: impl Into<String>, port: u16) -> Self {
        Self {
            label,
            host: host.into(),
            port,
            database: "birthday_db".to_owned(),
            user: "postgres".to_owned(),
            password: "postgres".to_owned(),
            ssl: false,
            max_size: 20,
            min_idle: 5,
            idle_timeout: Some(Duration::from_secs(30)),
            connection_timeout: Some(Duration::from_secs(2)),
            statement_timeout: Duration::from_secs(30),
            query_timeout: Some(Duration::from_secs(30)),
            application_name: "birthday-app".to_owned(),
        }
    }

    /// Set the database name.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set the login role and password.
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    /// Require TLS (unverified) when `true`.
    pub fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    /// Set the maximum number of connections in the pool.
    pub fn with_max_size(mut self, max_size: u32) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the minimum number of idle connections to maintain.
    pub fn with_min_idle(mut self, min_idle: u32) -> Self {
        self.min_idle = min_idle;
        self
    }

    /// Set how long an idle connection may live; `None` keeps it open.
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the connection checkout timeout; `None` waits indefinitely.
    pub fn with_connection_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the server-side statement timeout.
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    /// Set the client-side per-query deadline; `None` disables it.
    pub fn with_query_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Set the `application_name` reported to the server.
    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    /// Pool role used in logs.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Server host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Server port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Pool ceiling.
    pub fn max_size(&self) -> u32 {
        self.max_size
    }

    /// Client-side per-query deadline.
    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout
    }

    /// Connection checkout timeout.
    pub fn connection_timeout(&self) -> Option<Duration> {
        self.connection_timeout
    }

    fn connect_options(&self) -> PgConnectOptions {
        let ssl_mode = if self.ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Disable
        };
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user)
            .password(&self.password)
            .application_name(&self.application_name)
            .ssl_mode(ssl_mode)
            .options([
                ("statement_timeout", self.statement_timeout.as_millis().to_string()),
                ("TimeZone", "UTC".to_owned()),
            ])
    }
}

/// Async connection pool for PostgreSQL via `sqlx`.
///
/// Cloning is cheap; clones share the same underlying connections.
///
/// # Example
///
/// ```ignore
/// let pool = DbPool::connect(&config).await?;
/// pool.ping().await?;
/// let row = sqlx::query("SELECT 1").fetch_one(pool.inner()).await?;
/// ```
#[derive(Clone, Debug)]
pub struct DbPool {
    inner: PgPool,
    label: &'static str,
    query_timeout: Option<Duration>,
}

impl DbPool {
    /// Create a pool and open its first connection.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Build` if the server cannot be reached or rejects
    /// the login within the connection timeout.
    pub async fn connect(config: &PoolConfig) -> Result<Self, PoolError> {
        let inner = PgPoolOptions::new()
            .max_connections(config.max_size)
            .min_connections(config.min_idle)
            .idle_timeout(config.idle_timeout)
            .acquire_timeout(config.connection_timeout.unwrap_or(UNBOUNDED_ACQUIRE))
            .connect_with(config.connect_options())
            .await
            .map_err(|err| PoolError::build(err.to_string()))?;

        Ok(Self {
            inner,
            label: config.label,
            query_timeout: config.query_timeout,
        })
    }

    /// Borrow the underlying `sqlx` pool for query execution.
    pub fn inner(&self) -> &PgPool {
        &self.inner
    }

    /// Pool role used in logs.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Client-side per-query deadline.
    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout
    }

    /// Run `SELECT 1` within the query deadline, if one is set.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Query` if no connection could be acquired, the
    /// query failed, or the deadline elapsed.
    pub async fn ping(&self) -> Result<(), PoolError> {
        let query = sqlx::query("SELECT 1").execute(&self.inner);
        let result = match self.query_timeout {
            Some(deadline) => timeout(deadline, query)
                .await
                .map_err(|_| PoolError::query("health query timed out"))?,
            None => query.await,
        };
        result
            .map(drop)
            .map_err(|err| PoolError::query(err.to_string()))
    }

    /// Execute a multi-statement SQL script.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Query` if any statement fails.
    pub async fn execute_script(&self, sql: &str) -> Result<(), PoolError> {
        sqlx::raw_sql(sql)
            .execute(&self.inner)
            .await
            .map(drop)
            .map_err(|err| PoolError::query(err.to_string()))
    }

    /// Close every connection, waiting for checked-out connections to return.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Release` if connections are still checked out
    /// after the close deadline.
    pub async fn close(&self) -> Result<(), PoolError> {
        timeout(CLOSE_TIMEOUT, self.inner.close())
            .await
            .map_err(|_| PoolError::release(format!("{} pool did not drain in time", self.label)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn pool_config_default_values() {
        let config = PoolConfig::new("primary", "localhost", 5432);

        assert_eq!(config.label(), "primary");
        assert_eq!(config.host(), "localhost");
        assert_eq!(config.port(), 5432);
        assert_eq!(config.max_size, 20);
        assert_eq!(config.min_idle, 5);
        assert_eq!(config.connection_timeout(), Some(Duration::from_secs(2)));
        assert_eq!(config.query_timeout(), Some(Duration::from_secs(30)));
    }

    #[rstest]
    fn pool_config_builder_pattern() {
        let config = PoolConfig::new("read_replica", "replica", 6432)
            .with_max_size(8)
            .with_min_idle(1)
            .with_ssl(true)
            .with_connection_timeout(Some(Duration::from_secs(5)));

        assert_eq!(config.max_size(), 8);
        assert_eq!(config.min_idle, 1);
        assert!(config.ssl);
        assert_eq!(config.connection_timeout(), Some(Duration::from_secs(5)));
    }

    #[rstest]
    fn connect_options_carry_session_settings() {
        let config = PoolConfig::new("primary", "db.internal", 6432)
            .with_database("greetings")
            .with_credentials("svc", "secret")
            .with_application_name("birthday-test");
        let options = config.connect_options();

        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 6432);
        assert_eq!(options.get_database(), Some("greetings"));
        assert_eq!(options.get_username(), "svc");
        assert_eq!(options.get_application_name(), Some("birthday-test"));
        assert!(matches!(options.get_ssl_mode(), PgSslMode::Disable));
        let session = options.get_options().unwrap_or_default();
        assert!(session.contains("statement_timeout=30000"), "{session}");
        assert!(session.contains("TimeZone=UTC"), "{session}");
    }

    #[rstest]
    fn disabled_statement_timeout_is_sent_as_zero() {
        let config = PoolConfig::new("primary", "localhost", 5432)
            .with_statement_timeout(Duration::ZERO)
            .with_query_timeout(None);
        let options = config.connect_options();

        assert!(
            options
                .get_options()
                .is_some_and(|opts| opts.contains("statement_timeout=0"))
        );
        assert_eq!(config.query_timeout(), None);
    }

    #[rstest]
    fn pool_config_debug_hides_password() {
        let config = PoolConfig::new("primary", "localhost", 5432).with_credentials("u", "s3cret");
        assert!(!format!("{config:?}").contains("s3cret"));
    }

    #[rstest]
    fn pool_error_display() {
        let build_err = PoolError::build("connection refused");
        let release_err = PoolError::release("pool did not drain");

        assert!(build_err.to_string().contains("connection refused"));
        assert!(release_err.to_string().contains("did not drain"));
    }
}
