//! Environment-driven database settings.
//!
//! Every parameter has a default so a bare environment yields a local
//! development configuration. Malformed values are configuration errors and
//! are reported before any connection attempt. A value of `0` for the idle,
//! connection or query timeout disables that deadline.

use std::fmt;
use std::time::Duration;

use mockable::Env;

use super::pool::PoolConfig;

const BOOL_EXPECTED: &str = "true|false|1|0|yes|no";
const NUMBER_EXPECTED: &str = "a non-negative integer";
const PORT_EXPECTED: &str = "a TCP port (1-65535)";

/// Errors raised while reading database settings from the environment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DatabaseConfigError {
    /// A variable is present but contains an invalid value.
    #[error("invalid value for {name}='{value}'; expected {expected}")]
    InvalidEnv {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
    /// The pool must allow at least one connection.
    #[error("DB_POOL_SIZE must be at least 1")]
    EmptyPool,
    /// The idle floor cannot exceed the pool ceiling.
    #[error("DB_MIN_POOL_SIZE ({min}) exceeds DB_POOL_SIZE ({max})")]
    PoolBounds { min: u32, max: u32 },
}

/// Host and port of one PostgreSQL server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Hostname or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// Connection parameters shared by the write pool and the read pool.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    /// Primary server; serves all writes.
    pub primary: Endpoint,
    /// Optional replica; `None` means the primary serves reads too.
    pub read_replica: Option<Endpoint>,
    /// Database name.
    pub database: String,
    /// Login role.
    pub user: String,
    /// Login password.
    pub password: String,
    /// Require TLS without verifying the server certificate.
    pub ssl: bool,
    /// Pool ceiling.
    pub max_connections: u32,
    /// Idle connections kept open.
    pub min_connections: u32,
    /// Idle connections older than this are closed; `None` keeps them.
    pub idle_timeout: Option<Duration>,
    /// Maximum wait to acquire a connection; `None` waits indefinitely.
    pub connection_timeout: Option<Duration>,
    /// Server-side `statement_timeout`; zero disables it on the server.
    pub statement_timeout: Duration,
    /// Client-side deadline for a single query; `None` disables it.
    pub query_timeout: Option<Duration>,
    /// `application_name` reported to the server.
    pub application_name: String,
}

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("primary", &self.primary)
            .field("read_replica", &self.read_replica)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("ssl", &self.ssl)
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("idle_timeout", &self.idle_timeout)
            .field("connection_timeout", &self.connection_timeout)
            .field("statement_timeout", &self.statement_timeout)
            .field("query_timeout", &self.query_timeout)
            .field("application_name", &self.application_name)
            .finish()
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            primary: Endpoint {
                host: "localhost".to_owned(),
                port: 5432,
            },
            read_replica: None,
            database: "birthday_db".to_owned(),
            user: "postgres".to_owned(),
            password: "postgres".to_owned(),
            ssl: false,
            max_connections: 20,
            min_connections: 5,
            idle_timeout: Some(Duration::from_millis(30_000)),
            connection_timeout: Some(Duration::from_millis(2_000)),
            statement_timeout: Duration::from_millis(30_000),
            query_timeout: Some(Duration::from_millis(30_000)),
            application_name: "birthday-app".to_owned(),
        }
    }
}

impl DatabaseSettings {
    /// Read settings from the environment, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseConfigError`] when a variable cannot be parsed or
    /// the pool bounds are inconsistent.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use birthday::outbound::persistence::DatabaseSettings;
    /// use mockable::MockEnv;
    ///
    /// let mut env = MockEnv::new();
    /// env.expect_string().returning(|name| match name {
    ///     "DB_READ_HOST" => Some("replica.internal".to_string()),
    ///     _ => None,
    /// });
    ///
    /// let settings = DatabaseSettings::from_env(&env).expect("valid settings");
    /// assert_eq!(settings.primary.host, "localhost");
    /// assert!(settings.read_replica.is_some());
    /// ```
    pub fn from_env<E: Env>(env: &E) -> Result<Self, DatabaseConfigError> {
        let defaults = Self::default();

        let primary = Endpoint {
            host: string_or(env, "DB_PRIMARY_HOST", defaults.primary.host),
            port: port_or(env, "DB_PRIMARY_PORT", defaults.primary.port)?,
        };
        let read_replica = match non_empty(env, "DB_READ_HOST") {
            Some(host) => Some(Endpoint {
                host,
                port: port_or(env, "DB_READ_PORT", 5432)?,
            }),
            None => None,
        };

        let max_connections = number_or(env, "DB_POOL_SIZE", defaults.max_connections)?;
        let min_connections = number_or(env, "DB_MIN_POOL_SIZE", defaults.min_connections)?;
        if max_connections == 0 {
            return Err(DatabaseConfigError::EmptyPool);
        }
        if min_connections > max_connections {
            return Err(DatabaseConfigError::PoolBounds {
                min: min_connections,
                max: max_connections,
            });
        }

        Ok(Self {
            primary,
            read_replica,
            database: string_or(env, "DB_NAME", defaults.database),
            user: string_or(env, "DB_USER", defaults.user),
            password: string_or(env, "DB_PASSWORD", defaults.password),
            ssl: bool_or(env, "DB_SSL", defaults.ssl)?,
            max_connections,
            min_connections,
            idle_timeout: deadline_or(env, "DB_IDLE_TIMEOUT", defaults.idle_timeout)?,
            connection_timeout: deadline_or(
                env,
                "DB_CONNECTION_TIMEOUT",
                defaults.connection_timeout,
            )?,
            statement_timeout: millis_or(
                env,
                "DB_STATEMENT_TIMEOUT",
                defaults.statement_timeout,
            )?,
            query_timeout: deadline_or(env, "DB_QUERY_TIMEOUT", defaults.query_timeout)?,
            application_name: string_or(env, "APP_NAME", defaults.application_name),
        })
    }

    /// Whether reads go to a distinct replica.
    #[must_use]
    pub fn has_read_replica(&self) -> bool {
        self.read_replica.is_some()
    }

    /// Pool configuration for the primary (write) server.
    #[must_use]
    pub fn write_pool_config(&self) -> PoolConfig {
        self.pool_config("primary", &self.primary)
    }

    /// Pool configuration for the replica, if one is configured.
    #[must_use]
    pub fn read_pool_config(&self) -> Option<PoolConfig> {
        self.read_replica
            .as_ref()
            .map(|endpoint| self.pool_config("read_replica", endpoint))
    }

    fn pool_config(&self, label: &'static str, endpoint: &Endpoint) -> PoolConfig {
        PoolConfig::new(label, endpoint.host.clone(), endpoint.port)
            .with_database(self.database.clone())
            .with_credentials(self.user.clone(), self.password.clone())
            .with_ssl(self.ssl)
            .with_max_size(self.max_connections)
            .with_min_idle(self.min_connections)
            .with_idle_timeout(self.idle_timeout)
            .with_connection_timeout(self.connection_timeout)
            .with_statement_timeout(self.statement_timeout)
            .with_query_timeout(self.query_timeout)
            .with_application_name(self.application_name.clone())
    }
}

fn non_empty<E: Env>(env: &E, name: &str) -> Option<String> {
    env.string(name)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn string_or<E: Env>(env: &E, name: &str, fallback: String) -> String {
    non_empty(env, name).unwrap_or(fallback)
}

fn number_or<E: Env>(env: &E, name: &'static str, fallback: u32) -> Result<u32, DatabaseConfigError> {
    parse_or(env, name, fallback, NUMBER_EXPECTED, |raw| raw.parse().ok())
}

fn port_or<E: Env>(env: &E, name: &'static str, fallback: u16) -> Result<u16, DatabaseConfigError> {
    parse_or(env, name, fallback, PORT_EXPECTED, |raw| {
        raw.parse::<u16>().ok().filter(|port| *port != 0)
    })
}

fn millis_or<E: Env>(
    env: &E,
    name: &'static str,
    fallback: Duration,
) -> Result<Duration, DatabaseConfigError> {
    parse_or(env, name, fallback, NUMBER_EXPECTED, |raw| {
        raw.parse::<u64>().ok().map(Duration::from_millis)
    })
}

/// Milliseconds where `0` disables the deadline.
fn deadline_or<E: Env>(
    env: &E,
    name: &'static str,
    fallback: Option<Duration>,
) -> Result<Option<Duration>, DatabaseConfigError> {
    parse_or(env, name, fallback, NUMBER_EXPECTED, |raw| {
        raw.parse::<u64>()
            .ok()
            .map(|millis| (millis > 0).then(|| Duration::from_millis(millis)))
    })
}

fn bool_or<E: Env>(env: &E, name: &'static str, fallback: bool) -> Result<bool, DatabaseConfigError> {
    parse_or(env, name, fallback, BOOL_EXPECTED, parse_bool)
}

fn parse_or<E, T, F>(
    env: &E,
    name: &'static str,
    fallback: T,
    expected: &'static str,
    parse: F,
) -> Result<T, DatabaseConfigError>
where
    E: Env,
    F: FnOnce(&str) -> Option<T>,
{
    match non_empty(env, name) {
        None => Ok(fallback),
        Some(value) => parse(&value).ok_or(DatabaseConfigError::InvalidEnv {
            name,
            value,
            expected,
        }),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
