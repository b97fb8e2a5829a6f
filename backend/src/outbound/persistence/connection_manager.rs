//! Write/read pool supervision with bounded-retry start-up.
//!
//! The [`ConnectionManager`] owns the write pool and the read pool. When no
//! replica is configured a single pool serves both roles, recorded as
//! [`PoolTopology::Shared`] so release and health probing never touch it
//! twice.
//!
//! Start-up runs connect, probe, and schema bootstrap as one attempt. Failed
//! attempts release whatever they built and are retried after a fixed delay.
//! The delay and the attempt itself are cancellable through a
//! [`CancellationToken`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::pool::{DbPool, PoolConfig, PoolError};
use super::schema::SCHEMA_SQL;
use super::settings::DatabaseSettings;
use crate::domain::DatabaseHealth;
use crate::domain::ports::DatabaseHealthProbe;

/// Pool label used in logs and errors for the write pool.
pub const PRIMARY_POOL: &str = "primary";
/// Pool label used in logs and errors for the read pool.
pub const READ_REPLICA_POOL: &str = "read_replica";

/// Errors raised by the connection manager.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// A pool was requested before initialisation succeeded.
    #[error("database not initialized")]
    NotInitialized,
    /// The manager has been closed.
    #[error("database connection manager is closed")]
    Closed,
    /// Opening or probing a pool failed; retried during start-up.
    #[error("failed to connect to the {pool} database: {source}")]
    Connect {
        pool: &'static str,
        #[source]
        source: PoolError,
    },
    /// The schema bootstrap script failed.
    #[error("failed to create database schema: {source}")]
    Schema {
        #[source]
        source: PoolError,
    },
    /// Every start-up attempt failed.
    #[error("database initialization failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<DatabaseError>,
    },
    /// Start-up was cancelled before it succeeded.
    #[error("database initialization cancelled")]
    Cancelled,
    /// Releasing a pool failed.
    #[error("failed to release the {pool} pool: {source}")]
    Release {
        pool: &'static str,
        #[source]
        source: PoolError,
    },
}

/// Handle operations the manager needs from a pool.
#[async_trait]
pub trait ManagedPool: Clone + Send + Sync + 'static {
    /// Round-trip a trivial query.
    async fn ping(&self) -> Result<(), PoolError>;
    /// Execute a multi-statement script.
    async fn execute_script(&self, sql: &str) -> Result<(), PoolError>;
    /// Release every connection.
    async fn close(&self) -> Result<(), PoolError>;
}

/// Builds pools from configuration.
#[async_trait]
pub trait PoolConnector: Send + Sync + 'static {
    /// Pool type produced by this connector.
    type Pool: ManagedPool;

    /// Open a pool described by `config`.
    async fn connect(&self, config: &PoolConfig) -> Result<Self::Pool, PoolError>;
}

#[async_trait]
impl ManagedPool for DbPool {
    async fn ping(&self) -> Result<(), PoolError> {
        DbPool::ping(self).await
    }

    async fn execute_script(&self, sql: &str) -> Result<(), PoolError> {
        DbPool::execute_script(self, sql).await
    }

    async fn close(&self) -> Result<(), PoolError> {
        DbPool::close(self).await
    }
}

/// Connector opening real PostgreSQL pools.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgConnector;

#[async_trait]
impl PoolConnector for PgConnector {
    type Pool = DbPool;

    async fn connect(&self, config: &PoolConfig) -> Result<DbPool, PoolError> {
        DbPool::connect(config).await
    }
}

/// How the write and read roles map onto physical pools.
#[derive(Debug, Clone)]
pub enum PoolTopology<P> {
    /// A replica serves reads; the primary serves writes.
    Distinct { write: P, read: P },
    /// One pool serves both roles.
    Shared(P),
}

impl<P> PoolTopology<P> {
    /// Pool serving inserts and updates.
    pub fn write(&self) -> &P {
        match self {
            Self::Distinct { write, .. } | Self::Shared(write) => write,
        }
    }

    /// Pool serving lookups.
    pub fn read(&self) -> &P {
        match self {
            Self::Distinct { read, .. } => read,
            Self::Shared(pool) => pool,
        }
    }

    /// `true` when reads and writes share one pool.
    pub fn is_shared(&self) -> bool {
        matches!(self, Self::Shared(_))
    }
}

impl<P: ManagedPool> PoolTopology<P> {
    async fn probe(&self) -> Result<(), DatabaseError> {
        self.write()
            .ping()
            .await
            .map_err(|source| DatabaseError::Connect {
                pool: PRIMARY_POOL,
                source,
            })?;
        if let Self::Distinct { read, .. } = self {
            read.ping().await.map_err(|source| DatabaseError::Connect {
                pool: READ_REPLICA_POOL,
                source,
            })?;
        }
        Ok(())
    }

    /// Release each physical pool exactly once, attempting all of them.
    async fn release(&self) -> Result<(), DatabaseError> {
        let write = self
            .write()
            .close()
            .await
            .map_err(|source| DatabaseError::Release {
                pool: PRIMARY_POOL,
                source,
            });
        let read = match self {
            Self::Distinct { read, .. } => {
                read.close().await.map_err(|source| DatabaseError::Release {
                    pool: READ_REPLICA_POOL,
                    source,
                })
            }
            Self::Shared(_) => Ok(()),
        };
        write.and(read)
    }
}

/// Fixed-delay bounded retry for start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    /// One initial attempt plus five retries, five seconds apart.
    fn default() -> Self {
        Self {
            max_retries: 5,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Build a policy allowing `max_retries` retries after the first attempt.
    #[must_use]
    pub const fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Total number of attempts including the first.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait between attempts.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }
}

/// Owns the write and read pools for the lifetime of the service.
///
/// # Examples
///
/// ```no_run
/// use birthday::outbound::persistence::{ConnectionManager, DatabaseSettings};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let manager = ConnectionManager::new(&DatabaseSettings::default());
/// manager.initialize(&CancellationToken::new()).await?;
/// let health = manager.check_health().await;
/// assert!(health.primary);
/// manager.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct ConnectionManager<C: PoolConnector = PgConnector> {
    connector: C,
    write_config: PoolConfig,
    read_config: Option<PoolConfig>,
    policy: RetryPolicy,
    pools: OnceCell<PoolTopology<C::Pool>>,
    closed: AtomicBool,
}

impl ConnectionManager<PgConnector> {
    /// Manager for real PostgreSQL pools with the default retry policy.
    #[must_use]
    pub fn new(settings: &DatabaseSettings) -> Self {
        Self::with_connector(PgConnector, settings)
    }
}

impl<C: PoolConnector> ConnectionManager<C> {
    /// Manager using a custom pool connector.
    pub fn with_connector(connector: C, settings: &DatabaseSettings) -> Self {
        Self {
            connector,
            write_config: settings.write_pool_config(),
            read_config: settings.read_pool_config(),
            policy: RetryPolicy::default(),
            pools: OnceCell::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Replace the start-up retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Connect, probe, and create the schema, retrying on failure.
    ///
    /// Succeeds immediately once a previous call has succeeded. Concurrent
    /// callers wait for the same attempt.
    ///
    /// # Errors
    ///
    /// - [`DatabaseError::RetriesExhausted`] when every attempt failed.
    /// - [`DatabaseError::Cancelled`] when `cancel` fired first.
    /// - [`DatabaseError::Closed`] after [`close`](Self::close).
    pub async fn initialize(&self, cancel: &CancellationToken) -> Result<(), DatabaseError> {
        if self.is_closed() {
            return Err(DatabaseError::Closed);
        }
        self.pools
            .get_or_try_init(|| self.connect_with_retry(cancel))
            .await
            .map(drop)
    }

    async fn connect_with_retry(
        &self,
        cancel: &CancellationToken,
    ) -> Result<PoolTopology<C::Pool>, DatabaseError> {
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 1;
        loop {
            info!(attempt, max_attempts, "initializing database connection");
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(DatabaseError::Cancelled),
                outcome = self.attempt() => outcome,
            };

            let err = match outcome {
                Ok(topology) => {
                    info!(
                        attempt,
                        shared = topology.is_shared(),
                        "database connection initialized"
                    );
                    return Ok(topology);
                }
                Err(err) => err,
            };

            if attempt >= max_attempts {
                error!(attempts = attempt, error = %err, "database initialization failed");
                return Err(DatabaseError::RetriesExhausted {
                    attempts: attempt,
                    source: Box::new(err),
                });
            }

            warn!(
                attempt,
                max_attempts,
                delay_ms = self.policy.delay().as_millis(),
                error = %err,
                "database initialization attempt failed; retrying"
            );
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(DatabaseError::Cancelled),
                () = sleep(self.policy.delay()) => {}
            }
            attempt += 1;
        }
    }

    async fn attempt(&self) -> Result<PoolTopology<C::Pool>, DatabaseError> {
        let write = self
            .connector
            .connect(&self.write_config)
            .await
            .map_err(|source| DatabaseError::Connect {
                pool: PRIMARY_POOL,
                source,
            })?;

        let topology = match &self.read_config {
            None => PoolTopology::Shared(write),
            Some(config) => match self.connector.connect(config).await {
                Ok(read) => PoolTopology::Distinct { write, read },
                Err(source) => {
                    discard(&PoolTopology::Shared(write)).await;
                    return Err(DatabaseError::Connect {
                        pool: READ_REPLICA_POOL,
                        source,
                    });
                }
            },
        };

        let ready = async {
            topology.probe().await?;
            topology
                .write()
                .execute_script(SCHEMA_SQL)
                .await
                .map_err(|source| DatabaseError::Schema { source })
        };
        if let Err(err) = ready.await {
            discard(&topology).await;
            return Err(err);
        }
        Ok(topology)
    }

    fn topology(&self) -> Result<&PoolTopology<C::Pool>, DatabaseError> {
        if self.is_closed() {
            return Err(DatabaseError::Closed);
        }
        self.pools.get().ok_or(DatabaseError::NotInitialized)
    }

    /// Pool for inserts and updates.
    ///
    /// # Errors
    ///
    /// [`DatabaseError::NotInitialized`] before a successful
    /// [`initialize`](Self::initialize); [`DatabaseError::Closed`] after
    /// [`close`](Self::close).
    pub fn get_write_pool(&self) -> Result<&C::Pool, DatabaseError> {
        self.topology().map(PoolTopology::write)
    }

    /// Pool for lookups; the write pool when no replica is configured.
    ///
    /// # Errors
    ///
    /// As for [`get_write_pool`](Self::get_write_pool).
    pub fn get_read_pool(&self) -> Result<&C::Pool, DatabaseError> {
        self.topology().map(PoolTopology::read)
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Probe each physical pool, reporting failures as `false`.
    ///
    /// Before initialisation, or after close, both fields are `false`.
    pub async fn check_health(&self) -> DatabaseHealth {
        let Ok(topology) = self.topology() else {
            return DatabaseHealth::default();
        };
        let primary = probe_ok(PRIMARY_POOL, topology.write()).await;
        match topology {
            PoolTopology::Shared(_) => DatabaseHealth::shared(primary),
            PoolTopology::Distinct { read, .. } => {
                DatabaseHealth::new(primary, probe_ok(READ_REPLICA_POOL, read).await)
            }
        }
    }

    /// Release the pools once; later calls are no-ops.
    ///
    /// # Errors
    ///
    /// [`DatabaseError::Release`] for the first pool that failed to close.
    /// The remaining pool is still released.
    pub async fn close(&self) -> Result<(), DatabaseError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            debug!("connection manager already closed");
            return Ok(());
        }
        let Some(topology) = self.pools.get() else {
            return Ok(());
        };
        topology.release().await?;
        info!("database pools closed");
        Ok(())
    }
}

async fn probe_ok<P: ManagedPool>(pool: &'static str, handle: &P) -> bool {
    match handle.ping().await {
        Ok(()) => true,
        Err(err) => {
            warn!(pool, error = %err, "database health probe failed");
            false
        }
    }
}

async fn discard<P: ManagedPool>(topology: &PoolTopology<P>) {
    if let Err(err) = topology.release().await {
        warn!(error = %err, "failed to release pools from a failed attempt");
    }
}

#[async_trait]
impl<C: PoolConnector> DatabaseHealthProbe for ConnectionManager<C> {
    async fn check_health(&self) -> DatabaseHealth {
        ConnectionManager::check_health(self).await
    }
}

#[cfg(test)]
#[path = "connection_manager_tests.rs"]
mod tests;
