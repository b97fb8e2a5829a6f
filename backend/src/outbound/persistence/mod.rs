//! PostgreSQL persistence adapters using `sqlx`.
//!
//! This module provides the connection manager that owns the write and read
//! pools, the schema bootstrap, and the concrete `UserRepository` adapter.
//!
//! # Architecture
//!
//! - **Explicit ownership**: pools live in a [`ConnectionManager`] built by
//!   the composition root and shared through `Arc`; there is no global state.
//! - **Topology as data**: [`PoolTopology`] records whether reads share the
//!   write pool, so release and health probing touch each pool once.
//! - **Bounded start-up**: connect, probe, and schema creation are retried
//!   as one unit under a [`RetryPolicy`].
//! - **Strongly typed errors**: `sqlx` errors are mapped to domain
//!   persistence error types.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use birthday::outbound::persistence::{
//!     ConnectionManager, DatabaseSettings, PostgresUserRepository,
//! };
//!
//! let settings = DatabaseSettings::from_env(&mockable::DefaultEnv::new())?;
//! let manager = Arc::new(ConnectionManager::new(&settings));
//! manager.initialize(&cancel).await?;
//! let repo = PostgresUserRepository::new(manager.clone());
//! ```

mod connection_manager;
mod pool;
mod postgres_user_repository;
mod schema;
mod settings;

pub use connection_manager::{
    ConnectionManager, DatabaseError, ManagedPool, PRIMARY_POOL, PgConnector, PoolConnector,
    PoolTopology, READ_REPLICA_POOL, RetryPolicy,
};
pub use pool::{DbPool, PoolConfig, PoolError};
pub use postgres_user_repository::PostgresUserRepository;
pub use schema::SCHEMA_SQL;
pub use settings::{DatabaseConfigError, DatabaseSettings, Endpoint};
