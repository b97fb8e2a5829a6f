//! Driving port for database reachability checks.

use async_trait::async_trait;

use crate::domain::DatabaseHealth;

/// Reports pool reachability without failing.
///
/// Implementations downgrade every probe error to `false`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DatabaseHealthProbe: Send + Sync {
    /// Probe the write pool and the read pool.
    async fn check_health(&self) -> DatabaseHealth;
}

/// Probe reporting a fixed snapshot, for wiring handlers without a database.
#[derive(Debug, Clone, Copy)]
pub struct FixtureDatabaseHealthProbe(pub DatabaseHealth);

#[async_trait]
impl DatabaseHealthProbe for FixtureDatabaseHealthProbe {
    async fn check_health(&self) -> DatabaseHealth {
        self.0
    }
}
