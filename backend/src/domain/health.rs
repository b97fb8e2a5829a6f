//! Database reachability snapshot reported by readiness probes.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result of probing the write pool and the read pool.
///
/// When no read replica is configured the read pool is the write pool, so
/// `read_replica` mirrors `primary`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseHealth {
    /// Write pool answered a trivial query.
    pub primary: bool,
    /// Read pool answered a trivial query.
    pub read_replica: bool,
}

impl DatabaseHealth {
    /// Build a snapshot for distinct write and read pools.
    #[must_use]
    pub const fn new(primary: bool, read_replica: bool) -> Self {
        Self {
            primary,
            read_replica,
        }
    }

    /// Build a snapshot for a single pool serving both roles.
    #[must_use]
    pub const fn shared(primary: bool) -> Self {
        Self::new(primary, primary)
    }

    /// The service can take traffic only while the primary is reachable.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.primary
    }
}
