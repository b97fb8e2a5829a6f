//! Health endpoints: liveness, readiness, and a detailed report.
//!
//! Liveness reflects the process lifecycle only. Readiness additionally
//! requires that start-up finished and the primary database answers a
//! trivial query. Probe responses are never cached.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use actix_web::{HttpResponse, HttpResponseBuilder, get, http::header, web};
use chrono::SecondsFormat;
use mockable::Clock;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::DatabaseHealth;
use crate::domain::ports::DatabaseHealthProbe;

const PRIMARY_UNAVAILABLE: &str = "Primary database is not available";
const PROC_STATUS: &str = "/proc/self/status";

/// Shared health state for the probes.
///
/// Starts not ready but live; the composition root marks it ready once the
/// server is bound and unhealthy when shutdown begins.
pub struct HealthState {
    ready: AtomicBool,
    live: AtomicBool,
    started: Instant,
    environment: String,
    probe: Arc<dyn DatabaseHealthProbe>,
    clock: Arc<dyn Clock>,
}

impl HealthState {
    /// Create a health state reporting `environment` and probing `probe`.
    pub fn new(
        probe: Arc<dyn DatabaseHealthProbe>,
        clock: Arc<dyn Clock>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            ready: AtomicBool::new(false),
            live: AtomicBool::new(true),
            started: Instant::now(),
            environment: environment.into(),
            probe,
            clock,
        }
    }

    /// Mark the service as ready.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Flag the service as unhealthy so probes fail fast during shutdown.
    pub fn mark_unhealthy(&self) {
        self.live.store(false, Ordering::Release);
        self.ready.store(false, Ordering::Release);
    }

    /// Return readiness state.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Return liveness state. When false, liveness probes emit 503.
    pub fn is_alive(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    fn timestamp(&self) -> String {
        self.clock.utc().to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    fn uptime_minutes(&self) -> u64 {
        self.started.elapsed().as_secs() / 60
    }
}

/// Liveness probe body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LivenessResponse {
    /// `ok` or `shutting down`.
    #[schema(example = "ok")]
    pub status: String,
    /// RFC 3339 UTC timestamp.
    pub timestamp: String,
}

/// Readiness probe body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReadinessResponse {
    /// `ready` or `not ready`.
    #[schema(example = "ready")]
    pub status: String,
    /// RFC 3339 UTC timestamp.
    pub timestamp: String,
    /// Pool reachability.
    pub database: DatabaseHealth,
    /// Reason the service is not ready.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Detailed health report body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthReport {
    /// Always `ok` when the process can answer.
    pub status: String,
    /// RFC 3339 UTC timestamp.
    pub timestamp: String,
    /// Process uptime, in whole minutes.
    #[schema(example = "42 minutes")]
    pub uptime: String,
    /// Pool reachability.
    pub database: DatabaseHealth,
    /// Deployment environment name.
    #[schema(example = "production")]
    pub environment: String,
    /// Process memory; absent where the platform does not expose it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryUsage>,
}

/// Process memory figures, each in whole megabytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MemoryUsage {
    /// Resident set size.
    #[schema(example = "48 MB")]
    pub rss: String,
}

impl MemoryUsage {
    /// Read the resident set size of this process from procfs.
    ///
    /// Returns `None` off Linux or when the status file is unreadable.
    pub fn current() -> Option<Self> {
        std::fs::read_to_string(PROC_STATUS)
            .ok()
            .as_deref()
            .and_then(Self::from_proc_status)
    }

    /// Parse the `VmRSS` line of a `/proc/<pid>/status` document.
    pub fn from_proc_status(status: &str) -> Option<Self> {
        let kib: u64 = status
            .lines()
            .find_map(|line| line.strip_prefix("VmRSS:"))?
            .split_whitespace()
            .next()?
            .parse()
            .ok()?;
        Some(Self {
            rss: format!("{} MB", (kib + 512) / 1024),
        })
    }
}

fn probe_response(ok: bool) -> HttpResponseBuilder {
    let mut response = if ok {
        HttpResponse::Ok()
    } else {
        HttpResponse::ServiceUnavailable()
    };
    response.insert_header((header::CACHE_CONTROL, "no-store"));
    response
}

/// Liveness probe. Return 200 while the process is alive and 503 once draining.
#[utoipa::path(
    get,
    path = "/health/live",
    tags = ["health"],
    responses(
        (status = 200, description = "Server is alive", body = LivenessResponse),
        (status = 503, description = "Server is shutting down", body = LivenessResponse)
    )
)]
#[get("/health/live")]
pub async fn live(state: web::Data<HealthState>) -> HttpResponse {
    let alive = state.is_alive();
    probe_response(alive).json(LivenessResponse {
        status: if alive { "ok" } else { "shutting down" }.to_owned(),
        timestamp: state.timestamp(),
    })
}

/// Readiness probe. Return 200 when start-up finished and the primary
/// database answers; return 503 otherwise.
#[utoipa::path(
    get,
    path = "/health/ready",
    tags = ["health"],
    responses(
        (status = 200, description = "Server is ready to handle traffic", body = ReadinessResponse),
        (status = 503, description = "Server is not ready", body = ReadinessResponse)
    )
)]
#[get("/health/ready")]
pub async fn ready(state: web::Data<HealthState>) -> HttpResponse {
    let database = state.probe.check_health().await;
    let ready = state.is_ready() && database.is_ready();
    let message = if database.is_ready() {
        (!ready).then(|| "Service is not accepting traffic".to_owned())
    } else {
        Some(PRIMARY_UNAVAILABLE.to_owned())
    };
    probe_response(ready).json(ReadinessResponse {
        status: if ready { "ready" } else { "not ready" }.to_owned(),
        timestamp: state.timestamp(),
        database,
        message,
    })
}

/// Detailed health report including uptime, environment and memory.
#[utoipa::path(
    get,
    path = "/health",
    tags = ["health"],
    responses((status = 200, description = "Health report", body = HealthReport))
)]
#[get("/health")]
pub async fn detailed(state: web::Data<HealthState>) -> HttpResponse {
    let database = state.probe.check_health().await;
    probe_response(true).json(HealthReport {
        status: "ok".to_owned(),
        timestamp: state.timestamp(),
        uptime: format!("{} minutes", state.uptime_minutes()),
        database,
        environment: state.environment.clone(),
        memory: MemoryUsage::current(),
    })
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
