//! HTTP server configuration object and helpers.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

#[cfg(feature = "metrics")]
use actix_web_prom::PrometheusMetrics;
use birthday::middleware::RateLimitConfig;
use mockable::Env;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_ENVIRONMENT: &str = "development";

/// Errors raised while reading the server configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServerConfigError {
    /// `PORT` is present but is not a usable TCP port.
    #[error("invalid value for PORT='{value}'; expected a TCP port (1-65535)")]
    InvalidPort { value: String },
    /// A rate-limit variable is present but is not a positive integer.
    #[error("invalid value for {name}='{value}'; expected a positive integer")]
    InvalidRateLimit { name: &'static str, value: String },
}

/// Listener address, deployment label and request limits for the HTTP
/// server, plus the Prometheus middleware when metrics are compiled in.
pub struct ServerConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) environment: String,
    pub(crate) rate_limit: RateLimitConfig,
    #[cfg(feature = "metrics")]
    pub(crate) prometheus: Option<PrometheusMetrics>,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("ServerConfig");
        debug
            .field("bind_addr", &self.bind_addr)
            .field("environment", &self.environment)
            .field("rate_limit", &self.rate_limit);
        #[cfg(feature = "metrics")]
        debug.field("metrics", &self.prometheus.is_some());
        debug.finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            environment: DEFAULT_ENVIRONMENT.to_owned(),
            rate_limit: RateLimitConfig::default(),
            #[cfg(feature = "metrics")]
            prometheus: None,
        }
    }
}

impl ServerConfig {
    /// Read `PORT`, `APP_ENV`, `RATE_LIMIT_MAX` and `RATE_LIMIT_WINDOW_MS`,
    /// falling back to `3000`, `development`, 100 requests and 15 minutes.
    ///
    /// # Errors
    ///
    /// Returns [`ServerConfigError`] when a variable is present but unusable.
    pub fn from_env<E: Env>(env: &E) -> Result<Self, ServerConfigError> {
        let port = match non_empty(env, "PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .ok()
                .filter(|port| *port != 0)
                .ok_or(ServerConfigError::InvalidPort { value: raw })?,
            None => DEFAULT_PORT,
        };
        let environment =
            non_empty(env, "APP_ENV").unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_owned());

        let defaults = RateLimitConfig::default();
        let max_requests = positive_or(env, "RATE_LIMIT_MAX", defaults.max_requests)?;
        let window = positive_or(
            env,
            "RATE_LIMIT_WINDOW_MS",
            u64::try_from(defaults.window.as_millis()).unwrap_or(u64::MAX),
        )
        .map(Duration::from_millis)?;

        Ok(Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
            environment,
            rate_limit: RateLimitConfig {
                max_requests,
                window,
            },
            #[cfg(feature = "metrics")]
            prometheus: None,
        })
    }

    /// Return the socket address the server will bind to.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    /// Deployment label reported by the detailed health endpoint.
    #[must_use]
    pub fn environment(&self) -> &str {
        &self.environment
    }

    #[cfg(feature = "metrics")]
    /// Attach Prometheus middleware to the configuration.
    #[must_use]
    pub fn with_metrics(mut self, prometheus: Option<PrometheusMetrics>) -> Self {
        self.prometheus = prometheus;
        self
    }
}

fn non_empty<E: Env>(env: &E, name: &str) -> Option<String> {
    env.string(name)
        .map(|raw| raw.trim().to_owned())
        .filter(|raw| !raw.is_empty())
}

fn positive_or<E, T>(env: &E, name: &'static str, fallback: T) -> Result<T, ServerConfigError>
where
    E: Env,
    T: std::str::FromStr + PartialOrd + Default,
{
    match non_empty(env, name) {
        None => Ok(fallback),
        Some(value) => value
            .parse::<T>()
            .ok()
            .filter(|parsed| *parsed > T::default())
            .ok_or(ServerConfigError::InvalidRateLimit { name, value }),
    }
}
