//! Fixed-window request limiting keyed by client IP address.
//!
//! Each address may make `max_requests` requests per window. A window opens
//! with the address's first request and resets once it has elapsed. Requests
//! over the allowance are answered with 429 and a `Retry-After` header and
//! never reach the wrapped service.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use actix_web::body::EitherBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use actix_web::{Error, ResponseError};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use tracing::warn;

use crate::domain::Error as ApiError;

/// Message returned with every 429 response.
pub const RATE_LIMITED_MESSAGE: &str = "Too many requests from this IP, please try again later.";

const LIMIT_HEADER: &str = "x-ratelimit-limit";
const REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Tracked addresses above which expired windows are swept.
const SWEEP_THRESHOLD: usize = 10_000;

/// Allowance granted to each client address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests allowed per window.
    pub max_requests: u32,
    /// Length of one window.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(15 * 60),
        }
    }
}

/// Outcome of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The request fits the allowance; `remaining` more fit this window.
    Allowed { remaining: u32 },
    /// The allowance is spent until the window resets.
    Limited { retry_after: Duration },
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Per-address request counters shared by every worker.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<IpAddr, Window>>,
}

impl RateLimiter {
    /// Create a limiter with empty counters.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Allowance this limiter enforces.
    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Count a request from `ip` made now.
    pub fn check(&self, ip: IpAddr) -> Decision {
        self.check_at(ip, Instant::now())
    }

    /// Count a request from `ip` made at `now`.
    ///
    /// # Examples
    /// ```
    /// use std::net::{IpAddr, Ipv4Addr};
    /// use std::time::{Duration, Instant};
    /// use birthday::middleware::rate_limit::{Decision, RateLimitConfig, RateLimiter};
    ///
    /// let limiter = RateLimiter::new(RateLimitConfig {
    ///     max_requests: 1,
    ///     window: Duration::from_secs(60),
    /// });
    /// let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
    /// let now = Instant::now();
    ///
    /// assert_eq!(limiter.check_at(ip, now), Decision::Allowed { remaining: 0 });
    /// assert!(matches!(limiter.check_at(ip, now), Decision::Limited { .. }));
    /// ```
    pub fn check_at(&self, ip: IpAddr, now: Instant) -> Decision {
        let window = self.config.window;
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        if windows.len() >= SWEEP_THRESHOLD {
            windows.retain(|_, entry| now.saturating_duration_since(entry.started) < window);
        }

        let entry = windows.entry(ip).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.saturating_duration_since(entry.started) >= window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.config.max_requests {
            let elapsed = now.saturating_duration_since(entry.started);
            return Decision::Limited {
                retry_after: window.saturating_sub(elapsed),
            };
        }
        entry.count += 1;
        Decision::Allowed {
            remaining: self.config.max_requests - entry.count,
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Middleware enforcing a [`RateLimiter`] on the wrapped routes.
///
/// Share one limiter across workers so counts are per process.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use actix_web::{App, web};
/// use birthday::middleware::rate_limit::{RateLimit, RateLimitConfig, RateLimiter};
///
/// let limiter = Arc::new(RateLimiter::new(RateLimitConfig::default()));
/// let app = App::new().service(web::scope("/hello").wrap(RateLimit::new(limiter)));
/// ```
#[derive(Clone)]
pub struct RateLimit {
    limiter: Arc<RateLimiter>,
}

impl RateLimit {
    /// Enforce `limiter` on every request through the wrapped service.
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddleware {
            service,
            limiter: Arc::clone(&self.limiter),
        }))
    }
}

/// Service wrapper produced by [`RateLimit`].
pub struct RateLimitMiddleware<S> {
    service: S,
    limiter: Arc<RateLimiter>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let ip = client_ip(&req);
        let limit = self.limiter.config().max_requests;
        match self.limiter.check(ip) {
            Decision::Allowed { remaining } => {
                let fut = self.service.call(req);
                Box::pin(async move {
                    let mut res = fut.await?;
                    set_allowance(res.headers_mut(), limit, remaining);
                    Ok(res.map_into_left_body())
                })
            }
            Decision::Limited { retry_after } => Box::pin(async move {
                warn!(client = %ip, path = req.path(), "rate limit exceeded");
                let mut response = ApiError::too_many_requests(RATE_LIMITED_MESSAGE).error_response();
                let headers = response.headers_mut();
                set_allowance(headers, limit, 0);
                headers.insert(RETRY_AFTER, HeaderValue::from(whole_seconds(retry_after)));
                Ok(req.into_response(response).map_into_right_body())
            }),
        }
    }
}

/// Socket peer address; requests without one share a single bucket.
fn client_ip(req: &ServiceRequest) -> IpAddr {
    req.peer_addr()
        .map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |addr| addr.ip())
}

fn set_allowance(headers: &mut HeaderMap, limit: u32, remaining: u32) {
    headers.insert(HeaderName::from_static(LIMIT_HEADER), HeaderValue::from(limit));
    headers.insert(
        HeaderName::from_static(REMAINING_HEADER),
        HeaderValue::from(remaining),
    );
}

/// Round up to whole seconds, never below one.
fn whole_seconds(duration: Duration) -> u64 {
    let seconds = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
    seconds.max(1)
}
