//! Request middleware.
//!
//! Purpose: define middleware components for request lifecycle concerns such
//! as trace correlation, request logging, per-client rate limiting and
//! response hardening.

pub mod headers;
pub mod rate_limit;
pub mod trace;

pub use headers::{cors, security_headers};
pub use rate_limit::{RateLimit, RateLimitConfig, RateLimiter};
pub use trace::Trace;
