//! Per-request correlation identifier.
//!
//! The `Trace` middleware resolves one [`TraceId`] per request, either from a
//! well-formed inbound `trace-id` header or freshly generated, and runs the
//! handler inside [`TraceId::scope`]. Error constructors and log events read
//! it back through [`TraceId::current`].
//!
//! The identifier is task-local: work spawned onto another task must be
//! wrapped in [`TraceId::scope`] again to keep it.

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use tokio::task_local;
use uuid::Uuid;

/// Request and response header carrying the trace identifier.
pub const TRACE_ID_HEADER: &str = "trace-id";

task_local! {
    static CURRENT: TraceId;
}

/// UUID correlating a request with its logs and error bodies.
///
/// # Examples
/// ```
/// use birthday::TraceId;
///
/// let reused = TraceId::resolve(Some("5f0c6c1e-3c1d-4d4b-9b7e-0d7f5e9d2a10"));
/// assert_eq!(reused.to_string(), "5f0c6c1e-3c1d-4d4b-9b7e-0d7f5e9d2a10");
///
/// let fresh = TraceId::resolve(Some("not-a-uuid"));
/// assert_ne!(fresh.to_string(), "not-a-uuid");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(Uuid);

impl TraceId {
    /// Random identifier for a request that did not bring one.
    #[must_use]
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Reuse a caller-supplied header value when it is a non-nil UUID,
    /// otherwise generate a new identifier.
    #[must_use]
    pub fn resolve(header: Option<&str>) -> Self {
        header
            .map(str::trim)
            .and_then(|raw| raw.parse::<Self>().ok())
            .filter(|id| !id.0.is_nil())
            .unwrap_or_else(Self::generate)
    }

    /// Identifier of the request being served, if any.
    #[must_use]
    pub fn current() -> Option<Self> {
        CURRENT.try_with(|id| *id).ok()
    }

    /// Run `fut` with `trace_id` as the current identifier.
    ///
    /// # Examples
    /// ```
    /// use birthday::TraceId;
    ///
    /// # tokio::runtime::Runtime::new().expect("runtime").block_on(async {
    /// let trace_id = TraceId::resolve(None);
    /// let observed = TraceId::scope(trace_id, async move { TraceId::current() }).await;
    /// assert_eq!(observed, Some(trace_id));
    /// # });
    /// ```
    pub async fn scope<Fut>(trace_id: Self, fut: Fut) -> Fut::Output
    where
        Fut: Future,
    {
        CURRENT.scope(trace_id, fut).await
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl FromStr for TraceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}
