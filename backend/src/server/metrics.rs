//! Prometheus request metrics and the `/metrics` scrape endpoint.
//!
//! Request counts and latencies are recorded under the `birthday` namespace.
//! On Linux the registry also carries the process collector, so resident
//! memory, CPU time and open descriptors are exported alongside them.

use std::sync::Arc;

use actix_service::{
    Service, ServiceExt as _, Transform,
    boxed::{self, BoxService},
};
use actix_web::body::{BoxBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::middleware::Compat;
use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};
use futures_util::future::LocalBoxFuture;
use prometheus::Registry;

const NAMESPACE: &str = "birthday";

/// Path the scrape endpoint is served on.
pub(crate) const METRICS_PATH: &str = "/metrics";

/// Build the Prometheus middleware over a fresh registry.
///
/// # Errors
/// Returns [`std::io::Error`] when a collector cannot be registered or the
/// middleware rejects its configuration.
pub(crate) fn prometheus_metrics() -> std::io::Result<PrometheusMetrics> {
    let registry = Registry::new();
    #[cfg(target_os = "linux")]
    registry
        .register(Box::new(prometheus::process_collector::ProcessCollector::for_self()))
        .map_err(|e| std::io::Error::other(format!("process collector registration failed: {e}")))?;

    PrometheusMetricsBuilder::new(NAMESPACE)
        .registry(registry)
        .endpoint(METRICS_PATH)
        .build()
        .map_err(|e| std::io::Error::other(format!("failed to configure Prometheus metrics: {e}")))
}

/// App-level wrapper that records metrics when a collector is attached and
/// passes requests through unchanged otherwise.
#[derive(Clone)]
pub(crate) enum MetricsLayer {
    Enabled(Arc<PrometheusMetrics>),
    Disabled,
}

impl MetricsLayer {
    #[must_use]
    pub(crate) fn from_option(metrics: Option<PrometheusMetrics>) -> Self {
        metrics.map_or(Self::Disabled, |metrics| Self::Enabled(Arc::new(metrics)))
    }
}

impl<S, B> Transform<S, ServiceRequest> for MetricsLayer
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = actix_web::Error;
    type InitError = ();
    type Transform = BoxService<ServiceRequest, ServiceResponse<BoxBody>, actix_web::Error>;
    type Future = LocalBoxFuture<'static, Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        match self.clone() {
            Self::Enabled(metrics) => {
                let fut = Compat::new((*metrics).clone()).new_transform(service);
                Box::pin(async move { Ok(boxed::service(fut.await?)) })
            }
            Self::Disabled => Box::pin(async move {
                let svc = service.map(|res: ServiceResponse<B>| res.map_into_boxed_body());
                Ok(boxed::service(svc))
            }),
        }
    }
}
