//! Server construction and middleware wiring.

mod config;
#[cfg(feature = "metrics")]
mod metrics;

pub use config::ServerConfig;

#[cfg(feature = "metrics")]
pub(crate) use metrics::prometheus_metrics;
#[cfg(feature = "metrics")]
use metrics::MetricsLayer;

use std::sync::Arc;

use actix_web::body::MessageBody;
use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::middleware::Compress;
use actix_web::{App, HttpServer, web};

use birthday::Trace;
#[cfg(debug_assertions)]
use birthday::doc::ApiDoc;
use birthday::inbound::http::birthday::{GREETING_SCOPE, get_birthday, put_birthday};
use birthday::inbound::http::health::{HealthState, detailed, live, ready};
use birthday::inbound::http::json_config;
use birthday::inbound::http::state::HttpState;
use birthday::middleware::{RateLimit, RateLimiter, cors, security_headers};
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

#[derive(Clone)]
pub(crate) struct AppDependencies {
    pub(crate) health_state: web::Data<HealthState>,
    pub(crate) http_state: web::Data<HttpState>,
    pub(crate) rate_limiter: Arc<RateLimiter>,
}

pub(crate) fn build_app(
    deps: AppDependencies,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let AppDependencies {
        health_state,
        http_state,
        rate_limiter,
    } = deps;

    let greetings = web::scope(GREETING_SCOPE)
        .wrap(RateLimit::new(rate_limiter))
        .service(put_birthday)
        .service(get_birthday);

    let app = App::new()
        .app_data(health_state)
        .app_data(http_state)
        .app_data(json_config())
        .wrap(Compress::default())
        .wrap(security_headers())
        .wrap(cors())
        .wrap(Trace)
        .service(greetings)
        .service(live)
        .service(ready)
        .service(detailed);

    #[cfg(debug_assertions)]
    let app = app.service(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));
    #[cfg(not(debug_assertions))]
    let app = app;

    app
}

/// Construct an Actix HTTP server over the birthday and health handlers.
///
/// One rate limiter is shared by every worker. When metrics are compiled in
/// and attached to `config`, the whole app is wrapped by the Prometheus
/// middleware, which also serves `/metrics`.
///
/// Signal handling is disabled; the caller owns shutdown and stops the
/// server through its handle.
///
/// # Errors
/// Propagates [`std::io::Error`] when binding the socket fails.
pub fn create_server(
    health_state: web::Data<HealthState>,
    http_state: web::Data<HttpState>,
    config: ServerConfig,
) -> std::io::Result<Server> {
    let deps = AppDependencies {
        health_state: health_state.clone(),
        http_state,
        rate_limiter: Arc::new(RateLimiter::new(config.rate_limit)),
    };

    #[cfg(feature = "metrics")]
    let metrics_layer = MetricsLayer::from_option(config.prometheus);

    let server = HttpServer::new(move || {
        let app = build_app(deps.clone());

        #[cfg(feature = "metrics")]
        let app = app.wrap(metrics_layer.clone());

        app
    })
    .disable_signals()
    .bind(config.bind_addr)?
    .run();

    health_state.mark_ready();
    Ok(server)
}
