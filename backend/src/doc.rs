//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] registers the birthday endpoints, the health probes, and the
//! payload schemas they exchange. The generated document backs Swagger UI in
//! debug builds and is exported by `cargo run --bin openapi-dump`.

use utoipa::OpenApi;

use crate::domain::{DatabaseHealth, Error, ErrorCode};
use crate::inbound::http::birthday::{BirthdayRequest, GreetingResponse};
use crate::inbound::http::health::{
    HealthReport, LivenessResponse, MemoryUsage, ReadinessResponse,
};

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Birthday greeting API",
        description = "Store dates of birth and greet users with the days until their next birthday."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::inbound::http::birthday::put_birthday,
        crate::inbound::http::birthday::get_birthday,
        crate::inbound::http::health::live,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::detailed,
    ),
    components(schemas(
        Error,
        ErrorCode,
        DatabaseHealth,
        BirthdayRequest,
        GreetingResponse,
        LivenessResponse,
        ReadinessResponse,
        HealthReport,
        MemoryUsage
    )),
    tags(
        (name = "birthday", description = "Save dates of birth and read greetings"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;
