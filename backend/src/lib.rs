//! Birthday greeting service library.
//!
//! The crate is laid out hexagonally: `domain` holds the birthday rules and
//! the ports, `inbound::http` adapts them to actix-web, and
//! `outbound::persistence` implements the user repository over PostgreSQL
//! through the [`outbound::persistence::ConnectionManager`].

pub mod doc;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
pub use domain::TraceId;
pub use middleware::Trace;
