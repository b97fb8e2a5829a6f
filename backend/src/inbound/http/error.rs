//! Domain error → HTTP response mapping.
//!
//! Client faults (400, 404, 409, 429) are returned as raised. Database
//! unavailability becomes 503 with its message intact. Anything else becomes
//! a 500 whose message is replaced before it leaves the process; the original
//! is logged under the same trace identifier.

use actix_web::error::JsonPayloadError;
use actix_web::{HttpResponse, ResponseError, http::StatusCode, web};
use tracing::{debug, error, warn};

pub use crate::domain::ApiResult;
use crate::domain::{Error, ErrorCode, TRACE_ID_HEADER};

const REDACTED_MESSAGE: &str = "Internal server error";

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
        ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Body sent to the client for `error`, logging what it hides.
fn public_body(error: &Error) -> Error {
    let trace_id = error.trace_id();
    match error.code() {
        ErrorCode::InternalError => {
            error!(trace_id, message = error.message(), "request failed");
            let redacted = Error::internal(REDACTED_MESSAGE);
            match trace_id {
                Some(id) => redacted.with_trace_id(id),
                None => redacted,
            }
        }
        ErrorCode::ServiceUnavailable => {
            warn!(trace_id, message = error.message(), "database unavailable");
            error.clone()
        }
        code => {
            debug!(trace_id, ?code, message = error.message(), "request rejected");
            error.clone()
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        status_for(self.code())
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        if let Some(id) = self.trace_id() {
            builder.insert_header((TRACE_ID_HEADER, id));
        }
        builder.json(public_body(self))
    }
}

impl From<actix_web::Error> for Error {
    fn from(err: actix_web::Error) -> Self {
        error!(error = %err, "framework error surfaced as internal error");
        Self::internal(REDACTED_MESSAGE)
    }
}

/// JSON extractor configuration rendering payload errors as `invalid_request`.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let message = match &err {
            JsonPayloadError::ContentType => "Content-Type must be application/json".to_owned(),
            other => format!("Invalid JSON body: {other}"),
        };
        debug!(error = %err, "rejected JSON payload");
        Error::invalid_request(message).into()
    })
}
