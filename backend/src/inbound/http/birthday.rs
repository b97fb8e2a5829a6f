//! Birthday HTTP handlers.
//!
//! ```text
//! PUT /hello/{username}  Save or update a date of birth
//! GET /hello/{username}  Greeting with days until the next birthday
//! ```
//!
//! Both handlers are mounted under [`GREETING_SCOPE`] so the scope can carry
//! its own middleware.

use actix_web::{HttpResponse, get, put, web};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::domain::Error;
use crate::domain::ports::SaveOutcome;
use crate::inbound::http::ApiResult;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{parse_date_of_birth, parse_username};

/// Path prefix the greeting handlers are registered under.
pub const GREETING_SCOPE: &str = "/hello";

/// Request payload for saving a date of birth.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BirthdayRequest {
    /// Calendar date in `YYYY-MM-DD` form, strictly before today.
    #[schema(example = "1990-05-15")]
    pub date_of_birth: Option<String>,
}

/// Response payload carrying the rendered greeting.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct GreetingResponse {
    /// Happy-birthday message or the days remaining.
    #[schema(example = "Hello, alice! Your birthday is in 5 day(s)")]
    pub message: String,
}

/// Save or update the date of birth for `username`.
#[utoipa::path(
    put,
    path = "/hello/{username}",
    params(("username" = String, Path, description = "Letters-only username")),
    request_body = BirthdayRequest,
    responses(
        (status = 204, description = "Date of birth saved"),
        (status = 400, description = "Invalid username or date", body = Error),
        (status = 409, description = "Concurrent first save for the same username", body = Error),
        (status = 429, description = "Too many requests from this client", body = Error),
        (status = 503, description = "Database unavailable", body = Error),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["birthday"],
    operation_id = "putBirthday"
)]
#[put("/{username}")]
pub async fn put_birthday(
    state: web::Data<HttpState>,
    path: web::Path<String>,
    payload: web::Json<BirthdayRequest>,
) -> ApiResult<HttpResponse> {
    let username = parse_username(&path)?;
    let date_of_birth = parse_date_of_birth(payload.date_of_birth.as_deref(), state.today())?;

    let outcome = state
        .birthdays
        .save_birthday(&username, date_of_birth)
        .await?;
    let outcome = match outcome {
        SaveOutcome::Created => "created",
        SaveOutcome::Updated => "updated",
    };
    info!(%username, outcome, "birthday saved");
    Ok(HttpResponse::NoContent().finish())
}

/// Greet `username` with the days until their next birthday.
#[utoipa::path(
    get,
    path = "/hello/{username}",
    params(("username" = String, Path, description = "Letters-only username")),
    responses(
        (status = 200, description = "Greeting", body = GreetingResponse),
        (status = 400, description = "Invalid username", body = Error),
        (status = 404, description = "User not found", body = Error),
        (status = 429, description = "Too many requests from this client", body = Error),
        (status = 503, description = "Database unavailable", body = Error),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["birthday"],
    operation_id = "getBirthday"
)]
#[get("/{username}")]
pub async fn get_birthday(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let username = parse_username(&path)?;
    let greeting = state
        .greetings
        .greeting(&username)
        .await?
        .ok_or_else(|| Error::not_found("User not found"))?;

    Ok(HttpResponse::Ok().json(GreetingResponse {
        message: greeting.message(),
    }))
}

#[cfg(test)]
#[path = "birthday_tests.rs"]
mod tests;
