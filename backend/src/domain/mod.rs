//! Domain primitives, the birthday calculator and the use-case service.
//!
//! Purpose: keep the birthday rules transport agnostic. HTTP adapters and
//! persistence adapters meet the domain only through the traits in
//! [`ports`].
//!
//! Public surface:
//! - `Username`, `BirthdayRecord`: the persisted entity and its key.
//! - `BirthdayGreeting`, `days_until_next_birthday`: the calculator.
//! - `DatabaseHealth`: pool reachability snapshot.
//! - `Error`, `ErrorCode`: the single API-facing error payload.
//! - `BirthdayService`: save-or-update and greeting lookups.

pub mod birthday;
pub mod birthday_service;
pub mod error;
pub mod health;
pub mod ports;
pub mod trace_id;
pub mod user;

pub use self::birthday::{
    BirthdayError, BirthdayGreeting, birthday_in_year, compute_message, days_until_next_birthday,
};
pub use self::birthday_service::BirthdayService;
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::health::DatabaseHealth;
pub use self::trace_id::{TRACE_ID_HEADER, TraceId};
pub use self::user::{BirthdayRecord, USERNAME_MAX, Username, UsernameValidationError};

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use actix_web::HttpResponse;
/// use birthday::domain::{ApiResult, Error};
///
/// fn handler() -> ApiResult<HttpResponse> {
///     Err(Error::not_found("User not found"))
/// }
/// ```
pub type ApiResult<T> = Result<T, Error>;
