//! Shared validation helpers for inbound HTTP adapters.
//!
//! Failures carry a `details` object naming the offending field, the raw
//! value where one was supplied, and a stable validation code.

use chrono::NaiveDate;
use serde_json::json;

use crate::domain::{Error, Username, UsernameValidationError};

/// Validation error codes for HTTP request failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorCode {
    MissingField,
    InvalidUsername,
    InvalidDate,
    DateNotInPast,
}

impl ErrorCode {
    fn as_str(self) -> &'static str {
        match self {
            ErrorCode::MissingField => "missing_field",
            ErrorCode::InvalidUsername => "invalid_username",
            ErrorCode::InvalidDate => "invalid_date",
            ErrorCode::DateNotInPast => "date_not_in_past",
        }
    }
}

/// Newtype wrapper for HTTP field names to provide type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FieldName(&'static str);

impl FieldName {
    pub(crate) const fn new(name: &'static str) -> Self {
        Self(name)
    }

    fn as_str(&self) -> &str {
        self.0
    }
}

pub(crate) const USERNAME: FieldName = FieldName::new("username");
pub(crate) const DATE_OF_BIRTH: FieldName = FieldName::new("dateOfBirth");

/// Builder for validation errors with field context.
struct ValidationError {
    field: String,
    message: String,
}

impl ValidationError {
    fn new(field: FieldName, message: impl Into<String>) -> Self {
        Self {
            field: field.as_str().to_owned(),
            message: message.into(),
        }
    }

    fn with_code(self, code: ErrorCode) -> Error {
        Error::invalid_request(self.message).with_details(json!({
            "field": self.field,
            "code": code.as_str(),
        }))
    }

    fn with_value(self, code: ErrorCode, value: impl Into<String>) -> Error {
        Error::invalid_request(self.message).with_details(json!({
            "field": self.field,
            "value": value.into(),
            "code": code.as_str(),
        }))
    }
}

pub(crate) fn missing_field_error(field: FieldName, message: &str) -> Error {
    ValidationError::new(field, message).with_code(ErrorCode::MissingField)
}

/// Validate a path username.
pub(crate) fn parse_username(raw: &str) -> Result<Username, Error> {
    Username::new(raw).map_err(|err| match err {
        UsernameValidationError::Empty => missing_field_error(USERNAME, "Username is required"),
        other => ValidationError::new(USERNAME, other.to_string())
            .with_value(ErrorCode::InvalidUsername, raw),
    })
}

/// `true` when `raw` has exactly the `YYYY-MM-DD` shape.
fn is_iso_calendar_date(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(index, byte)| match index {
            4 | 7 => *byte == b'-',
            _ => byte.is_ascii_digit(),
        })
}

/// Validate a request date of birth: strict `YYYY-MM-DD`, strictly before
/// `today`.
pub(crate) fn parse_date_of_birth(raw: Option<&str>, today: NaiveDate) -> Result<NaiveDate, Error> {
    let Some(raw) = raw else {
        return Err(missing_field_error(DATE_OF_BIRTH, "Date of birth is required"));
    };
    let date = is_iso_calendar_date(raw)
        .then(|| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
        .flatten()
        .ok_or_else(|| {
            ValidationError::new(DATE_OF_BIRTH, "Date of birth must be a valid YYYY-MM-DD date")
                .with_value(ErrorCode::InvalidDate, raw)
        })?;
    if date >= today {
        return Err(
            ValidationError::new(DATE_OF_BIRTH, "Date of birth must be before today")
                .with_value(ErrorCode::DateNotInPast, raw),
        );
    }
    Ok(date)
}
