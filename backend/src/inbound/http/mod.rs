//! HTTP inbound adapter exposing REST endpoints.

pub mod birthday;
pub mod error;
pub mod health;
pub mod state;
pub mod validation;

pub use error::{ApiResult, json_config};
