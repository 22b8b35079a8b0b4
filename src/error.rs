//! # Error Handling
//!
//! This module defines the error type returned by every HTTP handler and how
//! each variant is turned into an HTTP response.
//!
//! ## Error Categories:
//! - **ValidationError** (400): the caller sent something unusable, including a
//!   URL that could not be downloaded
//! - **AudioProcessingError** (500): the external rendering routine failed
//! - **NotFound** (404): a requested artifact does not exist
//! - **Internal** (500): server faults; the message is logged but never echoed
//!   back to the client
//!
//! ## JSON Response Format:
//! Every error response has the same shape:
//! ```json
//! { "error": "No URL provided" }
//! ```

use actix_web::error::JsonPayloadError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;
use tracing::{error, warn};

/// Message sent to clients in place of internal fault details.
pub const REDACTED_MESSAGE: &str = "Internal server error";

/// Custom error types for the application.
///
/// ## Usage Example:
/// ```rust
/// return Err(AppError::ValidationError("No URL provided".to_string()));
/// ```
#[derive(Debug)]
pub enum AppError {
    /// Caller input problem: missing or unusable URL, bad variant, malformed body
    ValidationError(String),

    /// The rendering routine could not produce an artifact
    AudioProcessingError(String),

    /// Requested artifact was not found
    NotFound(String),

    /// Unexpected server-side fault
    Internal(String),
}

impl AppError {
    /// Message that is safe to show to the caller.
    ///
    /// Internal faults collapse to a generic message so that paths, command
    /// lines and the like never leak into responses.
    pub fn public_message(&self) -> &str {
        match self {
            AppError::ValidationError(msg)
            | AppError::AudioProcessingError(msg)
            | AppError::NotFound(msg) => msg,
            AppError::Internal(_) => REDACTED_MESSAGE,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::AudioProcessingError(msg) => write!(f, "Audio processing error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

/// Converts errors to HTTP responses.
///
/// ## HTTP Status Code Mapping:
/// - ValidationError → 400 (Bad Request)
/// - NotFound → 404 (Not Found)
/// - AudioProcessingError / Internal → 500 (Internal Server Error)
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AudioProcessingError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        // Full detail stays in the server log
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "Request rejected");
        }

        HttpResponse::build(status).json(json!({
            "error": self.public_message(),
        }))
    }
}

/// Any `anyhow` error reaching a handler is an internal fault.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Malformed JSON bodies are the caller's problem, so they map to 400.
impl From<JsonPayloadError> for AppError {
    fn from(err: JsonPayloadError) -> Self {
        AppError::ValidationError(format!("JSON parsing error: {}", err))
    }
}

/// Shorthand for `Result<T, AppError>`.
pub type AppResult<T> = Result<T, AppError>;
