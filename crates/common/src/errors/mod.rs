//! Error types for KGRAG services
//!
//! Provides a single error taxonomy with:
//! - Distinct variants for each collaborator failure (graph, generation, linking)
//! - HTTP status code mapping
//! - The `{output, status, msg}` error body used by the HTTP boundary
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    MissingField,

    // Rate limiting (6xxx)
    RateLimited,

    // External collaborator errors (8xxx)
    GraphQueryFailed,
    GenerationUnavailable,
    MalformedUpstreamResponse,
    LinkingFailed,
    UpstreamError,
    Timeout,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::MissingField => 1002,

            ErrorCode::RateLimited => 6001,

            ErrorCode::GraphQueryFailed => 8001,
            ErrorCode::GenerationUnavailable => 8002,
            ErrorCode::MalformedUpstreamResponse => 8003,
            ErrorCode::LinkingFailed => 8004,
            ErrorCode::UpstreamError => 8005,
            ErrorCode::Timeout => 8006,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Required field missing: {field}")]
    MissingField { field: String },

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // Collaborator errors
    #[error("Graph query failed for {entity} ({entity_type}): {message}")]
    GraphQueryFailed {
        entity: String,
        entity_type: String,
        message: String,
    },

    #[error("Generation service unavailable: {message}")]
    GenerationUnavailable { message: String },

    #[error("Malformed upstream response: {message}")]
    MalformedUpstreamResponse { message: String },

    #[error("Entity linking failed: {message}")]
    Linking { message: String },

    #[error("Deadline of {timeout_ms}ms exceeded")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::MissingField { .. } => ErrorCode::MissingField,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::GraphQueryFailed { .. } => ErrorCode::GraphQueryFailed,
            AppError::GenerationUnavailable { .. } => ErrorCode::GenerationUnavailable,
            AppError::MalformedUpstreamResponse { .. } => ErrorCode::MalformedUpstreamResponse,
            AppError::Linking { .. } => ErrorCode::LinkingFailed,
            AppError::Timeout { .. } => ErrorCode::Timeout,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } | AppError::MissingField { .. } => StatusCode::BAD_REQUEST,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::GraphQueryFailed { .. }
            | AppError::MalformedUpstreamResponse { .. }
            | AppError::Linking { .. }
            | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            AppError::GenerationUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,

            // 504 Gateway Timeout
            AppError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Error body returned by the HTTP boundary
///
/// Shares the shape of a successful answer so that clients only ever parse
/// one structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub output: Vec<String>,
    pub status: String,
    pub msg: String,
    pub code: ErrorCode,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            output: vec![String::new()],
            status: "error".to_string(),
            msg: message,
            code,
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}
