//! Error types shared by the GNN core and the gateway
//!
//! Every fallible call returns [`Result`]. Each [`AppError`] maps to a stable
//! [`ErrorCode`], and the code decides the HTTP status, so the core never
//! deals in status codes itself.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// Stable, client-facing error identifier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // bad input
    ValidationError,
    InvalidFormat,
    OutOfRangeReference,
    DimensionMismatch,
    PaperNotFound,

    // model and data
    InferenceFailed,
    DataLoadError,

    // text-embedding upstream
    UpstreamError,
    EmbeddingError,
    EmbeddingTimeout,

    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::ValidationError
            | ErrorCode::InvalidFormat
            | ErrorCode::OutOfRangeReference
            | ErrorCode::DimensionMismatch => StatusCode::BAD_REQUEST,

            ErrorCode::PaperNotFound => StatusCode::NOT_FOUND,

            ErrorCode::UpstreamError | ErrorCode::EmbeddingError => StatusCode::BAD_GATEWAY,
            ErrorCode::EmbeddingTimeout => StatusCode::GATEWAY_TIMEOUT,

            ErrorCode::InferenceFailed
            | ErrorCode::DataLoadError
            | ErrorCode::InternalError
            | ErrorCode::ConfigurationError
            | ErrorCode::SerializationError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    /// A citation, click or center id that names no node of the graph
    #[error("Node id {id} is out of range for a graph of {num_nodes} nodes")]
    OutOfRangeReference { id: i64, num_nodes: usize },

    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("Paper not found: {id}")]
    PaperNotFound { id: String },

    /// Model shape error or non-finite output; never retried
    #[error("Inference failed: {message}")]
    InferenceFailed { message: String },

    /// Startup data (graph, corpus, catalog, weights) could not be read
    #[error("Failed to load {path}: {message}")]
    DataLoad { path: String, message: String },

    #[error("Embedding service error: {message}")]
    EmbeddingError { message: String },

    #[error("Embedding request timed out after {timeout_ms}ms")]
    EmbeddingTimeout { timeout_ms: u64 },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::OutOfRangeReference { .. } => ErrorCode::OutOfRangeReference,
            AppError::DimensionMismatch { .. } => ErrorCode::DimensionMismatch,
            AppError::PaperNotFound { .. } => ErrorCode::PaperNotFound,
            AppError::InferenceFailed { .. } => ErrorCode::InferenceFailed,
            AppError::DataLoad { .. } => ErrorCode::DataLoadError,
            AppError::EmbeddingError { .. } => ErrorCode::EmbeddingError,
            AppError::EmbeddingTimeout { .. } => ErrorCode::EmbeddingTimeout,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } | AppError::Other(_) => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.code().status()
    }

    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Shorthand for a model failure
    pub fn inference(message: impl Into<String>) -> Self {
        AppError::InferenceFailed { message: message.into() }
    }

    /// Extra machine-readable context for the response body
    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::OutOfRangeReference { id, num_nodes } => {
                Some(serde_json::json!({ "id": id, "num_nodes": num_nodes }))
            }
            AppError::DimensionMismatch { what, expected, actual } => {
                Some(serde_json::json!({ "what": what, "expected": expected, "actual": actual }))
            }
            AppError::Validation { field: Some(field), .. } => Some(serde_json::json!({ "field": field })),
            _ => None,
        }
    }
}

/// JSON error body: `{ "error": { "code", "message", "details"? } }`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorPayload,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let status = code.status();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(error = %message, code = ?code, status = status.as_u16(), "Request failed");
        } else {
            tracing::warn!(error = %message, code = ?code, status = status.as_u16(), "Request rejected");
        }

        let body = ErrorBody {
            error: ErrorPayload {
                code,
                details: self.details(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal { message: err.to_string() }
    }
}
