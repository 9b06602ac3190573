//! API handlers module

pub mod embeddings;
pub mod feed;
pub mod health;
pub mod papers;
pub mod users;

use ariadne_common::errors::{AppError, Result};
use tokio::task;
use validator::ValidationErrors;

/// Map `validator` failures onto the API error type
pub(crate) fn validation_error(errors: ValidationErrors) -> AppError {
    let field = errors.field_errors().keys().next().map(|f| f.to_string());
    AppError::Validation {
        message: errors.to_string(),
        field,
    }
}

/// Run compute-bound core work on the blocking pool
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(work).await.map_err(|e| AppError::Internal {
        message: format!("Blocking task failed: {}", e),
    })?
}
