//! On-disk snapshot helpers
//!
//! Snapshots are JSON when the file name ends in `.json` and bincode otherwise.

use ariadne_common::errors::{AppError, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn load_error(path: &Path, message: impl ToString) -> AppError {
    AppError::DataLoad {
        path: path.display().to_string(),
        message: message.to_string(),
    }
}

/// Read and decode a snapshot file
pub fn read<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = std::fs::read(path).map_err(|e| load_error(path, e))?;

    if is_json(path) {
        serde_json::from_slice(&bytes).map_err(|e| load_error(path, e))
    } else {
        bincode::deserialize(&bytes).map_err(|e| load_error(path, e))
    }
}

/// Encode and write a snapshot file
pub fn write<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = if is_json(path) {
        serde_json::to_vec(value)?
    } else {
        bincode::serialize(value).map_err(|e| AppError::Internal {
            message: format!("Failed to encode snapshot: {}", e),
        })?
    };

    std::fs::write(path, bytes)?;
    Ok(())
}
