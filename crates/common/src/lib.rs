//! Ariadne Common Library
//!
//! Shared code for the Ariadne services including:
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability
//! - Text embedding client abstraction
//! - Paper metadata catalog
//! - Per-user click history

pub mod catalog;
pub mod config;
pub mod embeddings;
pub mod errors;
pub mod history;
pub mod metrics;

// Re-export commonly used types
pub use catalog::{MetadataLookup, PaperCatalog};
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use history::HistoryStore;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
