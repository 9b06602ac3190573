//! Paper metadata catalog
//!
//! Resolves graph node ids to display metadata (MAG/OpenAlex id and title).
//! Nodes without a title are treated as having no downstream metadata and
//! are never surfaced in ranked feeds.

use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

const OPENALEX_WORK_PREFIX: &str = "https://openalex.org/W";

/// Read-only lookup from node id to display metadata
pub trait MetadataLookup: Send + Sync {
    /// Title for a node, if one is known
    fn title(&self, node_id: usize) -> Option<&str>;

    /// Whether the node can be shown to a user
    fn is_displayable(&self, node_id: usize) -> bool {
        self.title(node_id).is_some()
    }
}

/// One catalog entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaperRecord {
    /// Dense graph node id
    pub node_id: usize,

    /// MAG id in OpenAlex URL form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mag_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// In-memory catalog loaded once at startup
#[derive(Debug, Default)]
pub struct PaperCatalog {
    by_node: HashMap<usize, PaperRecord>,
    by_mag_id: HashMap<String, usize>,
}

impl PaperCatalog {
    /// Build a catalog from records; MAG ids are normalized on insert
    pub fn from_records(records: impl IntoIterator<Item = PaperRecord>) -> Self {
        let mut catalog = Self::default();

        for mut record in records {
            if let Some(mag_id) = record.mag_id.take() {
                let key = normalize_mag_id(&mag_id);
                catalog.by_mag_id.insert(key.clone(), record.node_id);
                record.mag_id = Some(key);
            }
            catalog.by_node.insert(record.node_id, record);
        }

        catalog
    }

    /// Load a JSON array of [`PaperRecord`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| AppError::DataLoad {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let records: Vec<PaperRecord> = serde_json::from_slice(&bytes).map_err(|e| AppError::DataLoad {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let catalog = Self::from_records(records);
        tracing::info!(
            path = %path.display(),
            papers = catalog.len(),
            with_mag_id = catalog.by_mag_id.len(),
            "Paper catalog loaded"
        );
        Ok(catalog)
    }

    pub fn get(&self, node_id: usize) -> Option<&PaperRecord> {
        self.by_node.get(&node_id)
    }

    /// Look up a paper by MAG id in any of the accepted spellings
    pub fn find_by_mag_id(&self, mag_id: &str) -> Option<&PaperRecord> {
        self.by_mag_id
            .get(&normalize_mag_id(mag_id))
            .and_then(|node_id| self.by_node.get(node_id))
    }

    pub fn len(&self) -> usize {
        self.by_node.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_node.is_empty()
    }
}

impl MetadataLookup for PaperCatalog {
    fn title(&self, node_id: usize) -> Option<&str> {
        self.by_node.get(&node_id).and_then(|r| r.title.as_deref())
    }
}

/// Normalize a MAG id to the OpenAlex URL form used as catalog key.
///
/// Accepts `1578902217`, `W1578902217` and `https://openalex.org/W1578902217`.
pub fn normalize_mag_id(mag_id: &str) -> String {
    let s = mag_id.trim();
    if s.starts_with("http") {
        return s.to_string();
    }
    if let Some(rest) = s.strip_prefix('W') {
        return format!("{}{}", OPENALEX_WORK_PREFIX, rest);
    }
    if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
        return format!("{}{}", OPENALEX_WORK_PREFIX, s);
    }
    format!("https://openalex.org/{}", s)
}

/// Numeric part of a MAG id, as expected by OpenAlex `ids.mag` filters
pub fn mag_id_numeric(mag_id: &str) -> &str {
    let s = mag_id.trim();
    s.strip_prefix(OPENALEX_WORK_PREFIX)
        .or_else(|| s.strip_prefix('W'))
        .unwrap_or(s)
}
