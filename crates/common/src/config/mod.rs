//! Configuration management for Ariadne services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Snapshot locations loaded at startup
    #[serde(default)]
    pub data: DataConfig,

    /// Neighbourhood sampling for cold-start inference
    #[serde(default)]
    pub gnn: GnnConfig,

    /// "For You" feed settings
    #[serde(default)]
    pub recommend: RecommendConfig,

    /// Text embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Allowed CORS origins; empty allows any origin
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataConfig {
    /// Citation graph snapshot (features + edges)
    #[serde(default = "default_graph_path")]
    pub graph_path: String,

    /// Precomputed corpus embeddings
    #[serde(default = "default_corpus_path")]
    pub corpus_path: String,

    /// Node id -> MAG id / title records
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,

    /// GNN weights (JSON)
    #[serde(default = "default_model_path")]
    pub model_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GnnConfig {
    /// Per-hop neighbour limits
    #[serde(default = "default_fanout")]
    pub fanout: Vec<usize>,

    /// Fixed sampling seed; entropy-seeded per request when unset
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecommendConfig {
    /// Ranked entries per feed
    #[serde(default = "default_k_similar")]
    pub k_similar: usize,

    /// Random exploration entries per feed
    #[serde(default = "default_k_random")]
    pub k_random: usize,

    /// Most-recent clicks kept per user
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,

    /// Users kept in memory; the least recently active is evicted beyond this
    #[serde(default = "default_max_users")]
    pub max_users: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: openrouter, mock
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension requested from the provider
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_graph_path() -> String { "data/graph.bin".to_string() }
fn default_corpus_path() -> String { "data/paper_embeddings_256d.bin".to_string() }
fn default_catalog_path() -> String { "data/catalog.json".to_string() }
fn default_model_path() -> String { "models/gnn_contrastive_v2.json".to_string() }
fn default_fanout() -> Vec<usize> { vec![10, 10, 5] }
fn default_k_similar() -> usize { 40 }
fn default_k_random() -> usize { 10 }
fn default_history_cap() -> usize { 5 }
fn default_max_users() -> usize { 100_000 }
fn default_embedding_provider() -> String { "openrouter".to_string() }
fn default_embedding_model() -> String { "google/gemini-embedding-001".to_string() }
fn default_embedding_dimension() -> usize { 384 }
fn default_embedding_timeout() -> u64 { 30 }
fn default_embedding_retries() -> u32 { 3 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "ariadne".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            allowed_origins: Vec::new(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            graph_path: default_graph_path(),
            corpus_path: default_corpus_path(),
            catalog_path: default_catalog_path(),
            model_path: default_model_path(),
        }
    }
}

impl Default for GnnConfig {
    fn default() -> Self {
        Self {
            fanout: default_fanout(),
            seed: None,
        }
    }
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            k_similar: default_k_similar(),
            k_random: default_k_random(),
            history_cap: default_history_cap(),
            max_users: default_max_users(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            max_retries: default_embedding_retries(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__GNN__SEED=7
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("gnn.fanout")
                    .with_list_parse_key("server.allowed_origins")
                    .try_parsing(true)
            )

            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the core cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recommend.history_cap == 0 {
            return Err(ConfigError::Message(
                "recommend.history_cap must be at least 1".to_string(),
            ));
        }
        if self.recommend.max_users == 0 {
            return Err(ConfigError::Message(
                "recommend.max_users must be at least 1".to_string(),
            ));
        }
        if self.gnn.fanout.is_empty() {
            tracing::warn!("gnn.fanout is empty; cold-start subgraphs will hold only the new paper");
        }
        Ok(())
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            data: DataConfig::default(),
            gnn: GnnConfig::default(),
            recommend: RecommendConfig::default(),
            embedding: EmbeddingConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.gnn.fanout, vec![10, 10, 5]);
        assert_eq!(config.recommend.history_cap, 5);
        assert_eq!(config.recommend.max_users, 100_000);
        assert!(config.gnn.seed.is_none());
    }

    #[test]
    fn test_zero_history_cap_rejected() {
        let mut config = AppConfig::default();
        config.recommend.history_cap = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.recommend.max_users = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_request_timeout() {
        let config = AppConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }
}
