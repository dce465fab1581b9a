use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub sixgraph: SixgraphConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub http_server: HttpServerConfig,
}

/// Store locations and logging
#[derive(Debug, Clone, Deserialize)]
pub struct SixgraphConfig {
    /// SQLite file holding user nodes, CONNECTED_TO edges and the HAS_DEGREE cache.
    pub graph_db_path: PathBuf,
    /// SQLite file holding posts, reactions and the mirrored connection rows.
    pub store_db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Where the feed engine takes degree and chat eligibility from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EligibilitySource {
    /// Traverse CONNECTED_TO on every request
    #[default]
    Live,
    /// Read the materialized HAS_DEGREE cache
    Cached,
}

/// Query engine tuning
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
    #[serde(default = "default_page_limit")]
    pub default_page_limit: usize,
    #[serde(default = "default_max_page_limit")]
    pub max_page_limit: usize,
    #[serde(default)]
    pub eligibility: EligibilitySource,
    #[serde(default = "default_mirror_enabled")]
    pub mirror_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            query_timeout_ms: default_query_timeout_ms(),
            default_page_limit: default_page_limit(),
            max_page_limit: default_max_page_limit(),
            eligibility: EligibilitySource::default(),
            mirror_enabled: default_mirror_enabled(),
        }
    }
}

impl EngineConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            port: default_http_port(),
            allowed_origins: Vec::new(),
        }
    }
}

fn default_query_timeout_ms() -> u64 {
    5000
}

fn default_page_limit() -> usize {
    20
}

fn default_max_page_limit() -> usize {
    100
}

fn default_mirror_enabled() -> bool {
    true
}

fn default_http_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in SIXGRAPH_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        let _ = dotenv::dotenv();

        let config_path = std::env::var("SIXGRAPH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .context("Failed to parse config.toml")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.engine.query_timeout_ms == 0 {
            anyhow::bail!("engine.query_timeout_ms must be greater than 0");
        }

        if self.engine.default_page_limit == 0 {
            anyhow::bail!("engine.default_page_limit must be greater than 0");
        }

        if self.engine.default_page_limit > self.engine.max_page_limit {
            anyhow::bail!(
                "engine.default_page_limit ({}) must not exceed engine.max_page_limit ({})",
                self.engine.default_page_limit,
                self.engine.max_page_limit
            );
        }

        if self.sixgraph.graph_db_path == self.sixgraph.store_db_path {
            anyhow::bail!("graph_db_path and store_db_path must point at different files");
        }

        Ok(())
    }

    /// Get graph database path
    pub fn graph_db_path(&self) -> &Path {
        &self.sixgraph.graph_db_path
    }

    /// Get content store database path
    pub fn store_db_path(&self) -> &Path {
        &self.sixgraph.store_db_path
    }
}
