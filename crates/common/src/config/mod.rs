//! Configuration management for KGRAG services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::knowledge::RetrievalProfile;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Graph store configuration
    #[serde(default)]
    pub graph: GraphConfig,

    /// Generation service configuration
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Evidence selection and prompt bounds
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Entity dictionary configuration
    #[serde(default)]
    pub linker: LinkerConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Optional knowledge schema file replacing the built-in medical schema
    #[serde(default)]
    pub schema_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Whole-question deadline in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphConfig {
    /// Neo4j HTTP endpoint
    #[serde(default = "default_graph_url")]
    pub url: String,

    /// Database name
    #[serde(default = "default_graph_database")]
    pub database: String,

    /// User for basic auth
    #[serde(default = "default_graph_user")]
    pub user: String,

    /// Password for basic auth
    pub password: Option<String>,

    /// Per-query timeout in seconds
    #[serde(default = "default_graph_timeout")]
    pub timeout_secs: u64,

    /// Traversal depth (hops from the queried entity)
    #[serde(default = "default_graph_depth")]
    pub depth: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// Generation endpoint
    #[serde(default = "default_generation_url")]
    pub url: String,

    /// Per-attempt timeout in seconds
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    /// Additional attempts after the first one
    #[serde(default = "default_generation_retries")]
    pub max_retries: u32,

    /// Pause between attempts in milliseconds
    #[serde(default = "default_generation_backoff")]
    pub backoff_millis: u64,

    /// Generation ceiling sent with every request
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Extraction/ranking profile
    #[serde(default)]
    pub profile: RetrievalProfile,

    /// Maximum facts handed to prompt assembly
    #[serde(default = "default_max_total_facts")]
    pub max_total_facts: usize,

    /// Direct-fact count at which indirect facts are no longer admitted
    #[serde(default = "default_max_direct_facts")]
    pub max_direct_facts: usize,

    /// Outer cap on rendered evidence lines
    #[serde(default = "default_prompt_max_items")]
    pub prompt_max_items: usize,

    /// Concurrent (entity, type) extractions per question
    #[serde(default = "default_extraction_concurrency")]
    pub extraction_concurrency: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinkerConfig {
    /// Directory holding one `<entity type>.txt` vocabulary per type
    #[serde(default = "default_dict_dir")]
    pub dict_dir: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error) or a full EnvFilter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for logs
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (global)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 3002 }
fn default_request_timeout() -> u64 { 300 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_graph_url() -> String { "http://127.0.0.1:7474".to_string() }
fn default_graph_database() -> String { "neo4j".to_string() }
fn default_graph_user() -> String { "neo4j".to_string() }
fn default_graph_timeout() -> u64 { 30 }
fn default_graph_depth() -> u32 { 1 }
fn default_generation_url() -> String { "http://127.0.0.1:3001/generate".to_string() }
fn default_generation_timeout() -> u64 { 120 }
fn default_generation_retries() -> u32 { 10 }
fn default_generation_backoff() -> u64 { 1000 }
fn default_max_tokens() -> u32 { 256 }
fn default_max_total_facts() -> usize { 50 }
fn default_max_direct_facts() -> usize { 30 }
fn default_prompt_max_items() -> usize { 50 }
fn default_extraction_concurrency() -> usize { 4 }
fn default_dict_dir() -> String { "dict".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "kgrag".to_string() }
fn default_rate_limit() -> u32 { 10 }
fn default_burst() -> u32 { 20 }
fn default_enabled() -> bool { true }

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
            // e.g., APP__GRAPH__URL=http://neo4j:7474
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Get the whole-question deadline as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}

impl GraphConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_millis)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            url: default_graph_url(),
            database: default_graph_database(),
            user: default_graph_user(),
            password: None,
            timeout_secs: default_graph_timeout(),
            depth: default_graph_depth(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            url: default_generation_url(),
            timeout_secs: default_generation_timeout(),
            max_retries: default_generation_retries(),
            backoff_millis: default_generation_backoff(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            profile: RetrievalProfile::default(),
            max_total_facts: default_max_total_facts(),
            max_direct_facts: default_max_direct_facts(),
            prompt_max_items: default_prompt_max_items(),
            extraction_concurrency: default_extraction_concurrency(),
        }
    }
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            dict_dir: default_dict_dir(),
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

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            graph: GraphConfig::default(),
            generation: GenerationConfig::default(),
            retrieval: RetrievalConfig::default(),
            linker: LinkerConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
            schema_path: None,
        }
    }
}
