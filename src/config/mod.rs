//! Configuration management.
//!
//! chainward configuration can come from:
//! - Environment variables (CHAINWARD_*)
//! - Config file (~/.config/chainward/config.toml)

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::store::SparqlStoreConfig;

/// chainward configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Graph store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Validation run configuration
    #[serde(default)]
    pub validation: ValidationConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

fn default_port() -> u16 {
    8090
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

/// Graph store (SPARQL endpoint) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SPARQL query endpoint URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Per-query timeout (seconds)
    #[serde(default = "default_store_timeout")]
    pub request_timeout_seconds: u64,

    /// Emit typed integer literals when matching object ids (needed for
    /// Virtuoso endpoints)
    #[serde(default)]
    pub typed_integer_literals: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            request_timeout_seconds: default_store_timeout(),
            typed_integer_literals: false,
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:7878/query".to_string()
}

fn default_store_timeout() -> u64 {
    30
}

impl StoreConfig {
    pub fn to_sparql_config(&self) -> SparqlStoreConfig {
        SparqlStoreConfig {
            endpoint: self.endpoint.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_seconds),
            typed_integer_literals: self.typed_integer_literals,
        }
    }
}

/// Validation run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Hard wall-clock deadline for a whole validation run (seconds). The
    /// traversal has no cycle detection; this deadline is the only
    /// termination guarantee against pathological models.
    #[serde(default = "default_run_timeout")]
    pub timeout_seconds: u64,

    /// Evaluation worker count; defaults to available CPU parallelism.
    #[serde(default)]
    pub workers: Option<usize>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_run_timeout(),
            workers: None,
        }
    }
}

fn default_run_timeout() -> u64 {
    120
}

impl ValidationConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Config {
    /// Load configuration from default locations.
    pub fn load() -> Self {
        let mut config = Self::default();

        let primary_path = Self::config_dir().join("config.toml");
        if let Ok(partial) = Self::load_partial_from_path(&primary_path) {
            config.apply_partial(partial);
        }

        config.apply_env_overrides();
        config
    }

    /// Get the config directory.
    pub fn config_dir() -> std::path::PathBuf {
        dirs::config_dir()
            .map(|d| d.join("chainward"))
            .unwrap_or_else(|| std::path::PathBuf::from(".chainward"))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("CHAINWARD_SERVER_PORT") {
            if let Ok(parsed) = port.parse::<u16>() {
                self.server.port = parsed;
            }
        }
        if let Ok(host) = std::env::var("CHAINWARD_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(endpoint) = std::env::var("CHAINWARD_STORE_ENDPOINT") {
            self.store.endpoint = endpoint;
        }
        if let Ok(timeout) = std::env::var("CHAINWARD_STORE_TIMEOUT_SECONDS") {
            if let Ok(parsed) = timeout.parse::<u64>() {
                self.store.request_timeout_seconds = parsed;
            }
        }
        if let Ok(typed) = std::env::var("CHAINWARD_STORE_TYPED_INTEGERS") {
            self.store.typed_integer_literals = typed.to_lowercase() == "true";
        }
        if let Ok(timeout) = std::env::var("CHAINWARD_VALIDATION_TIMEOUT_SECONDS") {
            if let Ok(parsed) = timeout.parse::<u64>() {
                self.validation.timeout_seconds = parsed;
            }
        }
        if let Ok(workers) = std::env::var("CHAINWARD_VALIDATION_WORKERS") {
            if let Ok(parsed) = workers.parse::<usize>() {
                self.validation.workers = Some(parsed);
            }
        }
    }

    fn load_partial_from_path(path: &Path) -> std::result::Result<PartialConfig, ()> {
        let content = std::fs::read_to_string(path).map_err(|_| ())?;
        toml::from_str(&content).map_err(|_| ())
    }

    fn apply_partial(&mut self, partial: PartialConfig) {
        if let Some(server) = partial.server {
            self.server = server;
        }
        if let Some(store) = partial.store {
            self.store = store;
        }
        if let Some(validation) = partial.validation {
            self.validation = validation;
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    server: Option<ServerConfig>,
    store: Option<StoreConfig>,
    validation: Option<ValidationConfig>,
}
