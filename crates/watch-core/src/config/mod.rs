//! Application configuration with layered loading.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//!
//! 1. **Compiled defaults**: `Default` implementations and `set_default` calls
//! 2. **Config file**: TOML file named by the `UPGRADE_WATCH_CONFIG` env var
//! 3. **Environment variables**: `UPGRADE_WATCH__<SECTION>__<KEY>`, e.g.
//!    `UPGRADE_WATCH__REFRESH__INTERVAL_SECONDS=120` or
//!    `UPGRADE_WATCH__REFRESH__MAINNETS=osmosis,juno`
//!
//! # Example
//!
//! ```toml
//! [refresh]
//! interval_seconds = 60
//! mainnets = ["osmosis", "cosmoshub"]
//!
//! [registry]
//! source = "directory"
//! directory = "/var/lib/chain-registry"
//!
//! [detector]
//! blacklist = ["https://api.omniflix.nodestake.top"]
//! ```

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::Path, time::Duration};

use crate::{
    detector::{DetectorConfig, DEFAULT_BLACKLIST},
    scheduler::RefreshConfig,
    types::NetworkSelection,
    upstream::{HttpClientConfig, ProbeConfig},
};

const ENV_PREFIX: &str = "UPGRADE_WATCH";
const CONFIG_PATH_ENV: &str = "UPGRADE_WATCH_CONFIG";

/// HTTP server configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub bind_port: u16,
    /// Upper bound for a single request, including an inline `/fetch` detection.
    pub request_timeout_seconds: u64,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            bind_port: 5000,
            request_timeout_seconds: 30,
            max_body_bytes: 64 * 1024,
        }
    }
}

/// Background refresh loop settings and the optional watch-list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshSettings {
    pub interval_seconds: u64,
    pub retry_backoff_seconds: u64,
    /// Empty together with `testnets` means every network in the registry.
    pub mainnets: Vec<String>,
    pub testnets: Vec<String>,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self { interval_seconds: 60, retry_backoff_seconds: 10, mainnets: Vec::new(), testnets: Vec::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    pub timeout_ms: u64,
    pub concurrency: usize,
    pub max_healthy: usize,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self { timeout_ms: 1000, concurrency: 10, max_healthy: 5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    pub query_timeout_ms: u64,
    pub eta_window_blocks: u64,
    pub blacklist: Vec<String>,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            query_timeout_ms: 3000,
            eta_window_blocks: 10_000,
            blacklist: DEFAULT_BLACKLIST.iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrySourceKind {
    #[default]
    Github,
    Directory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    pub source: RegistrySourceKind,
    /// Local chain-registry checkout, required for the `directory` source.
    pub directory: Option<String>,
    pub api_base_url: String,
    pub raw_base_url: String,
    pub repository: String,
    pub branch: String,
    /// How long a downloaded listing is reused before the next download.
    pub retain_hours: u64,
    pub fetch_concurrency: usize,
    pub request_timeout_ms: u64,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            source: RegistrySourceKind::Github,
            directory: None,
            api_base_url: "https://api.github.com".to_string(),
            raw_base_url: "https://raw.githubusercontent.com".to_string(),
            repository: "cosmos/chain-registry".to_string(),
            branch: "master".to_string(),
            retain_hours: 3,
            fetch_concurrency: 10,
            request_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TagSettings {
    pub api_base_url: String,
    pub ttl_seconds: u64,
    pub max_pages: u32,
    pub request_timeout_ms: u64,
    /// Falls back to `GITHUB_TOKEN` when unset.
    pub token: Option<String>,
}

impl Default for TagSettings {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.github.com".to_string(),
            ttl_seconds: 600,
            max_pages: 3,
            request_timeout_ms: 3000,
            token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub accept_invalid_certs: bool,
    pub concurrent_limit: usize,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        let defaults = HttpClientConfig::default();
        Self {
            accept_invalid_certs: defaults.accept_invalid_certs,
            concurrent_limit: defaults.concurrent_limit,
            user_agent: defaults.user_agent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub refresh: RefreshSettings,
    pub probe: ProbeSettings,
    pub detector: DetectorSettings,
    pub registry: RegistrySettings,
    pub tags: TagSettings,
    pub http: HttpSettings,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Loads configuration from a TOML file with environment overrides.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a source cannot be parsed or deserialized.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let config_builder = Config::builder()
            .set_default("server.bind_address", "0.0.0.0")?
            .set_default("server.bind_port", 5000)?
            .set_default("refresh.interval_seconds", 60)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name(&config_path.as_ref().to_string_lossy()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("refresh.mainnets")
                    .with_list_parse_key("refresh.testnets")
                    .with_list_parse_key("detector.blacklist"),
            )
            .build()?;

        config_builder.try_deserialize()
    }

    /// Loads configuration from `config/config.toml`, or the path in `UPGRADE_WATCH_CONFIG`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration cannot be loaded or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config/config.toml".to_string());
        Self::from_file(&config_path)
    }

    /// Returns the parsed socket address for the HTTP server.
    ///
    /// # Errors
    ///
    /// Returns an error string if the address cannot be parsed.
    pub fn socket_addr(&self) -> Result<std::net::SocketAddr, String> {
        format!("{}:{}", self.server.bind_address, self.server.bind_port).parse().map_err(|_| {
            format!("Invalid socket address: {}:{}", self.server.bind_address, self.server.bind_port)
        })
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_seconds)
    }

    #[must_use]
    pub fn watch_list(&self) -> NetworkSelection {
        NetworkSelection { mainnets: self.refresh.mainnets.clone(), testnets: self.refresh.testnets.clone() }
    }

    #[must_use]
    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            concurrent_limit: self.http.concurrent_limit,
            accept_invalid_certs: self.http.accept_invalid_certs,
            user_agent: self.http.user_agent.clone(),
            ..HttpClientConfig::default()
        }
    }

    #[must_use]
    pub fn probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            timeout: Duration::from_millis(self.probe.timeout_ms),
            concurrency: self.probe.concurrency,
            max_healthy: self.probe.max_healthy,
        }
    }

    #[must_use]
    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            probe: self.probe_config(),
            query_timeout: Duration::from_millis(self.detector.query_timeout_ms),
            eta_window_blocks: self.detector.eta_window_blocks,
            blacklist: self.detector.blacklist.iter().cloned().collect::<HashSet<_>>(),
        }
    }

    #[must_use]
    pub fn refresh_config(&self) -> RefreshConfig {
        RefreshConfig {
            interval: Duration::from_secs(self.refresh.interval_seconds),
            retry_backoff: Duration::from_secs(self.refresh.retry_backoff_seconds),
            watch_list: self.watch_list(),
        }
    }

    /// Token for the GitHub API, from config or the `GITHUB_TOKEN` env var.
    #[must_use]
    pub fn github_token(&self) -> Option<String> {
        self.tags
            .token
            .clone()
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .filter(|t| !t.trim().is_empty())
    }

    /// Validates the configuration for correctness and consistency.
    ///
    /// # Errors
    ///
    /// Returns a descriptive error string if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.bind_port == 0 {
            return Err("Bind port must be greater than 0".to_string());
        }

        if self.refresh.interval_seconds == 0 {
            return Err("Refresh interval must be greater than 0".to_string());
        }

        if self.probe.concurrency == 0 {
            return Err("Probe concurrency must be greater than 0".to_string());
        }

        if self.probe.max_healthy == 0 {
            return Err("Probe max_healthy must be greater than 0".to_string());
        }

        if self.probe.timeout_ms == 0 || self.detector.query_timeout_ms == 0 {
            return Err("Probe and query timeouts must be greater than 0".to_string());
        }

        if self.http.concurrent_limit == 0 {
            return Err("HTTP concurrent limit must be greater than 0".to_string());
        }

        if self.registry.source == RegistrySourceKind::Directory &&
            self.registry.directory.as_deref().map_or(true, |d| d.trim().is_empty())
        {
            return Err("Registry source 'directory' requires registry.directory".to_string());
        }

        for url in [&self.registry.api_base_url, &self.registry.raw_base_url, &self.tags.api_base_url] {
            if !url.starts_with("http") {
                return Err(format!("Invalid base URL: {url}"));
            }
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err("Logging format must be 'json' or 'pretty'".to_string());
        }

        Ok(())
    }
}
