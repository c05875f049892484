use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/certwatch.toml";
pub const CONFIG_ENV_VAR: &str = "CERTWATCH_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Hostnames whose certificates are monitored. Static for the lifetime of
    /// the process.
    #[serde(default = "default_targets")]
    pub targets: Vec<String>,

    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            data_dir: default_data_dir(),
            targets: default_targets(),
            probe: ProbeConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Budget for TCP connect plus TLS handshake, per host.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_tls_port")]
    pub tls_port: u16,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            tls_port: default_tls_port(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_schedule_enabled")]
    pub enabled: bool,
    /// Seconds between reconciliation runs; 0 disables re-checking.
    #[serde(default = "default_recheck_interval_secs")]
    pub recheck_interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: default_schedule_enabled(),
            recheck_interval_secs: default_recheck_interval_secs(),
        }
    }
}

fn default_http_port() -> u16 {
    8080
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_targets() -> Vec<String> {
    vec![
        "google.com".to_string(),
        "github.com".to_string(),
        "example.com".to_string(),
    ]
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_tls_port() -> u16 {
    443
}

fn default_max_concurrent() -> usize {
    10
}

fn default_schedule_enabled() -> bool {
    true
}

fn default_recheck_interval_secs() -> u64 {
    86400
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{path}'"))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file '{path}'"))?;
        Ok(config)
    }

    /// Like [`ServerConfig::load`], but a missing file yields the defaults.
    /// A file that exists and fails to parse is still an error.
    pub fn load_or_default(path: &str) -> anyhow::Result<Self> {
        if !Path::new(path).exists() {
            tracing::warn!(path, "Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Resolves the config path from an explicit argument, then
    /// `CERTWATCH_CONFIG`, then the default location.
    pub fn resolve_path(arg: Option<&str>) -> String {
        arg.map(str::to_string)
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }

    /// Configured targets, trimmed, without blanks or repeats. First
    /// occurrence wins so the run order follows the file.
    pub fn hosts(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.targets
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .filter(|t| seen.insert(t.to_ascii_lowercase()))
            .map(str::to_string)
            .collect()
    }
}
