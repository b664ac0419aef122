//! Configuration management for sysvitals.
//!
//! This module handles loading, merging, and validating configuration from
//! files and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9216;

/// Polling parameters of one metric stream. Immutable after startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Whether the metric is sampled at all; a disabled metric's stream
    /// never emits (default: true)
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Number of samples retained for replay to new subscribers
    /// (default: 20)
    #[serde(default = "default_history_depth")]
    pub history_depth: usize,

    /// Sampling interval in milliseconds (default: 1000)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_enabled() -> bool {
    true
}
fn default_history_depth() -> usize {
    20
}
fn default_interval_ms() -> u64 {
    1000
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            history_depth: default_history_depth(),
            interval_ms: default_interval_ms(),
        }
    }
}

impl PollConfig {
    fn with(history_depth: usize, interval_ms: u64) -> Self {
        Self {
            enabled: true,
            history_depth,
            interval_ms,
        }
    }
}

/// A single storage snapshot is enough for rendering; usage moves slowly.
fn default_storage_poll() -> PollConfig {
    PollConfig::with(1, 60_000)
}

/// Speed tests are expensive; once an hour, latest result only.
fn default_speed_test_poll() -> PollConfig {
    PollConfig::with(1, 3_600_000)
}

/// Effective service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Per-metric polling
    #[serde(default)]
    pub cpu: PollConfig,
    #[serde(default)]
    pub ram: PollConfig,
    #[serde(default = "default_storage_poll")]
    pub storage: PollConfig,
    #[serde(default)]
    pub network: PollConfig,
    #[serde(default)]
    pub gpu: PollConfig,
    #[serde(default = "default_speed_test_poll")]
    pub speed_test: PollConfig,

    // Collector tuning
    #[serde(alias = "enable-cpu-temps")]
    pub enable_cpu_temps: Option<bool>,
    /// Filesystem types excluded from drive attribution, appended to the
    /// built-in network/union filesystem list.
    #[serde(alias = "fs-type-filter")]
    pub fs_type_filter: Option<Vec<String>>,
    /// Interface statistics directory, e.g. `/sys/class/net/eth0`; when
    /// set, network counters are read from its rx_bytes/tx_bytes files.
    #[serde(alias = "net-interface-path")]
    pub net_interface_path: Option<PathBuf>,
    /// Path under which the host filesystem is visible (`/mnt/host` in
    /// containerized deployments).
    #[serde(alias = "host-root")]
    pub host_root: Option<String>,
    /// Speed test command invoked for the speed_test stream.
    #[serde(alias = "speed-test-command")]
    pub speed_test_command: Option<String>,

    // Logging
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            cpu: PollConfig::default(),
            ram: PollConfig::default(),
            storage: default_storage_poll(),
            network: PollConfig::default(),
            gpu: PollConfig::default(),
            speed_test: default_speed_test_poll(),
            enable_cpu_temps: Some(true),
            fs_type_filter: None,
            net_interface_path: None,
            host_root: Some("/".to_string()),
            speed_test_command: Some("speedtest".to_string()),
            log_level: Some("info".into()),
        }
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let metrics = [
        ("cpu", &cfg.cpu),
        ("ram", &cfg.ram),
        ("storage", &cfg.storage),
        ("network", &cfg.network),
        ("gpu", &cfg.gpu),
        ("speed_test", &cfg.speed_test),
    ];

    for (name, poll) in metrics {
        if poll.history_depth == 0 {
            return Err(format!("{}: history_depth must be at least 1", name).into());
        }
        if poll.interval_ms == 0 {
            return Err(format!("{}: interval_ms must be at least 1", name).into());
        }
    }

    if !metrics.iter().any(|(_, poll)| poll.enabled) {
        return Err("at least one metric must be enabled".into());
    }

    if let Some(path) = &cfg.net_interface_path {
        if !path.join("statistics").is_dir() {
            return Err(format!(
                "net_interface_path {} has no statistics directory",
                path.display()
            )
            .into());
        }
    }

    if let Some(root) = &cfg.host_root {
        if !root.starts_with('/') {
            return Err(format!("host_root must be an absolute path, got '{}'", root).into());
        }
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref().and_then(|p| p.to_str()))?
    };

    // Override with CLI args
    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }

    // Only override port if the user supplied it on the CLI.
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }

    if let Some(iface) = &args.net_interface_path {
        config.net_interface_path = Some(iface.clone());
    }

    if let Some(root) = &args.host_root {
        config.host_root = Some(root.clone());
    }

    if args.disable_cpu_temps {
        config.enable_cpu_temps = Some(false);
    }

    Ok(config)
}

/// Enhanced configuration loading with multiple format support
pub fn load_config(path: Option<&str>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = if let Some(p) = path {
        PathBuf::from(p)
    } else {
        // Try default locations
        let defaults = [
            "/etc/sysvitals/config.yaml",
            "/etc/sysvitals/config.yml",
            "/etc/sysvitals/config.json",
            "./sysvitals.yaml",
            "./sysvitals.yml",
            "./sysvitals.json",
        ];

        defaults
            .iter()
            .find(|p| Path::new(p).exists())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(""))
    };

    if !path.exists() || path.to_string_lossy().is_empty() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };

    println!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(validate_effective_config(&config).is_ok());
    }

    #[test]
    fn test_zero_history_depth_rejected() {
        let mut config = Config::default();
        config.ram.history_depth = 0;
        assert!(validate_effective_config(&config).is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = Config::default();
        config.gpu.interval_ms = 0;
        assert!(validate_effective_config(&config).is_err());
    }

    #[test]
    fn test_all_disabled_rejected() {
        let mut config = Config::default();
        config.cpu.enabled = false;
        config.ram.enabled = false;
        config.storage.enabled = false;
        config.network.enabled = false;
        config.gpu.enabled = false;
        config.speed_test.enabled = false;
        assert!(validate_effective_config(&config).is_err());
    }

    #[test]
    fn test_relative_host_root_rejected() {
        let mut config = Config::default();
        config.host_root = Some("mnt/host".to_string());
        assert!(validate_effective_config(&config).is_err());
    }

    #[test]
    fn test_yaml_partial_config_fills_defaults() {
        let yaml = "\
cpu:
  interval_ms: 250
storage:
  enabled: false
";
        let config: Config = serde_yaml::from_str(yaml).expect("yaml");
        assert_eq!(config.cpu.interval_ms, 250);
        assert_eq!(config.cpu.history_depth, 20);
        assert!(!config.storage.enabled);
        // Untouched metrics keep their defaults.
        assert!(config.network.enabled);
        assert_eq!(config.speed_test.interval_ms, 3_600_000);
    }
}
