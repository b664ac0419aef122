//! CLI arguments for sysvitals.
//!
//! This module defines the command-line interface structure using the clap
//! library.

use clap::{Parser, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "sysvitals",
    about = "Live system telemetry streams with bounded replay history",
    long_about = "Live system telemetry streams with bounded replay history.\n\n\
                  Samples CPU, memory, storage, network, and GPU metrics on configurable \
                  intervals and serves each metric as a multi-subscriber event stream that \
                  replays recent history to newly connected clients.",
    version = "0.1.0",
    propagate_version = true
)]
pub struct Args {
    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Network interface directory to read byte counters from,
    /// e.g. /sys/class/net/eth0
    #[arg(long)]
    pub net_interface_path: Option<PathBuf>,

    /// Path under which the host filesystem is mounted (for containers)
    #[arg(long)]
    pub host_root: Option<String>,

    /// Skip CPU temperature collection
    #[arg(long)]
    pub disable_cpu_temps: bool,
}
