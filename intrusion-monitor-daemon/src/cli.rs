//! CLI argument definitions for the intrusion-monitor daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/intrusion-monitor/intrusion-monitor.toml";

/// SSH intrusion monitor.
///
/// Tails an authentication log, recognizes failed SSH logins and writes
/// them to InfluxDB as `failed_logins` points, optionally geolocated.
#[derive(Parser, Debug)]
#[command(name = "intrusion-monitor")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to intrusion-monitor.toml configuration file.
    ///
    /// A missing file at the default location falls back to defaults
    /// plus environment variables.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Override the watched authentication log path.
    #[arg(long)]
    pub log_path: Option<String>,

    /// Override PID file path (takes precedence over config file).
    #[arg(long)]
    pub pid_file: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,

    /// Run a single log line through the parser and print the outcome as JSON.
    ///
    /// No geolocation lookup and no database write are performed.
    #[arg(long, value_name = "LINE")]
    pub parse: Option<String>,
}

impl DaemonCli {
    /// Whether `--config` was left at its default value.
    pub fn uses_default_config(&self) -> bool {
        self.config.as_os_str() == DEFAULT_CONFIG_PATH
    }
}
