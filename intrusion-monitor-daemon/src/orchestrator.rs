//! Daemon bootstrap -- configuration, startup checks and watchdog lifecycle.
//!
//! # Startup Order
//!
//! 1. Load `intrusion-monitor.toml`, apply environment and CLI overrides, validate
//! 2. Initialize tracing, then log the startup banner and any ignored
//!    environment values (done by `main`)
//! 3. Check that the authentication log exists and is readable
//! 4. Write the PID file (if configured) and install the metrics recorder
//! 5. Build the geolocation gateway and the InfluxDB sink
//! 6. Run the watchdog until SIGTERM/SIGINT cancels the shutdown token
//!
//! The PID file guard is held for the whole run and removed on every exit path.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use intrusion_monitor_core::config::{EnvWarning, MonitorConfig};
use intrusion_monitor_core::error::{ConfigError, MonitorError};
use intrusion_monitor_core::pipeline::{EnrichmentGateway, RecordSink};
use intrusion_monitor_watchdog::{
    InfluxSink, IpApiGateway, LineOutcome, LineParser, NoopGateway, NullSink, Watchdog,
    WatchdogSettings, WatchdogStats,
};

use crate::cli::DaemonCli;
use crate::error::DaemonError;
use crate::metrics_server;
use crate::pid_file::PidFile;

/// One-line description logged at startup.
pub const DESCRIPTION: &str =
    "An SSH log watchdog, which exports failed login attempts to an InfluxDB time-series database";

/// Where the loaded configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Read from this file.
    File(PathBuf),
    /// Default file was absent; built-in defaults plus environment.
    Defaults,
}

/// The daemon orchestrator.
///
/// Holds the validated configuration and drives the watchdog lifecycle.
pub struct Orchestrator {
    config: MonitorConfig,
    source: ConfigSource,
    /// Environment values skipped while loading, held until tracing is up.
    env_warnings: Vec<EnvWarning>,
}

impl Orchestrator {
    /// Load configuration as directed by the command line.
    ///
    /// Precedence: CLI flag > environment variable > file > default.
    pub async fn from_cli(cli: &DaemonCli) -> Result<Self, DaemonError> {
        let (mut config, source) = match MonitorConfig::from_file(&cli.config).await {
            Ok(config) => (config, ConfigSource::File(cli.config.clone())),
            Err(MonitorError::Config(ConfigError::FileNotFound { .. }))
                if cli.uses_default_config() =>
            {
                (MonitorConfig::default(), ConfigSource::Defaults)
            }
            Err(e) => return Err(e.into()),
        };

        let env_warnings = config.apply_env_overrides();
        apply_cli_overrides(&mut config, cli);

        let mut orchestrator = Self::from_config(config)?;
        orchestrator.source = source;
        orchestrator.env_warnings = env_warnings;
        Ok(orchestrator)
    }

    /// Build from an already-loaded configuration.
    pub fn from_config(config: MonitorConfig) -> Result<Self, DaemonError> {
        config.validate()?;
        Ok(Self {
            config,
            source: ConfigSource::Defaults,
            env_warnings: Vec::new(),
        })
    }

    /// The loaded configuration.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Where the configuration came from.
    pub fn source(&self) -> &ConfigSource {
        &self.source
    }

    /// Environment values that were set but ignored.
    pub fn env_warnings(&self) -> &[EnvWarning] {
        &self.env_warnings
    }

    /// Log name, version, description, ignored environment values and the
    /// effective settings.
    pub fn log_startup_banner(&self) {
        tracing::info!(
            name = env!("CARGO_PKG_NAME"),
            version = env!("CARGO_PKG_VERSION"),
            "{DESCRIPTION}"
        );
        match &self.source {
            ConfigSource::File(path) => {
                tracing::info!(path = %path.display(), "configuration loaded")
            }
            ConfigSource::Defaults => {
                tracing::info!("no configuration file, using defaults and environment")
            }
        }
        for warning in &self.env_warnings {
            warning.log();
        }
        tracing::debug!(
            log_path = %self.config.watchdog.log_path,
            timezone = %self.config.watchdog.timezone,
            sink = %self.config.sink.url,
            database = %self.config.sink.database,
            enrichment = self.config.enrichment.enabled,
            metrics = self.config.metrics.enabled,
            "effective configuration"
        );
    }

    /// Run one line through parser, classifier and record builder.
    ///
    /// No geolocation lookup and no database write are performed.
    pub async fn dry_run(&self, line: &str) -> Result<serde_json::Value, DaemonError> {
        let parser = LineParser::from_config(&self.config.watchdog)?;
        let mut watchdog = Watchdog::new(
            WatchdogSettings::from_core(&self.config),
            parser,
            NoopGateway,
            NullSink,
        );

        let value = match watchdog.process_line(line).await? {
            LineOutcome::Written(record) => serde_json::json!({
                "outcome": "attempt",
                "record": record,
                "line_protocol": intrusion_monitor_watchdog::sink::encode_line(&record),
            }),
            LineOutcome::NotAttempt => serde_json::json!({ "outcome": "not_attempt" }),
            LineOutcome::ParseFailed(e) => serde_json::json!({
                "outcome": "parse_failed",
                "error": e.to_string(),
            }),
        };
        Ok(value)
    }

    /// Run the watchdog until `shutdown` is cancelled or a fatal error occurs.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<WatchdogStats, DaemonError> {
        let log_path = Path::new(&self.config.watchdog.log_path);
        check_log_file(log_path)?;

        // dropped on return, which removes the file
        let _pid_file = if self.config.general.pid_file.is_empty() {
            None
        } else {
            Some(PidFile::acquire(&self.config.general.pid_file)?)
        };

        self.run_watchdog(shutdown).await
    }

    async fn run_watchdog(&self, shutdown: CancellationToken) -> Result<WatchdogStats, DaemonError> {
        if self.config.metrics.enabled {
            metrics_server::install_metrics_recorder(&self.config.metrics)?;
        }

        let parser = LineParser::from_config(&self.config.watchdog)?;
        let settings = WatchdogSettings::from_core(&self.config);
        let sink = InfluxSink::new(&self.config.sink)
            .map_err(|e| anyhow::anyhow!("failed to build InfluxDB client: {}", e))?;

        if self.config.enrichment.enabled {
            let gateway = IpApiGateway::new(&self.config.enrichment)
                .map_err(|e| anyhow::anyhow!("failed to build geolocation client: {}", e))?;
            drive(Watchdog::new(settings, parser, gateway, sink), shutdown).await
        } else {
            tracing::info!("geolocation enrichment disabled");
            drive(Watchdog::new(settings, parser, NoopGateway, sink), shutdown).await
        }
    }
}

async fn drive<G, S>(
    mut watchdog: Watchdog<G, S>,
    shutdown: CancellationToken,
) -> Result<WatchdogStats, DaemonError>
where
    G: EnrichmentGateway,
    S: RecordSink,
{
    Ok(watchdog.run(shutdown).await?)
}

/// Apply command-line overrides on top of file and environment values.
pub fn apply_cli_overrides(config: &mut MonitorConfig, cli: &DaemonCli) {
    if let Some(level) = &cli.log_level {
        config.general.log_level = level.to_lowercase();
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format = format.clone();
    }
    if let Some(path) = &cli.log_path {
        config.watchdog.log_path = path.clone();
    }
    if let Some(pid_file) = &cli.pid_file {
        config.general.pid_file = pid_file.clone();
    }
}

/// Check that the authentication log exists and can be opened for reading.
pub fn check_log_file(path: &Path) -> Result<(), DaemonError> {
    let display = path.display().to_string();

    match fs::File::open(path) {
        Ok(file) => {
            let is_file = file.metadata().map(|m| m.is_file()).unwrap_or(false);
            if !is_file {
                tracing::error!(path = %path.display(), "log path is not a regular file");
                return Err(DaemonError::LogFileUnreadable { path: display });
            }
            tracing::info!(path = %path.display(), "log file found");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::error!(path = %path.display(), "log file not found");
            Err(DaemonError::LogFileMissing { path: display })
        }
        Err(e) => {
            tracing::error!(
                path = %path.display(),
                error = %e,
                "log file cannot be opened; running 'chmod o+r' on it might solve this"
            );
            Err(DaemonError::LogFileUnreadable { path: display })
        }
    }
}

/// Install SIGTERM/SIGINT handlers and cancel `shutdown` when either fires.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
pub fn spawn_signal_handler(shutdown: CancellationToken) -> Result<JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::spawn(async move {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
            _ = shutdown.cancelled() => return,
        };
        tracing::info!(signal = name, "shutdown signal received");
        shutdown.cancel();
    }))
}
