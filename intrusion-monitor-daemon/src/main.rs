use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use intrusion_monitor_daemon::cli::DaemonCli;
use intrusion_monitor_daemon::error::{DaemonError, exit_code};
use intrusion_monitor_daemon::logging::init_tracing;
use intrusion_monitor_daemon::orchestrator::{self, Orchestrator};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = DaemonCli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::from(exit_code::OK as u8),
        Err(e) => {
            tracing::error!(error = %e, exit_code = e.exit_code(), "intrusion-monitor exiting");
            eprintln!("intrusion-monitor: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: DaemonCli) -> Result<(), DaemonError> {
    let orchestrator = Orchestrator::from_cli(&cli).await?;

    if cli.validate {
        for warning in orchestrator.env_warnings() {
            eprintln!("warning: {warning}");
        }
        println!("configuration OK");
        return Ok(());
    }

    if let Some(line) = &cli.parse {
        let value = orchestrator.dry_run(line).await?;
        let out = serde_json::to_string_pretty(&value).map_err(anyhow::Error::from)?;
        println!("{out}");
        return Ok(());
    }

    init_tracing(&orchestrator.config().general)?;
    orchestrator.log_startup_banner();

    let shutdown = CancellationToken::new();
    let signals = orchestrator::spawn_signal_handler(shutdown.clone())?;

    let result = orchestrator.run(shutdown.clone()).await;

    shutdown.cancel();
    let _ = signals.await;

    let stats = result?;
    tracing::info!(
        lines = stats.lines_seen,
        records = stats.records_written,
        "intrusion-monitor shut down"
    );
    Ok(())
}
