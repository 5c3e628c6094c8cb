//! Prometheus scrape endpoint for the watchdog counters.
//!
//! `metrics-exporter-prometheus` runs its own listener; the daemon only
//! installs the recorder and registers descriptions. Every series carries
//! a `service="intrusion-monitor"` label.

use std::net::SocketAddr;

use anyhow::Result;
use intrusion_monitor_core::config::MetricsConfig;
use intrusion_monitor_core::metrics as m;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

/// Parse the listen address from the metrics configuration.
pub fn listen_addr(config: &MetricsConfig) -> Result<SocketAddr> {
    format!("{}:{}", config.listen_addr, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics listen address: {}", e))
}

/// Label attached to every exported series.
const SERVICE_LABEL: &str = "intrusion-monitor";

/// Install the global recorder and start the scrape listener.
///
/// Fails when `endpoint` is anything but `/metrics` (the exporter's
/// listener answers on every path), when the socket cannot be bound,
/// or when a recorder is already installed.
pub fn install_metrics_recorder(config: &MetricsConfig) -> Result<()> {
    if config.endpoint != "/metrics" {
        return Err(anyhow::anyhow!(
            "metrics endpoint '{}' is not supported, use '/metrics'",
            config.endpoint
        ));
    }

    let addr = listen_addr(config)?;

    if addr.ip().is_unspecified() {
        tracing::warn!(
            listen_addr = %addr,
            "metrics listener bound to all interfaces"
        );
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .add_global_label("service", SERVICE_LABEL)
        .set_buckets_for_metric(
            Matcher::Full(m::SINK_WRITE_DURATION_SECONDS.to_owned()),
            &m::SINK_WRITE_DURATION_BUCKETS,
        )
        .map_err(|e| anyhow::anyhow!("invalid histogram buckets: {}", e))?
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {}", e))?;

    m::describe_all();
    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);

    tracing::info!(listen_addr = %addr, endpoint = %config.endpoint, "metrics exporter listening");

    Ok(())
}
