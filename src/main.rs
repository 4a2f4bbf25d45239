// Iris Monitor - Classification serving with telemetry and drift monitoring
// Main entry point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::prelude::*;

use iris_monitor::client::MonitorClient;
use iris_monitor::config::{load_config, Config, LoggingConfig};
use iris_monitor::drift::{DriftAggregator, DRIFT_REPORT_FILE, SUMMARY_REPORT_FILE};
use iris_monitor::metrics::MonitorMetrics;
use iris_monitor::predictions::CsvPredictionLog;
use iris_monitor::server::MonitorServer;

#[derive(Parser, Debug)]
#[command(name = "iris-monitor")]
#[command(about = "Iris classification API with Prometheus telemetry and drift monitoring", version)]
struct Args {
    /// Path to config file (default: ./iris-monitor.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Run mode (default: serve)
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Bind address, overrides the config file
        #[arg(long)]
        bind: Option<String>,
    },
    /// Compute drift once against the prediction log and print it as JSON
    Drift,
    /// Render an HTML report to a file
    Report {
        #[arg(value_enum)]
        kind: ReportKind,
        /// Output path (default: the configured reports directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Ask a running server to refresh its drift metrics
    Trigger {
        /// Server base URL
        #[arg(long, default_value = "http://127.0.0.1:8000")]
        url: String,
        /// Repeat every N seconds until interrupted (default: once)
        #[arg(long = "interval-secs")]
        interval_secs: Option<u64>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ReportKind {
    Drift,
    Summary,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;
    init_tracing(&config.logging)?;

    match args.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind_address = bind;
            }
            run_server(config).await
        }
        Command::Drift => run_drift(&config),
        Command::Report { kind, out } => run_report(&config, kind, out),
        Command::Trigger { url, interval_secs } => run_trigger(url, interval_secs).await,
    }
}

/// Initialize tracing: env filter plus stderr, or an append-mode log file
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    // RUST_LOG wins over the configured level
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let (file_layer, stderr_layer) = match &logging.file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let log_file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            let file_writer = Arc::new(log_file);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(move || file_writer.clone())
                .with_ansi(false); // No ANSI colors in log file
            (Some(layer), None)
        }
        None => (
            None,
            Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
        ),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    // Bridge log crate → tracing (for dependencies using log crate)
    tracing_log::LogTracer::init().ok();
    Ok(())
}

/// Run HTTP server until Ctrl+C
async fn run_server(config: Config) -> Result<()> {
    let server = MonitorServer::from_config(&config)?;
    let shutdown = CancellationToken::new();

    let token = shutdown.clone();
    let mut server_handle = tokio::spawn(async move { server.serve(token).await });

    let result = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received SIGINT, shutting down gracefully");
            shutdown.cancel();
            server_handle.await
        }
        result = &mut server_handle => result,
    };

    match result {
        Ok(Ok(())) => {
            tracing::info!("Server exited normally");
            Ok(())
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Server exited with error");
            Err(e)
        }
        Err(e) => Err(anyhow::anyhow!("Server task panicked: {}", e)),
    }
}

/// Aggregator over the on-disk log, with a private registry
fn offline_aggregator(config: &Config) -> Result<DriftAggregator> {
    let log = Arc::new(
        CsvPredictionLog::open(
            &config.predictions.log_path,
            config.predictions.rotate_after_bytes,
        )
        .context("Failed to open prediction log")?,
    );
    let metrics = Arc::new(MonitorMetrics::new().context("Failed to register metrics")?);

    Ok(DriftAggregator::new(
        config.drift.reference_path.clone(),
        config.drift.reports_dir.clone(),
        log,
        metrics,
        config.drift.settings(),
    ))
}

fn run_drift(config: &Config) -> Result<()> {
    let aggregator = offline_aggregator(config)?;
    let summary = aggregator
        .compute_drift()
        .context("Drift computation failed")?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run_report(config: &Config, kind: ReportKind, out: Option<PathBuf>) -> Result<()> {
    let aggregator = offline_aggregator(config)?;
    let (html, default_name) = match kind {
        ReportKind::Drift => (aggregator.drift_report_html()?, DRIFT_REPORT_FILE),
        ReportKind::Summary => (aggregator.summary_report_html()?, SUMMARY_REPORT_FILE),
    };

    let path = out.unwrap_or_else(|| config.drift.reports_dir.join(default_name));
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&path, html)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;

    println!("Report written to {}", path.display());
    Ok(())
}

/// External periodic caller of POST /evidently/update-metrics
async fn run_trigger(url: String, interval_secs: Option<u64>) -> Result<()> {
    let client = MonitorClient::new(url, Duration::from_secs(30))?;

    let Some(secs) = interval_secs.filter(|s| *s > 0) else {
        let reply = client.update_drift_metrics().await?;
        println!("{}: {}", reply.status, reply.message);
        println!(
            "  drift detected: {}, share: {:.2}, rows: {}",
            reply.summary.dataset_drift_detected, reply.summary.drift_share, reply.summary.num_rows
        );
        return Ok(());
    };

    tracing::info!(url = %client.base_url(), interval_secs = secs, "Triggering drift refresh");
    let mut ticker = tokio::time::interval(Duration::from_secs(secs));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT, stopping trigger");
                return Ok(());
            }
            _ = ticker.tick() => {
                match client.update_drift_metrics().await {
                    Ok(reply) => tracing::info!(
                        detected = reply.summary.dataset_drift_detected,
                        drift_share = reply.summary.drift_share,
                        rows = reply.summary.num_rows,
                        "Drift metrics refreshed"
                    ),
                    Err(e) => tracing::warn!(error = %e, "Drift refresh failed"),
                }
            }
        }
    }
}
