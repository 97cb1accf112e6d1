use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use traffic_monitor::config::{self, Config, ReportFormat};
use traffic_monitor::monitor::{Monitor, ReportOutputs, run_ingest, spawn_periodic_tasks};
use traffic_monitor::report::ConsoleSink;
use traffic_monitor::tail::spawn_tail;

/// Lines buffered between the file follower and the ingestion loop
const LINE_BUFFER: usize = 1024;

const DEFAULT_CONFIG_PATH: &str = "config/monitor.toml";

#[derive(Parser, Debug)]
#[command(
    name = "traffic-monitor",
    version,
    about = "Monitors an actively written HTTP access log"
)]
struct Cli {
    /// Access log to follow
    #[arg(short = 'f', long = "fname")]
    fname: Option<PathBuf>,

    /// Average hits per sample above which an alert is raised
    #[arg(short = 't', long = "threshold", visible_alias = "avg-threshold")]
    threshold: Option<u64>,

    /// Configuration file
    #[arg(short, long, env = "MONITOR_CONFIG")]
    config: Option<PathBuf>,

    /// Print reports as JSON lines
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = load_config(&cli)?;

    // Initialize logging
    init_logging(&config.logging);

    info!("Starting traffic monitor v{}", env!("CARGO_PKG_VERSION"));

    // The log source must be readable at startup; there is no retry
    let lines = spawn_tail(&config.monitor.log_path, config.tail.clone(), LINE_BUFFER).await?;

    let monitor = Arc::new(Monitor::new(&config.monitor)?);
    let window_span = config.monitor.window_span()?;

    info!(
        threshold = config.monitor.alert_threshold,
        window_secs = window_span.as_secs(),
        placement = ?config.monitor.top_placement,
        "Monitoring {}",
        config.monitor.log_path.display()
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let tasks = spawn_periodic_tasks(
        monitor.clone(),
        &config.monitor,
        ReportOutputs {
            sink: Arc::new(ConsoleSink::new(config.report.format)),
            metrics_textfile: config.metrics.textfile.clone(),
        },
        shutdown_rx,
    );

    tokio::select! {
        _ = run_ingest(monitor, lines) => {},
        _ = shutdown_signal() => {},
    }

    // Signal periodic tasks to stop
    let _ = shutdown_tx.send(true);
    for task in tasks {
        let _ = task.await;
    }

    info!("Monitor stopped");
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Config::load(DEFAULT_CONFIG_PATH)?,
        None => Config::default(),
    };

    // Command line flags win over the file
    if let Some(fname) = &cli.fname {
        config.monitor.log_path = fname.clone();
    }
    if let Some(threshold) = cli.threshold {
        config.monitor.alert_threshold = threshold;
    }
    if cli.json {
        config.report.format = ReportFormat::Json;
    }

    config.validate()?;
    Ok(config)
}

fn init_logging(config: &config::LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    // Diagnostics go to stderr, reports own stdout
    if config.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping monitor");
}
