//! ---
//! sds_section: "01-core-functionality"
//! sds_subsection: "binary"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Binary entrypoint for the synthetic sensor reading publisher."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
use std::future::Future;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use sds_common::config::{AppConfig, TransportKind};
use sds_common::logging::{init_tracing, LogFormat};
use sds_msg::connect;
use sds_rt::period_from_secs;
use sds_sim::{run, LimitCatalog, ReadingEmitter, RunSettings, RunSummary, SeededRandom, SensorGenerator};
use tokio::signal;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Publish synthetic sensor readings at a fixed cadence",
    long_about = None
)]
struct Cli {
    /// CSV with machineName:sensorName, operationalHigh and operationalLow columns
    #[arg(value_name = "LIMITS")]
    limits: Option<PathBuf>,

    /// Destination queue name
    #[arg(value_name = "QUEUE")]
    queue: Option<String>,

    /// Seconds between readings
    #[arg(value_name = "INTERVAL")]
    interval: Option<f64>,

    #[arg(long, value_name = "FILE", env = "SDS_CONFIG", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, help = "Override the transport backend")]
    transport: Option<CliTransport>,

    #[arg(long, value_name = "HOST:PORT", help = "Broker bridge address for the tcp transport")]
    address: Option<String>,

    #[arg(
        long,
        value_name = "FILE",
        help = "Append readings to FILE (selects the file transport unless --transport is given)"
    )]
    output: Option<PathBuf>,

    #[arg(long, help = "Seed the random source for a reproducible stream")]
    seed: Option<u64>,

    #[arg(long, value_name = "N", help = "Stop after N readings")]
    ticks: Option<u64>,

    #[arg(long, help = "Override the per-tick fault trigger probability")]
    fault_probability: Option<f64>,

    #[arg(long, value_enum, help = "Console log format")]
    log_format: Option<CliLogFormat>,

    #[arg(long, value_name = "DIR", help = "Also write JSON logs to a daily file in DIR")]
    log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliTransport {
    Stdout,
    File,
    Tcp,
    Memory,
}

impl From<CliTransport> for TransportKind {
    fn from(value: CliTransport) -> Self {
        match value {
            CliTransport::Stdout => TransportKind::Stdout,
            CliTransport::File => TransportKind::File,
            CliTransport::Tcp => TransportKind::Tcp,
            CliTransport::Memory => TransportKind::Memory,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliLogFormat {
    Json,
    Pretty,
}

impl From<CliLogFormat> for LogFormat {
    fn from(value: CliLogFormat) -> Self {
        match value {
            CliLogFormat::Json => LogFormat::StructuredJson,
            CliLogFormat::Pretty => LogFormat::Pretty,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = AppConfig::load_with_source(cli.config.as_deref())?;
    let mut config = loaded.config;
    apply_overrides(&mut config, &cli)?;
    config.validate()?;
    init_tracing("sds-publisher", &config.logging)?;
    match &loaded.source {
        Some(path) => info!(path = %path.display(), "configuration loaded"),
        None => info!("no configuration file found; using defaults"),
    }

    match run_publisher(config, shutdown_signal()).await {
        Ok(summary) => {
            info!(
                messages_published = summary.messages_published,
                faults_started = summary.faults_started,
                faults_cleared = summary.faults_cleared,
                "publisher stopped"
            );
            Ok(())
        }
        Err(err) => {
            error!(error = %format!("{err:#}"), "publisher failed");
            Err(err)
        }
    }
}

/// Fold command-line values over the loaded configuration.
fn apply_overrides(config: &mut AppConfig, cli: &Cli) -> Result<()> {
    let publisher = &mut config.publisher;
    if let Some(limits) = &cli.limits {
        publisher.limits_path = Some(limits.clone());
    }
    if let Some(queue) = &cli.queue {
        publisher.queue = queue.clone();
    }
    if let Some(secs) = cli.interval {
        publisher.interval = period_from_secs(secs).context("invalid interval")?;
    }
    if cli.seed.is_some() {
        publisher.seed = cli.seed;
    }
    if cli.ticks.is_some() {
        publisher.max_ticks = cli.ticks;
    }

    let transport = &mut config.transport;
    if let Some(path) = &cli.output {
        transport.path = Some(path.clone());
        transport.kind = TransportKind::File;
    }
    if let Some(kind) = cli.transport {
        transport.kind = kind.into();
    }
    if let Some(address) = &cli.address {
        transport.address = Some(address.clone());
    }

    if let Some(probability) = cli.fault_probability {
        config.simulation.fault_probability = probability;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format.into();
    }
    if let Some(dir) = &cli.log_dir {
        config.logging.directory = Some(dir.clone());
    }
    Ok(())
}

/// Load the catalog, open the transport, and run until `shutdown` or the tick budget.
///
/// Both startup steps are fatal on failure; no tick runs without a transport.
async fn run_publisher<F>(config: AppConfig, shutdown: F) -> Result<RunSummary>
where
    F: Future<Output = ()>,
{
    let limits = config.publisher.require_limits_path()?;
    let catalog = LimitCatalog::from_path(limits)
        .with_context(|| format!("failed to load limits {}", limits.display()))?;
    let rng = match config.publisher.seed {
        Some(seed) => {
            info!(seed, "using seeded random source");
            SeededRandom::from_seed(seed)
        }
        None => SeededRandom::from_entropy(),
    };
    let mut generator = SensorGenerator::new(catalog, &config.simulation, rng);

    let transport = connect(&config.transport)
        .await
        .with_context(|| format!("unable to open {} transport", config.transport.kind.as_str()))?;
    let mut emitter = ReadingEmitter::new(transport, config.publisher.queue.clone());
    let settings = RunSettings::from_config(&config.publisher);

    let summary = run(&mut generator, &mut emitter, &settings, shutdown).await?;
    Ok(summary)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "unable to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "unable to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("ctrl-c received; shutting down"),
        _ = terminate => info!("terminate signal received; shutting down"),
    }
}
