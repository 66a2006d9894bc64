//! ---
//! sds_section: "11-simulation"
//! sds_subsection: "01-bootstrap"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Offline generator for synthetic reading fixtures."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use sds_common::config::{AppConfig, SimulationConfig};
use sds_common::time::{iso_timestamp, offset_by_secs};
use sds_msg::SensorReadingMessage;
use sds_sim::{LimitCatalog, Reading, SeededRandom, SensorGenerator};

const DEFAULT_SEED: u64 = 0x5EED_F00D;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Generate synthetic sensor reading fixtures from a limits file",
    long_about = None
)]
struct Cli {
    /// CSV with machineName:sensorName, operationalHigh and operationalLow columns
    #[arg(long, value_name = "FILE")]
    limits: PathBuf,

    /// Output file path. Use '-' for stdout.
    #[arg(long, default_value = "readings.csv")]
    output: PathBuf,

    /// Explicit output format when extension is ambiguous
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Number of ticks to simulate
    #[arg(long, default_value_t = 60)]
    samples: u64,

    /// Simulated seconds between ticks
    #[arg(long, default_value_t = 1.0)]
    interval_secs: f64,

    /// Random seed for the generator
    #[arg(long)]
    seed: Option<u64>,

    /// RFC 3339 timestamp of the first tick; defaults to now
    #[arg(long)]
    start: Option<DateTime<Utc>>,

    /// Override the per-tick fault trigger probability
    #[arg(long)]
    fault_probability: Option<f64>,

    /// Configuration file supplying the [simulation] tuning section
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let format = determine_format(&cli.output, cli.format);
    let simulation = simulation_config(&cli)?;
    let catalog = LimitCatalog::from_path(&cli.limits)
        .with_context(|| format!("failed to load limits {}", cli.limits.display()))?;
    let readings = generate(&cli, catalog.clone(), &simulation)?;

    let writer: Box<dyn Write> = if cli.output.as_os_str() == "-" {
        Box::new(io::stdout().lock())
    } else {
        Box::new(
            File::create(&cli.output)
                .with_context(|| format!("failed to create output file {}", cli.output.display()))?,
        )
    };
    match format {
        OutputFormat::Csv => write_csv(writer, &catalog, &readings)?,
        OutputFormat::Json => write_json(writer, readings.iter().cloned())?,
    }

    if cli.output.as_os_str() != "-" {
        eprintln!(
            "generated {} samples for {} sensors -> {}",
            cli.samples,
            catalog.len(),
            cli.output.display()
        );
    }
    Ok(())
}

fn determine_format(path: &Path, override_format: Option<OutputFormat>) -> OutputFormat {
    if let Some(format) = override_format {
        return format;
    }
    if path.as_os_str() == "-" {
        return OutputFormat::Json;
    }
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") | Some("jsonl") => OutputFormat::Json,
        _ => OutputFormat::Csv,
    }
}

fn simulation_config(cli: &Cli) -> Result<SimulationConfig> {
    let mut simulation = match &cli.config {
        Some(path) => AppConfig::load_with_source(Some(path.as_path()))?.config.simulation,
        None => SimulationConfig::default(),
    };
    if let Some(probability) = cli.fault_probability {
        simulation.fault_probability = probability;
    }
    simulation.validate()?;
    Ok(simulation)
}

/// Run the generator on a simulated clock, one tick per `interval_secs`.
fn generate(
    cli: &Cli,
    catalog: LimitCatalog,
    simulation: &SimulationConfig,
) -> Result<Vec<Reading>> {
    if cli.samples == 0 {
        return Err(anyhow!("samples must be greater than zero"));
    }
    if !cli.interval_secs.is_finite() || cli.interval_secs <= 0.0 {
        return Err(anyhow!("interval-secs must be greater than zero"));
    }
    let start = cli.start.unwrap_or_else(Utc::now);
    let rng = SeededRandom::from_seed(cli.seed.unwrap_or(DEFAULT_SEED));
    let mut generator = SensorGenerator::new(catalog, simulation, rng);
    let readings = (0..cli.samples)
        .map(|tick| {
            let now = offset_by_secs(start, tick as f64 * cli.interval_secs);
            generator.tick(now).reading
        })
        .collect();
    Ok(readings)
}

/// One row per tick: `timestamp` followed by every sensor in catalog order.
fn write_csv(writer: impl Write, catalog: &LimitCatalog, readings: &[Reading]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    let mut header = vec!["timestamp"];
    header.extend(catalog.sensors().map(|spec| spec.identity.as_str()));
    writer.write_record(&header)?;
    for reading in readings {
        let mut row = vec![iso_timestamp(reading.captured_at)];
        row.extend(
            catalog
                .sensors()
                .map(|spec| reading.get(&spec.identity).unwrap_or_default().to_owned()),
        );
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Pretty JSON array of message bodies, the same shape the publisher emits.
fn write_json(mut writer: impl Write, readings: impl Iterator<Item = Reading>) -> Result<()> {
    let messages: Vec<SensorReadingMessage> = readings.map(Reading::into_message).collect();
    serde_json::to_writer_pretty(&mut writer, &messages)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
