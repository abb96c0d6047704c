//! tmdump: export tables and zone timing reports from Telemetry captures
//!
//! Dumps any table of a Telemetry SQLite capture as CSV, and produces
//! inclusive/exclusive time totals per zone.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use tracing_subscriber::EnvFilter;

use tmdump::output::{sink_for, OutputFormat};
use tmdump::report::{command_from_flags, run_report, ReportConfig};
use tmdump::zones::{Grouping, ZoneFilter};
use tmdump::TelemetryDb;

#[derive(Debug, Parser)]
#[command(name = "tmdump")]
#[command(about = "Export tables and zone timing reports from Telemetry SQLite captures")]
#[command(version)]
#[command(group(
    ArgGroup::new("mode")
        .args(["list_tables", "zones", "zone_totals", "zone_totals_excl"])
        .multiple(false)
))]
struct Cli {
    /// SQLite capture to read
    infilename: PathBuf,

    /// Name of a table to dump
    table: Option<String>,

    /// List all available tables in the capture
    #[arg(short, long)]
    list_tables: bool,

    /// Dump zones with names resolved and times in wall-clock units
    #[arg(short, long)]
    zones: bool,

    /// Dump inclusive time totals per zone
    #[arg(short = 't', long)]
    zone_totals: bool,

    /// Dump exclusive and inclusive time totals per zone
    #[arg(short = 'e', long)]
    zone_totals_excl: bool,

    /// Keep zones with the same name at different depths apart
    #[arg(long)]
    by_depth: bool,

    /// Report each zone name separately per thread
    #[arg(long)]
    by_thread: bool,

    /// Only report zones with this name
    #[arg(long)]
    zone: Option<String>,

    /// Only read zones recorded on this thread
    #[arg(long)]
    thread: Option<i64>,

    /// Check zone nesting before any zone report and refuse malformed captures
    #[arg(long)]
    validate: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// Write output to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Include verbose diagnostics
    #[arg(short, long)]
    verbose: bool,
}

/// Initialize tracing subscriber for diagnostics on stderr
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

impl Cli {
    fn into_config(self) -> Result<(ReportConfig, PathBuf)> {
        let command = command_from_flags(
            self.list_tables,
            self.zones,
            self.zone_totals,
            self.zone_totals_excl,
            self.table,
        )?;
        let config = ReportConfig {
            command,
            grouping: Grouping {
                by_depth: self.by_depth,
                by_thread: self.by_thread,
            },
            zone_name: self.zone,
            filter: ZoneFilter {
                thread_id: self.thread,
            },
            validate: self.validate,
            format: self.format,
            output: self.output,
        };
        Ok((config, self.infilename))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    tracing::debug!("parsed args = {cli:?}");

    let (config, infilename) = cli.into_config()?;
    let db = TelemetryDb::open(&infilename)?;

    let writer: Box<dyn Write> = match &config.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    let mut sink = sink_for(config.format, writer);

    run_report(&db, &config, sink.as_mut())?;
    Ok(())
}
