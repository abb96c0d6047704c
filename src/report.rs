//! Report drivers: read from the capture, aggregate, and hand rows to a sink.

use std::path::PathBuf;

use anyhow::{bail, Result};
use tracing::{debug, error, info, warn};

use crate::calibrate::Calibration;
use crate::db::TelemetryDb;
use crate::error::ZoneError;
use crate::output::{Field, OutputFormat, ReportSink};
use crate::zones::{
    aggregate, inclusive_totals, validate_zones, Grouping, TextDictionary, ZoneEvent, ZoneFilter,
};

/// Which report to produce.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ReportCommand {
    /// Names and row counts of every table.
    ListTables,
    /// Every row of one table, verbatim.
    DumpTable(String),
    /// Every zone with its name resolved and times converted to wall clock.
    Zones,
    /// Inclusive time per zone.
    ZoneTotals,
    /// Inclusive and exclusive time per zone.
    #[default]
    ZoneTotalsExclusive,
}

/// Configuration for one report run.
#[derive(Debug, Clone, Default)]
pub struct ReportConfig {
    pub command: ReportCommand,
    pub grouping: Grouping,
    /// Keep only report rows for this zone name.
    pub zone_name: Option<String>,
    pub filter: ZoneFilter,
    /// Reject captures that fail nesting validation before aggregating.
    pub validate: bool,
    pub format: OutputFormat,
    /// Destination file; stdout when unset.
    pub output: Option<PathBuf>,
}

/// Run the configured report, returning the number of data rows written.
pub fn run_report(
    db: &TelemetryDb,
    config: &ReportConfig,
    sink: &mut dyn ReportSink,
) -> Result<usize> {
    let rows = match &config.command {
        ReportCommand::ListTables => write_table_list(db, sink)?,
        ReportCommand::DumpTable(table) => write_table_dump(db, table, sink)?,
        ReportCommand::Zones => write_zones(db, config, sink)?,
        ReportCommand::ZoneTotals => write_zone_totals(db, config, sink)?,
        ReportCommand::ZoneTotalsExclusive => write_zone_totals_exclusive(db, config, sink)?,
    };
    sink.finish()?;
    info!("wrote {rows} rows");
    Ok(rows)
}

fn write_table_list(db: &TelemetryDb, sink: &mut dyn ReportSink) -> Result<usize> {
    let tables = db.list_tables()?;
    sink.write_header(&["name", "rows"])?;
    for table in &tables {
        sink.write_row(&[Field::from(table.name.as_str()), Field::from(table.row_count)])?;
    }
    Ok(tables.len())
}

fn write_table_dump(db: &TelemetryDb, table: &str, sink: &mut dyn ReportSink) -> Result<usize> {
    let dump = db.dump_table(table)?;
    let header: Vec<&str> = dump.columns.iter().map(String::as_str).collect();
    sink.write_header(&header)?;
    for row in &dump.rows {
        sink.write_row(row)?;
    }
    Ok(dump.rows.len())
}

fn name_matches(config: &ReportConfig, name: Option<&str>) -> bool {
    match &config.zone_name {
        Some(wanted) => name == Some(wanted.as_str()),
        None => true,
    }
}

fn write_zones(
    db: &TelemetryDb,
    config: &ReportConfig,
    sink: &mut dyn ReportSink,
) -> Result<usize> {
    if config.validate {
        load_zones(db, config)?;
    }
    let calibration = db.calibration()?;
    let dump = db.read_zone_dump(&config.filter)?;

    sink.write_header(&["name", "thread id", "start time", "duration (ms)", "depth"])?;
    let mut written = 0;
    for zone in dump.iter().filter(|z| name_matches(config, z.name.as_deref())) {
        sink.write_row(&[
            Field::from(zone.name.clone()),
            Field::from(zone.thread_id),
            Field::from(calibration.seconds(zone.start)),
            Field::from(calibration.millis(zone.duration())),
            Field::from(zone.depth),
        ])?;
        written += 1;
    }
    Ok(written)
}

/// Load events and dictionary, running validation first when asked to.
fn load_zones(
    db: &TelemetryDb,
    config: &ReportConfig,
) -> Result<(Vec<ZoneEvent>, TextDictionary)> {
    let dictionary = db.read_dictionary()?;
    let events = db.read_zone_events(&config.filter)?;

    if config.validate {
        let result = validate_zones(&events, &dictionary);
        for warning in &result.warnings {
            warn!("{warning}");
        }
        if !result.is_valid() {
            for err in &result.errors {
                error!("{err}");
            }
            return Err(ZoneError::InvalidNesting {
                errors: result.errors,
            }
            .into());
        }
        debug!("{} zones passed nesting validation", events.len());
    }

    Ok((events, dictionary))
}

fn grouping_columns(grouping: Grouping) -> Vec<&'static str> {
    let mut columns = Vec::new();
    if grouping.by_depth {
        columns.push("depth");
    }
    if grouping.by_thread {
        columns.push("thread");
    }
    columns
}

fn write_zone_totals(
    db: &TelemetryDb,
    config: &ReportConfig,
    sink: &mut dyn ReportSink,
) -> Result<usize> {
    let (events, dictionary) = load_zones(db, config)?;
    let rows = inclusive_totals(&events, &dictionary, config.grouping)?;

    let mut header = vec!["time", "name", "instances"];
    header.extend(grouping_columns(config.grouping));
    sink.write_header(&header)?;

    let mut written = 0;
    for row in rows.iter().filter(|r| name_matches(config, Some(r.name))) {
        let mut fields = vec![
            Field::from(row.total_cycles),
            Field::from(row.name),
            Field::from(row.instance_count),
        ];
        if config.grouping.by_depth {
            fields.push(Field::from(row.depth));
        }
        if config.grouping.by_thread {
            fields.push(Field::from(row.thread));
        }
        sink.write_row(&fields)?;
        written += 1;
    }
    Ok(written)
}

/// Calibration is optional for the exclusive report; without it the
/// wall-clock columns are left empty.
fn optional_calibration(db: &TelemetryDb) -> Result<Option<Calibration>> {
    if !db.has_calibration()? {
        debug!("no calibration tables; skipping wall-clock columns");
        return Ok(None);
    }
    match db.calibration() {
        Ok(calibration) => Ok(Some(calibration)),
        Err(err) if err.downcast_ref::<ZoneError>().is_some() => {
            warn!("cannot calibrate clock: {err}");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn write_zone_totals_exclusive(
    db: &TelemetryDb,
    config: &ReportConfig,
    sink: &mut dyn ReportSink,
) -> Result<usize> {
    let (events, dictionary) = load_zones(db, config)?;
    let rows = aggregate(&events, &dictionary, config.grouping)?;
    let calibration = optional_calibration(db)?;
    let millis = |cycles: u64| Field::from(calibration.map(|c| c.millis(cycles)));

    let mut header = vec![
        "excl",
        "incl",
        "num_inst",
        "name",
        "num_children",
        "min_depth",
        "max_depth",
        "excl_cycles",
        "incl_cycles",
        "excl_ms",
        "incl_ms",
    ];
    header.extend(grouping_columns(config.grouping));
    sink.write_header(&header)?;

    let mut written = 0;
    for row in rows.iter().filter(|r| name_matches(config, Some(r.name))) {
        let mut fields = vec![
            Field::from(row.exclusive_ratio),
            Field::from(row.inclusive_ratio),
            Field::from(row.instance_count),
            Field::from(row.name),
            Field::from(row.child_count),
            Field::from(row.min_depth),
            Field::from(row.max_depth),
            Field::from(row.exclusive_cycles),
            Field::from(row.total_cycles),
            millis(row.exclusive_cycles),
            millis(row.total_cycles),
        ];
        if config.grouping.by_depth {
            fields.push(Field::from(row.depth));
        }
        if config.grouping.by_thread {
            fields.push(Field::from(row.thread));
        }
        sink.write_row(&fields)?;
        written += 1;
    }

    if written == 0 {
        if let Some(name) = &config.zone_name {
            info!("no zones named {name:?}");
        }
    }
    Ok(written)
}

/// Map the classic single-letter mode flags onto a command.
pub fn command_from_flags(
    list_tables: bool,
    zones: bool,
    zone_totals: bool,
    zone_totals_excl: bool,
    table: Option<String>,
) -> Result<ReportCommand> {
    Ok(if list_tables {
        ReportCommand::ListTables
    } else if zones {
        ReportCommand::Zones
    } else if zone_totals {
        ReportCommand::ZoneTotals
    } else if zone_totals_excl {
        ReportCommand::ZoneTotalsExclusive
    } else if let Some(table) = table {
        ReportCommand::DumpTable(table)
    } else {
        bail!("No table name specified!");
    })
}
