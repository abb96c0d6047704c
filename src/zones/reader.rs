//! Zone reader: pulls zone intervals, the text dictionary and calibration
//! samples out of a capture. No aggregation happens here.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::debug;

use super::{TextDictionary, ZoneEvent};
use crate::calibrate::{Calibration, TickSample};
use crate::db::TelemetryDb;
use crate::error::ZoneError;
use crate::schema::{CALIBRATION_TABLES, ZONE_TABLES};
use crate::text_query::{TextQuery, TEXT_TABLE};

const ZONE_TABLE: &str = "tmzones";

/// Numeric zone columns, in the order [`ZoneEvent`] is decoded from.
const ZONE_PLAIN_COLUMNS: &[&str] = &[
    "start_tsc",
    "end_tsc",
    "depth",
    "line",
    "flags",
    "thread_id",
    "process_id",
    "lock_ptr",
];

/// Zone columns holding text dictionary ids.
const ZONE_TEXT_COLUMNS: &[&str] = &["fullname_id", "filename_id", "path_id"];

/// Restricts which zone rows are read.
#[derive(Debug, Clone, Default)]
pub struct ZoneFilter {
    pub thread_id: Option<i64>,
}

impl ZoneFilter {
    fn where_clause(&self) -> String {
        match self.thread_id {
            Some(tid) => format!("WHERE {ZONE_TABLE}.thread_id = {tid}"),
            None => String::new(),
        }
    }
}

/// A zone row with its text columns dereferenced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneDumpRow {
    pub start: u64,
    pub end: u64,
    pub depth: u32,
    pub line: Option<i64>,
    pub flags: Option<i64>,
    pub thread_id: i64,
    pub process_id: Option<i64>,
    pub lock_ptr: Option<i64>,
    pub name: Option<String>,
    pub filename: Option<String>,
    pub path: Option<String>,
}

impl ZoneDumpRow {
    pub fn duration(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }
}

fn cycle_counter(column: &'static str, value: i64) -> Result<u64, ZoneError> {
    u64::try_from(value).map_err(|_| ZoneError::NegativeTimestamp { column, value })
}

fn zone_depth(value: i64) -> Result<u32> {
    u32::try_from(value).with_context(|| format!("invalid zone depth {value}"))
}

impl TelemetryDb {
    /// Load the whole text dictionary.
    pub fn read_dictionary(&self) -> Result<TextDictionary> {
        self.require_tables(&[TEXT_TABLE])?;

        let mut stmt = self
            .conn
            .prepare(&format!("SELECT id, content FROM {TEXT_TABLE}"))?;
        let mut rows = stmt.query([])?;

        let mut dict = TextDictionary::new();
        while let Some(row) = rows.next()? {
            let id: i64 = row.get(0)?;
            let content: Option<String> = row.get(1)?;
            dict.insert(id, content.unwrap_or_default());
        }

        debug!("loaded {} text dictionary entries", dict.len());
        Ok(dict)
    }

    /// Load zone intervals with raw name ids.
    pub fn read_zone_events(&self, filter: &ZoneFilter) -> Result<Vec<ZoneEvent>> {
        self.require_tables(ZONE_TABLES)?;

        let sql = TextQuery::new(ZONE_TABLE)
            .plain(ZONE_PLAIN_COLUMNS.iter().chain(ZONE_TEXT_COLUMNS).copied())
            .filter(filter.where_clause())
            .build()?;

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;

        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            let start: i64 = row.get(0)?;
            let end: i64 = row.get(1)?;
            let depth: i64 = row.get(2)?;
            let process_id: Option<i64> = row.get(6)?;
            events.push(ZoneEvent {
                start: cycle_counter("start_tsc", start)?,
                end: cycle_counter("end_tsc", end)?,
                depth: zone_depth(depth)?,
                line: row.get(3)?,
                flags: row.get(4)?,
                thread_id: row.get(5)?,
                process_id: process_id.unwrap_or_default(),
                lock_ptr: row.get(7)?,
                name_id: row.get(8)?,
                filename_id: row.get(9)?,
                path_id: row.get(10)?,
            });
        }

        debug!("read {} zone events", events.len());
        Ok(events)
    }

    /// Load zone rows with names, file names and paths resolved to text,
    /// ordered by thread then start time.
    pub fn read_zone_dump(&self, filter: &ZoneFilter) -> Result<Vec<ZoneDumpRow>> {
        self.require_tables(ZONE_TABLES)?;

        let clause = format!(
            "{} ORDER BY {ZONE_TABLE}.thread_id, {ZONE_TABLE}.start_tsc, {ZONE_TABLE}.depth",
            filter.where_clause()
        );
        let sql = TextQuery::new(ZONE_TABLE)
            .plain(ZONE_PLAIN_COLUMNS.iter().map(|c| format!("{ZONE_TABLE}.{c}")))
            .text(ZONE_TEXT_COLUMNS.iter().copied())
            .filter(clause)
            .build()?;

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;

        let mut dump = Vec::new();
        while let Some(row) = rows.next()? {
            let start: i64 = row.get(0)?;
            let end: i64 = row.get(1)?;
            let depth: i64 = row.get(2)?;
            dump.push(ZoneDumpRow {
                start: cycle_counter("start_tsc", start)?,
                end: cycle_counter("end_tsc", end)?,
                depth: zone_depth(depth)?,
                line: row.get(3)?,
                flags: row.get(4)?,
                thread_id: row.get(5)?,
                process_id: row.get(6)?,
                lock_ptr: row.get(7)?,
                name: row.get(8)?,
                filename: row.get(9)?,
                path: row.get(10)?,
            });
        }

        Ok(dump)
    }

    /// The tick rate reported once at capture start.
    pub fn ticks_per_second(&self) -> Result<f64> {
        self.require_tables(CALIBRATION_TABLES)?;

        let mut stmt = self
            .conn
            .prepare("SELECT ticks_per_second FROM tmsessioninfo")?;
        let mut rows = stmt.query([])?;
        match rows.next()? {
            Some(row) => Ok(row.get(0)?),
            None => bail!("tmsessioninfo has no rows; cannot determine ticks_per_second"),
        }
    }

    /// Calibration samples ordered by tick.
    pub fn read_tick_samples(&self) -> Result<Vec<TickSample>> {
        self.require_tables(CALIBRATION_TABLES)?;

        let mut stmt = self
            .conn
            .prepare("SELECT tick, tsc FROM tmticks ORDER BY tick")?;
        let mut rows = stmt.query([])?;

        let mut samples = Vec::new();
        while let Some(row) = rows.next()? {
            samples.push(TickSample::new(row.get(0)?, row.get(1)?));
        }
        Ok(samples)
    }

    /// Derive the cycles-per-second factor for this capture.
    pub fn calibration(&self) -> Result<Calibration> {
        let ticks_per_second = self.ticks_per_second()?;
        let samples = self.read_tick_samples()?;
        let calibration = Calibration::from_samples(&samples, ticks_per_second)?;
        debug!(
            "calibrated {:.0} cycles/s from {} tick samples at {} ticks/s",
            calibration.cycles_per_second(),
            samples.len(),
            ticks_per_second
        );
        Ok(calibration)
    }

    /// Whether the capture carries the tables needed for [`Self::calibration`].
    pub fn has_calibration(&self) -> Result<bool> {
        for table in CALIBRATION_TABLES {
            if !self.table_exists(table)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
