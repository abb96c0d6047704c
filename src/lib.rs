//! tmdump library - zone timing reports for Telemetry SQLite captures.
//!
//! A capture records every instrumented zone as a flat row: when it was
//! entered and exited (in raw cycle counter units), at what call-stack depth,
//! on which thread, and under which name (an id into a shared string table).
//! This crate turns those rows into per-zone inclusive and exclusive timing
//! totals without building a call tree.
//!
//! # Modules
//!
//! - [`calibrate`] - cycle counter to wall-clock conversion
//! - [`text_query`] - `SELECT` construction for dictionary-compressed columns
//! - [`db`] - read-only access to a capture
//! - [`zones`] - zone model, reader, validation and aggregation
//! - [`output`] - CSV and JSON-lines report sinks
//! - [`report`] - report drivers tying the above together
//!
//! # Example
//!
//! ```no_run
//! use tmdump::db::TelemetryDb;
//! use tmdump::zones::{aggregate, Grouping, ZoneFilter};
//! use std::path::Path;
//!
//! let db = TelemetryDb::open(Path::new("capture.tm")).expect("open capture");
//! let dictionary = db.read_dictionary().expect("read dictionary");
//! let events = db.read_zone_events(&ZoneFilter::default()).expect("read zones");
//!
//! for row in aggregate(&events, &dictionary, Grouping::default()).expect("aggregate") {
//!     println!("{} {} {}", row.name, row.exclusive_cycles, row.total_cycles);
//! }
//! ```

pub mod calibrate;
pub mod db;
pub mod error;
pub mod output;
pub mod report;
pub mod schema;
pub mod text_query;
pub mod zones;

// Re-export for convenience
pub use calibrate::{calibrate, Calibration, TickSample};
pub use db::TelemetryDb;
pub use error::ZoneError;
pub use report::{run_report, ReportCommand, ReportConfig};
pub use zones::{aggregate, AggregateRow, Grouping, TextDictionary, ZoneEvent};
