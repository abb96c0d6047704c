//! Error taxonomy for the zone aggregation engine.
//!
//! Store-level failures (`rusqlite::Error`) are not wrapped here; they are
//! propagated unchanged through `anyhow::Result` by the database layer.

use thiserror::Error;

use crate::zones::validate::ValidationError;

/// Errors raised by calibration, query construction and aggregation.
#[derive(Error, Debug)]
pub enum ZoneError {
    #[error("calibration needs at least 2 tick samples from the midpoint on, found {found} in total")]
    InsufficientSamples { found: usize },

    #[error("degenerate calibration: {reason}")]
    DegenerateCalibration { reason: String },

    #[error(
        "malformed nesting: zone name id {name_id} on thread {thread_id} at {start} \
         has {children_cycles} cycles of direct children but lasts only {parent_cycles}"
    )]
    MalformedNesting {
        name_id: i64,
        thread_id: i64,
        start: u64,
        children_cycles: u64,
        parent_cycles: u64,
    },

    #[error("cycle total for zone name id {name_id} overflows a 64-bit counter")]
    CycleOverflow { name_id: i64 },

    #[error("negative value {value} in cycle counter column {column}")]
    NegativeTimestamp { column: &'static str, value: i64 },

    #[error("query against {table} selects no columns")]
    EmptyProjection { table: String },

    #[error("capture failed nesting validation with {} error(s)", .errors.len())]
    InvalidNesting { errors: Vec<ValidationError> },
}

impl ZoneError {
    pub(crate) fn degenerate(reason: impl Into<String>) -> Self {
        ZoneError::DegenerateCalibration {
            reason: reason.into(),
        }
    }
}
