//! Zone data model, reading, validation and aggregation.
//!
//! A zone is a named, timed region of instrumented code. Each row of the
//! capture's `tmzones` table is one entry/exit pair recorded on one thread at
//! one call-stack depth. Names are ids into the shared [`TextDictionary`].

pub mod aggregate;
pub mod reader;
pub mod validate;

pub use aggregate::{
    aggregate, elapsed_cycles, inclusive_totals, AggregateRow, GroupKey, Grouping, TotalRow,
};
pub use reader::{ZoneDumpRow, ZoneFilter};
pub use validate::{validate_zones, ValidationError, ValidationResult, ValidationWarning};

use std::collections::HashMap;

/// One zone instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneEvent {
    pub start: u64,
    pub end: u64,
    pub depth: u32,
    pub thread_id: i64,
    pub process_id: i64,
    pub name_id: i64,
    pub line: Option<i64>,
    pub flags: Option<i64>,
    pub lock_ptr: Option<i64>,
    pub filename_id: Option<i64>,
    pub path_id: Option<i64>,
}

impl ZoneEvent {
    /// A zone with no auxiliary fields set.
    pub fn new(name_id: i64, thread_id: i64, depth: u32, start: u64, end: u64) -> Self {
        Self {
            start,
            end,
            depth,
            thread_id,
            process_id: 0,
            name_id,
            line: None,
            flags: None,
            lock_ptr: None,
            filename_id: None,
            path_id: None,
        }
    }

    /// Cycles spent inside the zone, nested zones included.
    #[inline]
    pub fn duration(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }
}

/// Deduplicated string table referenced by id from zone rows.
///
/// Loaded once per report and borrowed by every row that carries a name.
#[derive(Debug, Default, Clone)]
pub struct TextDictionary {
    entries: HashMap<i64, Box<str>>,
}

impl TextDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: i64, content: impl Into<Box<str>>) {
        self.entries.insert(id, content.into());
    }

    pub fn get(&self, id: i64) -> Option<&str> {
        self.entries.get(&id).map(|s| &**s)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<Box<str>>> FromIterator<(i64, S)> for TextDictionary {
    fn from_iter<I: IntoIterator<Item = (i64, S)>>(iter: I) -> Self {
        let mut dict = TextDictionary::new();
        for (id, content) in iter {
            dict.insert(id, content);
        }
        dict
    }
}
