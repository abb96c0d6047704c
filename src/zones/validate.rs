//! Nesting validation for zone captures.
//!
//! The aggregator assumes well-formed instrumentation output: on each thread,
//! zones at the same depth never overlap and every zone below the top level
//! sits inside a zone one level up. Corrupted captures break those
//! assumptions and skew exclusive totals, so reports can opt into checking
//! them first.
//!
//! # Example
//!
//! ```
//! use tmdump::zones::{validate_zones, TextDictionary, ZoneEvent};
//!
//! let dict: TextDictionary = [(1, "frame")].into_iter().collect();
//! let events = vec![ZoneEvent::new(1, 1, 0, 0, 100)];
//! let result = validate_zones(&events, &dict);
//! assert!(result.is_valid());
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::{TextDictionary, ZoneEvent};

/// Findings from [`validate_zones`]. Only `errors` make a capture unusable.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Nesting errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A zone ends before it starts.
    InvertedInterval { thread_id: i64, start: u64, end: u64 },
    /// Two zones at the same depth on the same thread overlap.
    OverlappingSiblings {
        thread_id: i64,
        depth: u32,
        first_start: u64,
        first_end: u64,
        second_start: u64,
    },
    /// A nested zone has no enclosing zone one level up.
    MissingParent { thread_id: i64, depth: u32, start: u64 },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvertedInterval {
                thread_id,
                start,
                end,
            } => write!(
                f,
                "thread {thread_id}: zone ends at {end} before it starts at {start}"
            ),
            ValidationError::OverlappingSiblings {
                thread_id,
                depth,
                first_start,
                first_end,
                second_start,
            } => write!(
                f,
                "thread {thread_id} depth {depth}: zone at {second_start} starts inside \
                 sibling {first_start}..{first_end}"
            ),
            ValidationError::MissingParent {
                thread_id,
                depth,
                start,
            } => write!(
                f,
                "thread {thread_id} depth {depth}: zone at {start} has no enclosing zone at depth {}",
                depth - 1
            ),
        }
    }
}

/// Issues that don't affect the arithmetic but are worth knowing about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    /// Zones whose name id is not in the text dictionary.
    UnknownName { name_id: i64, count: u64 },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::UnknownName { name_id, count } => write!(
                f,
                "{count} zone(s) reference name id {name_id}, which is not in the text dictionary"
            ),
        }
    }
}

/// Check zone nesting on every thread.
pub fn validate_zones(events: &[ZoneEvent], dictionary: &TextDictionary) -> ValidationResult {
    let mut result = ValidationResult::default();

    let mut buckets: HashMap<(i64, u32), Vec<(u64, u64)>> = HashMap::new();
    let mut unknown: BTreeMap<i64, u64> = BTreeMap::new();

    for event in events {
        if event.end < event.start {
            result.errors.push(ValidationError::InvertedInterval {
                thread_id: event.thread_id,
                start: event.start,
                end: event.end,
            });
        }
        if dictionary.get(event.name_id).is_none() {
            *unknown.entry(event.name_id).or_default() += 1;
        }
        buckets
            .entry((event.thread_id, event.depth))
            .or_default()
            .push((event.start, event.end));
    }
    for bucket in buckets.values_mut() {
        bucket.sort_unstable();
    }

    let mut keys: Vec<&(i64, u32)> = buckets.keys().collect();
    keys.sort_unstable();

    for &(thread_id, depth) in keys {
        let bucket = &buckets[&(thread_id, depth)];

        for pair in bucket.windows(2) {
            let (first_start, first_end) = pair[0];
            let (second_start, _) = pair[1];
            if second_start < first_end {
                result.errors.push(ValidationError::OverlappingSiblings {
                    thread_id,
                    depth,
                    first_start,
                    first_end,
                    second_start,
                });
            }
        }

        if depth == 0 {
            continue;
        }
        let parents = buckets
            .get(&(thread_id, depth - 1))
            .map(Vec::as_slice)
            .unwrap_or_default();
        for &(start, end) in bucket {
            // Last parent starting at or before the child.
            let idx = parents.partition_point(|&(p_start, _)| p_start <= start);
            let enclosed = idx > 0 && parents[idx - 1].1 >= end;
            if !enclosed {
                result.errors.push(ValidationError::MissingParent {
                    thread_id,
                    depth,
                    start,
                });
            }
        }
    }

    for (name_id, count) in unknown {
        result.warnings.push(ValidationWarning::UnknownName { name_id, count });
    }

    result
}
