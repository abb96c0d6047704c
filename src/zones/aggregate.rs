//! Inclusive and exclusive time per zone.
//!
//! Inclusive time is the sum of every instance's duration. Exclusive time is
//! inclusive time minus the time covered by each instance's *direct*
//! children: zones on the same thread, exactly one level deeper, that start
//! inside the parent and end no later than it.
//!
//! The two sums are computed in separate passes and only combined per group.
//! Under well-formed nesting every cycle of a parent belongs either to exactly
//! one direct child or to the parent's own body, so subtracting grouped child
//! time from grouped total time gives the same answer as summing per-instance
//! exclusive time.
//!
//! Child matching is a sort-and-scan rather than a nested loop: zones are
//! bucketed by `(thread, depth)` and sorted by start, and each parent
//! binary-searches the bucket one level down for its first candidate.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use super::{TextDictionary, ZoneEvent};
use crate::error::ZoneError;

/// Ratios are fixed point, scaled so that the whole capture is this value.
pub const RATIO_SCALE: u64 = 100_000;

/// How zone instances are grouped into report rows.
///
/// The default merges every instance of a name. Separating by depth keeps
/// recursive calls apart at the cost of splitting otherwise-identical call
/// sites; separating by thread gives one row per name per thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Grouping {
    pub by_depth: bool,
    pub by_thread: bool,
}

impl Grouping {
    pub fn key(&self, event: &ZoneEvent) -> GroupKey {
        GroupKey {
            name_id: event.name_id,
            depth: self.by_depth.then_some(event.depth),
            thread_id: self.by_thread.then_some(event.thread_id),
        }
    }
}

/// Identity of one report row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub name_id: i64,
    pub depth: Option<u32>,
    pub thread_id: Option<i64>,
}

/// Inclusive-only totals for one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TotalRow<'a> {
    pub name: &'a str,
    pub total_cycles: u64,
    pub instance_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread: Option<i64>,
}

/// Inclusive and exclusive totals for one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateRow<'a> {
    pub name: &'a str,
    pub total_cycles: u64,
    pub exclusive_cycles: u64,
    pub inclusive_ratio: u64,
    pub exclusive_ratio: u64,
    pub instance_count: u64,
    pub child_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread: Option<i64>,
    pub min_depth: u32,
    pub max_depth: u32,
}

#[derive(Debug, Clone, Copy)]
struct GroupTotals {
    total_cycles: u64,
    instance_count: u64,
    min_depth: u32,
    max_depth: u32,
}

#[derive(Debug, Clone, Copy, Default)]
struct ChildTotals {
    cycles: u64,
    count: u64,
}

/// Span of the whole capture: latest end minus earliest start.
///
/// `None` for an empty event set.
pub fn elapsed_cycles(events: &[ZoneEvent]) -> Option<u64> {
    let min_start = events.iter().map(|e| e.start).min()?;
    let max_end = events.iter().map(|e| e.end).max()?;
    Some(max_end.saturating_sub(min_start))
}

/// Scale `cycles` against `elapsed` as a [`RATIO_SCALE`] fixed-point value.
fn ratio(cycles: u64, elapsed: u64) -> u64 {
    let scaled = u128::from(cycles) * u128::from(RATIO_SCALE) / u128::from(elapsed);
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

// Pass one: inclusive totals per group. Must be complete before child
// attribution is subtracted, otherwise groups with several children per
// parent instance would be counted once per child.
fn group_totals(
    events: &[ZoneEvent],
    grouping: Grouping,
) -> Result<HashMap<GroupKey, GroupTotals>, ZoneError> {
    let mut totals: HashMap<GroupKey, GroupTotals> = HashMap::new();
    for event in events {
        let t = totals.entry(grouping.key(event)).or_insert(GroupTotals {
            total_cycles: 0,
            instance_count: 0,
            min_depth: event.depth,
            max_depth: event.depth,
        });
        t.total_cycles = add_cycles(t.total_cycles, event.duration(), event.name_id)?;
        t.instance_count += 1;
        t.min_depth = t.min_depth.min(event.depth);
        t.max_depth = t.max_depth.max(event.depth);
    }
    Ok(totals)
}

fn add_cycles(sum: u64, cycles: u64, name_id: i64) -> Result<u64, ZoneError> {
    sum.checked_add(cycles).ok_or(ZoneError::CycleOverflow { name_id })
}

// Pass two: time of direct children, summed per parent group.
fn attribute_children(
    events: &[ZoneEvent],
    grouping: Grouping,
) -> Result<HashMap<GroupKey, ChildTotals>, ZoneError> {
    let mut buckets: HashMap<(i64, u32), Vec<(u64, u64)>> = HashMap::new();
    for event in events {
        buckets
            .entry((event.thread_id, event.depth))
            .or_default()
            .push((event.start, event.end));
    }
    for bucket in buckets.values_mut() {
        bucket.sort_unstable();
    }

    let mut attributed: HashMap<GroupKey, ChildTotals> = HashMap::new();
    for parent in events {
        let Some(child_depth) = parent.depth.checked_add(1) else {
            continue;
        };
        let Some(candidates) = buckets.get(&(parent.thread_id, child_depth)) else {
            continue;
        };

        let first = candidates.partition_point(|&(start, _)| start < parent.start);
        let mut children = ChildTotals::default();
        for &(start, end) in &candidates[first..] {
            if start > parent.end {
                break;
            }
            if end <= parent.end {
                // A saturated sum still exceeds any parent and is reported below.
                children.cycles = children.cycles.saturating_add(end.saturating_sub(start));
                children.count += 1;
            }
        }

        if children.count == 0 {
            continue;
        }
        if children.cycles > parent.duration() {
            return Err(ZoneError::MalformedNesting {
                name_id: parent.name_id,
                thread_id: parent.thread_id,
                start: parent.start,
                children_cycles: children.cycles,
                parent_cycles: parent.duration(),
            });
        }

        let entry = attributed.entry(grouping.key(parent)).or_default();
        entry.cycles = add_cycles(entry.cycles, children.cycles, parent.name_id)?;
        entry.count += children.count;
    }

    Ok(attributed)
}

fn resolve<'a>(
    dictionary: &'a TextDictionary,
    key: &GroupKey,
    missing: &mut usize,
) -> Option<&'a str> {
    let name = dictionary.get(key.name_id);
    if name.is_none() {
        *missing += 1;
    }
    name
}

fn compare_names<'a>(
    a: (&'a str, Option<u32>, Option<i64>),
    b: (&'a str, Option<u32>, Option<i64>),
) -> Ordering {
    a.0.cmp(b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2))
}

/// Inclusive time per group, largest first.
///
/// Groups whose name id is absent from `dictionary` are left out.
pub fn inclusive_totals<'a>(
    events: &[ZoneEvent],
    dictionary: &'a TextDictionary,
    grouping: Grouping,
) -> Result<Vec<TotalRow<'a>>, ZoneError> {
    let mut missing = 0;
    let mut rows: Vec<TotalRow<'a>> = group_totals(events, grouping)?
        .into_iter()
        .filter_map(|(key, totals)| {
            let name = resolve(dictionary, &key, &mut missing)?;
            Some(TotalRow {
                name,
                total_cycles: totals.total_cycles,
                instance_count: totals.instance_count,
                depth: key.depth,
                thread: key.thread_id,
            })
        })
        .collect();

    if missing > 0 {
        warn!("{missing} zone group(s) reference names missing from the text dictionary");
    }

    rows.sort_by(|a, b| {
        b.total_cycles.cmp(&a.total_cycles).then_with(|| {
            compare_names((a.name, a.depth, a.thread), (b.name, b.depth, b.thread))
        })
    });
    Ok(rows)
}

/// Inclusive and exclusive time per group, ordered by exclusive ratio
/// (descending), then name.
///
/// An empty event set gives an empty report. A capture whose zones all sit
/// on a single instant has no elapsed time to scale against and is rejected.
pub fn aggregate<'a>(
    events: &[ZoneEvent],
    dictionary: &'a TextDictionary,
    grouping: Grouping,
) -> Result<Vec<AggregateRow<'a>>, ZoneError> {
    let Some(elapsed) = elapsed_cycles(events) else {
        return Ok(Vec::new());
    };
    if elapsed == 0 {
        return Err(ZoneError::degenerate(
            "zero elapsed cycles across the capture",
        ));
    }

    let totals = group_totals(events, grouping)?;
    let attributed = attribute_children(events, grouping)?;
    debug!(
        "{} zone events in {} groups, {} with children, {} elapsed cycles",
        events.len(),
        totals.len(),
        attributed.len(),
        elapsed
    );

    let mut missing = 0;
    let mut rows: Vec<AggregateRow<'a>> = totals
        .into_iter()
        .filter_map(|(key, totals)| {
            let name = resolve(dictionary, &key, &mut missing)?;
            let children = attributed.get(&key).copied().unwrap_or_default();
            let exclusive_cycles = totals.total_cycles.saturating_sub(children.cycles);
            Some(AggregateRow {
                name,
                total_cycles: totals.total_cycles,
                exclusive_cycles,
                inclusive_ratio: ratio(totals.total_cycles, elapsed),
                exclusive_ratio: ratio(exclusive_cycles, elapsed),
                instance_count: totals.instance_count,
                child_count: children.count,
                depth: key.depth,
                thread: key.thread_id,
                min_depth: totals.min_depth,
                max_depth: totals.max_depth,
            })
        })
        .collect();

    if missing > 0 {
        warn!("{missing} zone group(s) reference names missing from the text dictionary");
    }

    rows.sort_by(|a, b| {
        b.exclusive_ratio.cmp(&a.exclusive_ratio).then_with(|| {
            compare_names((a.name, a.depth, a.thread), (b.name, b.depth, b.thread))
        })
    });
    Ok(rows)
}
