//! Property tests for calibration and zone aggregation.
//!
//! Zones are generated by simulating enter/exit sequences on a few threads,
//! which yields well-formed nesting by construction. Aggregation results are
//! checked against a brute-force pairwise matcher.

use std::collections::HashMap;

use proptest::prelude::*;
use tmdump::zones::{aggregate, validate_zones, Grouping, TextDictionary, ZoneEvent};
use tmdump::{calibrate, TickSample, ZoneError};

const NAMES: &[(i64, &str)] = &[(0, "alpha"), (1, "beta"), (2, "gamma"), (3, "delta")];

#[derive(Debug, Clone)]
struct Step {
    thread: i64,
    enter: bool,
    name_id: i64,
    advance: u64,
}

fn step() -> impl Strategy<Value = Step> {
    (0i64..3, any::<bool>(), 0i64..4, 0u64..50).prop_map(|(thread, enter, name_id, advance)| {
        Step {
            thread,
            enter,
            name_id,
            advance,
        }
    })
}

/// Replay enter/exit steps into closed zones. Each thread keeps its own clock
/// and stack; anything still open at the end is closed in stack order.
fn simulate(steps: &[Step]) -> Vec<ZoneEvent> {
    let mut clocks: HashMap<i64, u64> = HashMap::new();
    let mut stacks: HashMap<i64, Vec<(i64, u64)>> = HashMap::new();
    let mut events = Vec::new();

    for s in steps {
        let clock = clocks.entry(s.thread).or_insert(0);
        *clock += s.advance;
        let stack = stacks.entry(s.thread).or_default();
        if s.enter {
            stack.push((s.name_id, *clock));
        } else if let Some((name_id, start)) = stack.pop() {
            events.push(ZoneEvent::new(
                name_id,
                s.thread,
                stack.len() as u32,
                start,
                *clock,
            ));
        }
    }

    for (thread, stack) in stacks.iter_mut() {
        let clock = clocks[thread];
        while let Some((name_id, start)) = stack.pop() {
            events.push(ZoneEvent::new(name_id, *thread, stack.len() as u32, start, clock));
        }
    }

    events
}

fn dictionary() -> TextDictionary {
    NAMES.iter().copied().collect()
}

/// Pairwise child matching, the way a relational self-join would do it.
/// Returns (total, attributed children) per name.
fn brute_force(events: &[ZoneEvent]) -> HashMap<i64, (u64, u64)> {
    let mut out: HashMap<i64, (u64, u64)> = HashMap::new();
    for p in events {
        let entry = out.entry(p.name_id).or_default();
        entry.0 += p.duration();
        for c in events {
            if c.thread_id == p.thread_id
                && c.depth == p.depth + 1
                && c.start >= p.start
                && c.start <= p.end
                && c.end <= p.end
            {
                entry.1 += c.duration();
            }
        }
    }
    out
}

proptest! {
    #[test]
    fn exclusive_never_exceeds_inclusive(steps in prop::collection::vec(step(), 1..120)) {
        let events = simulate(&steps);
        let dict = dictionary();
        match aggregate(&events, &dict, Grouping::default()) {
            Ok(rows) => {
                for row in &rows {
                    prop_assert!(row.exclusive_cycles <= row.total_cycles);
                    prop_assert!(row.exclusive_ratio <= row.inclusive_ratio);
                }
            }
            Err(ZoneError::DegenerateCalibration { .. }) => {
                // Every zone collapsed onto one instant.
                let min = events.iter().map(|e| e.start).min();
                let max = events.iter().map(|e| e.end).max();
                prop_assert_eq!(min, max);
            }
            Err(other) => prop_assert!(false, "unexpected error: {other}"),
        }
    }

    #[test]
    fn matches_pairwise_join(steps in prop::collection::vec(step(), 1..120)) {
        let events = simulate(&steps);
        prop_assume!(events.iter().any(|e| e.duration() > 0));

        let dict = dictionary();
        let rows = aggregate(&events, &dict, Grouping::default()).unwrap();
        let expected = brute_force(&events);

        prop_assert_eq!(rows.len(), expected.len());
        for (id, name) in NAMES {
            let Some(&(total, children)) = expected.get(id) else {
                continue;
            };
            let row = rows.iter().find(|r| r.name == *name).unwrap();
            prop_assert_eq!(row.total_cycles, total);
            prop_assert_eq!(row.exclusive_cycles, total - children);
            prop_assert_eq!(row.exclusive_cycles == row.total_cycles, children == 0);
        }
    }

    #[test]
    fn generated_nesting_is_valid(steps in prop::collection::vec(step(), 0..120)) {
        let events = simulate(&steps);
        let result = validate_zones(&events, &dictionary());
        prop_assert!(result.is_valid(), "{:?}", result.errors);
    }

    #[test]
    fn aggregate_is_idempotent(steps in prop::collection::vec(step(), 1..80)) {
        let events = simulate(&steps);
        let dict = dictionary();
        let grouping = Grouping { by_depth: true, by_thread: false };
        let first = aggregate(&events, &dict, grouping).ok();
        let second = aggregate(&events, &dict, grouping).ok();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn rows_are_ordered(steps in prop::collection::vec(step(), 1..120)) {
        let events = simulate(&steps);
        prop_assume!(events.iter().any(|e| e.duration() > 0));
        let dict = dictionary();
        let rows = aggregate(&events, &dict, Grouping::default()).unwrap();
        for pair in rows.windows(2) {
            prop_assert!(
                pair[0].exclusive_ratio > pair[1].exclusive_ratio
                    || (pair[0].exclusive_ratio == pair[1].exclusive_ratio
                        && pair[0].name <= pair[1].name)
            );
        }
    }

    #[test]
    fn calibration_is_scale_invariant(
        start in 0i64..1_000_000,
        deltas in prop::collection::vec((1i64..1000, 1i64..1_000_000), 2..20),
        ticks_per_second in 1u32..10_000,
    ) {
        let mut tick = start;
        let mut cycles = start;
        let mut samples = vec![TickSample::new(tick, cycles)];
        for (dt, dc) in deltas {
            tick += dt;
            cycles += dc;
            samples.push(TickSample::new(tick, cycles));
        }
        let doubled: Vec<TickSample> = samples
            .iter()
            .map(|s| TickSample::new(s.tick, s.cycles * 2))
            .collect();

        let tps = f64::from(ticks_per_second);
        let base = calibrate(&samples, tps).unwrap();
        let twice = calibrate(&doubled, tps).unwrap();
        prop_assert!((twice - 2.0 * base).abs() <= 1e-9 * twice.abs());
    }
}

#[test]
fn example_parent_and_child() {
    let events = vec![
        ZoneEvent::new(0, 1, 0, 0, 100),
        ZoneEvent::new(1, 1, 1, 10, 60),
    ];
    let dict = dictionary();
    let rows = aggregate(&events, &dict, Grouping::default()).unwrap();
    let alpha = rows.iter().find(|r| r.name == "alpha").unwrap();
    let beta = rows.iter().find(|r| r.name == "beta").unwrap();
    assert_eq!((alpha.total_cycles, alpha.exclusive_cycles), (100, 50));
    assert_eq!((beta.total_cycles, beta.exclusive_cycles), (50, 50));
}

#[test]
fn example_insufficient_samples() {
    let samples = [TickSample::new(1, 10)];
    assert!(matches!(
        calibrate(&samples, 100.0),
        Err(ZoneError::InsufficientSamples { found: 1 })
    ));
}
