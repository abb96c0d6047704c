//! Shared fixtures for integration tests.
//!
//! Builds small Telemetry-shaped SQLite captures on disk.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use tempfile::TempDir;
use tmdump::schema::create_schema;

/// A zone row to insert: (name_id, thread_id, depth, start, end).
pub type ZoneRow = (i64, i64, i64, i64, i64);

pub struct Capture {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl Capture {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Write a capture with the given dictionary, zones and tick samples.
pub fn write_capture(
    names: &[(i64, &str)],
    zones: &[ZoneRow],
    ticks: &[(i64, i64)],
    ticks_per_second: f64,
) -> Capture {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("capture.tm");
    let conn = Connection::open(&path).expect("Failed to create capture");
    create_schema(&conn).expect("Failed to create schema");

    for (id, content) in names {
        conn.execute(
            "INSERT INTO tmexpandedtext (id, content) VALUES (?1, ?2)",
            params![id, content],
        )
        .unwrap();
    }
    for (i, (name_id, thread_id, depth, start, end)) in zones.iter().enumerate() {
        conn.execute(
            "INSERT INTO tmzones (start_tsc, end_tsc, depth, line, flags, thread_id, \
             process_id, lock_ptr, fullname_id, filename_id, path_id) \
             VALUES (?1, ?2, ?3, ?4, 0, ?5, 1, NULL, ?6, NULL, NULL)",
            params![start, end, depth, i as i64, thread_id, name_id],
        )
        .unwrap();
    }
    for (tick, tsc) in ticks {
        conn.execute(
            "INSERT INTO tmticks (tick, tsc) VALUES (?1, ?2)",
            params![tick, tsc],
        )
        .unwrap();
    }
    conn.execute(
        "INSERT INTO tmsessioninfo (ticks_per_second) VALUES (?1)",
        params![ticks_per_second],
    )
    .unwrap();

    Capture { dir, path }
}

/// A frame with an update and a render pass; update calls physics twice.
pub fn game_capture() -> Capture {
    write_capture(
        &[
            (1, "frame"),
            (2, "update"),
            (3, "physics"),
            (4, "render"),
            (5, "draw(mesh, material)"),
        ],
        &[
            (1, 1, 0, 0, 1000),
            (2, 1, 1, 0, 400),
            (3, 1, 2, 50, 150),
            (3, 1, 2, 200, 300),
            (4, 1, 1, 400, 1000),
            (5, 1, 2, 500, 900),
            // A worker thread doing physics at the top level.
            (3, 2, 0, 100, 600),
        ],
        &[(1, 100), (2, 200), (3, 300), (4, 400), (5, 500)],
        10.0,
    )
}
