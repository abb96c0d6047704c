/// Telemetry capture schema
///
/// Only the tables and columns this tool reads are described here. Real
/// captures carry many more tables; they are ignored except by the generic
/// list/dump commands.
pub const SCHEMA_SQL: &str = r#"
-- Shared string dictionary, referenced by id from every text-bearing column
CREATE TABLE IF NOT EXISTS tmexpandedtext (
    id INTEGER PRIMARY KEY,
    content TEXT NOT NULL
);

-- Session-wide settings reported once at capture start
CREATE TABLE IF NOT EXISTS tmsessioninfo (
    ticks_per_second REAL NOT NULL
);

-- Calibration samples: logical tick vs raw cycle counter
CREATE TABLE IF NOT EXISTS tmticks (
    tick INTEGER NOT NULL,
    tsc INTEGER NOT NULL
);

-- One row per zone instance (entered at start_tsc, exited at end_tsc)
CREATE TABLE IF NOT EXISTS tmzones (
    start_tsc INTEGER NOT NULL,
    end_tsc INTEGER NOT NULL,
    depth INTEGER NOT NULL,
    line INTEGER,
    flags INTEGER,
    thread_id INTEGER NOT NULL,
    process_id INTEGER,
    lock_ptr INTEGER,
    fullname_id INTEGER NOT NULL,
    filename_id INTEGER,
    path_id INTEGER
);

CREATE INDEX IF NOT EXISTS zindex_start ON tmzones(start_tsc);
"#;

/// Tables a capture must contain for the zone reports.
pub const ZONE_TABLES: &[&str] = &["tmzones", "tmexpandedtext"];

/// Tables a capture must contain for clock calibration.
pub const CALIBRATION_TABLES: &[&str] = &["tmsessioninfo", "tmticks"];

/// Creates the telemetry tables in the provided SQLite connection
///
/// Used to build fixture captures; the report commands never write.
pub fn create_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_creation() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();

        for table in ZONE_TABLES.iter().chain(CALIBRATION_TABLES) {
            let count: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        create_schema(&conn).unwrap();
    }
}
