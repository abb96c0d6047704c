//! Read-only access to Telemetry capture databases.
//!
//! [`TelemetryDb`] owns a single SQLite connection for the lifetime of one
//! report. The generic table commands live here; the zone-specific reads are
//! implemented on the same type in [`crate::zones::reader`].

mod value;

pub use value::sqlite_value_to_field;

use anyhow::{bail, Context, Result};
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::output::Field;

/// Table information.
#[derive(Debug, Serialize)]
pub struct TableInfo {
    pub name: String,
    pub row_count: u64,
}

/// Column information.
#[derive(Debug, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

/// Every row of a table, in storage order.
#[derive(Debug)]
pub struct TableDump {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Field>>,
}

/// Wrapper around a SQLite connection to a Telemetry capture.
pub struct TelemetryDb {
    pub(crate) conn: Connection,
    path: PathBuf,
}

impl TelemetryDb {
    /// Open a capture read-only and check that SQLite can actually read it.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            bail!("Database not found: {}", path.display());
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open {}", path.display()))?;

        let db = Self {
            conn,
            path: path.to_path_buf(),
        };
        db.verify()
            .with_context(|| format!("{} is not a readable SQLite database", path.display()))?;

        debug!("opened capture {}", path.display());
        Ok(db)
    }

    /// Wrap an already-open connection (in-memory fixtures, mostly).
    pub fn from_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn,
            path: PathBuf::from(":memory:"),
        };
        db.verify()?;
        Ok(db)
    }

    // SQLite opens arbitrary files lazily; the first real read is what fails.
    fn verify(&self) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")?;
        let mut rows = stmt.query([])?;
        rows.next()?;
        Ok(())
    }

    /// List all tables with row counts.
    pub fn list_tables(&self) -> Result<Vec<TableInfo>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
        let mut rows = stmt.query([])?;

        let mut tables = Vec::new();
        while let Some(row) = rows.next()? {
            let name: String = row.get(0)?;
            let row_count = self.table_row_count(&name)?;
            tables.push(TableInfo { name, row_count });
        }

        Ok(tables)
    }

    /// Describe a table's schema.
    pub fn describe_table(&self, table_name: &str) -> Result<Vec<ColumnInfo>> {
        if !self.table_exists(table_name)? {
            bail!("Table not found: {table_name}");
        }

        let mut stmt = self
            .conn
            .prepare("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")?;
        let mut rows = stmt.query([table_name])?;

        let mut columns = Vec::new();
        while let Some(row) = rows.next()? {
            columns.push(ColumnInfo {
                name: row.get(0)?,
                data_type: row.get(1)?,
            });
        }

        Ok(columns)
    }

    /// Read every row of a table.
    pub fn dump_table(&self, table_name: &str) -> Result<TableDump> {
        if !self.table_exists(table_name)? {
            bail!("Table not found: {table_name}");
        }
        self.query_fields(&format!("SELECT * FROM \"{table_name}\""))
    }

    /// Run an arbitrary read query and render every value as a [`Field`].
    pub fn query_fields(&self, sql: &str) -> Result<TableDump> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let column_count = columns.len();

        let mut rows = stmt.query([])?;
        let mut data = Vec::new();
        while let Some(row) = rows.next()? {
            let mut fields = Vec::with_capacity(column_count);
            for i in 0..column_count {
                let value: rusqlite::types::Value = row.get(i)?;
                fields.push(sqlite_value_to_field(value));
            }
            data.push(fields);
        }

        Ok(TableDump {
            columns,
            rows: data,
        })
    }

    /// Get the database path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [table_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Fail with a readable message unless every named table is present.
    pub fn require_tables(&self, tables: &[&str]) -> Result<()> {
        for table in tables {
            if !self.table_exists(table)? {
                bail!("Database missing {table} table. Is this a Telemetry capture?");
            }
        }
        Ok(())
    }

    fn table_row_count(&self, table_name: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM \"{table_name}\"");
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        u64::try_from(count)
            .with_context(|| format!("invalid row count {count} for {table_name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::create_schema;

    fn fixture() -> TelemetryDb {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO tmexpandedtext VALUES (1, 'main'), (2, 'update');
             INSERT INTO tmticks VALUES (1, 100), (2, 200);",
        )
        .unwrap();
        TelemetryDb::from_connection(conn).unwrap()
    }

    #[test]
    fn test_list_tables() {
        let db = fixture();
        let tables = db.list_tables().unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["tmexpandedtext", "tmsessioninfo", "tmticks", "tmzones"]);
        assert_eq!(tables[0].row_count, 2);
        assert_eq!(tables[3].row_count, 0);
    }

    #[test]
    fn test_table_row_count() {
        let db = fixture();
        assert_eq!(db.table_row_count("tmticks").unwrap(), 2);
        assert_eq!(db.table_row_count("tmzones").unwrap(), 0);
        assert!(db.table_row_count("no_such_table").is_err());
    }

    #[test]
    fn test_dump_table() {
        let db = fixture();
        let dump = db.dump_table("tmexpandedtext").unwrap();
        assert_eq!(dump.columns, vec!["id", "content"]);
        assert_eq!(
            dump.rows,
            vec![
                vec![Field::Int(1), Field::Text("main".to_string())],
                vec![Field::Int(2), Field::Text("update".to_string())],
            ]
        );
    }

    #[test]
    fn test_dump_missing_table() {
        let db = fixture();
        let err = db.dump_table("nope").unwrap_err();
        assert!(err.to_string().contains("Table not found: nope"));
    }

    #[test]
    fn test_describe_table() {
        let db = fixture();
        let cols = db.describe_table("tmticks").unwrap();
        assert_eq!(cols.len(), 2);
        assert_eq!(cols[0].name, "tick");
        assert_eq!(cols[0].data_type, "INTEGER");
    }

    #[test]
    fn test_require_tables() {
        let db = fixture();
        assert!(db.require_tables(&["tmzones", "tmticks"]).is_ok());
        let err = db.require_tables(&["tmzones", "tmplots"]).unwrap_err();
        assert!(err.to_string().contains("missing tmplots"));
    }

    #[test]
    fn test_open_missing_file() {
        let err = TelemetryDb::open(Path::new("/nonexistent/capture.tm")).err().unwrap();
        assert!(err.to_string().contains("Database not found"));
    }

    #[test]
    fn test_open_non_database_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("not-a-db");
        std::fs::write(&path, b"this is definitely not sqlite, just some text padding it out")
            .unwrap();
        assert!(TelemetryDb::open(&path).is_err());
    }
}
