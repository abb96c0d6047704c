//! Report sinks
//!
//! Every report is a header row followed by data rows. The `ReportSink`
//! trait lets the report drivers write rows without knowing whether they end
//! up as CSV or JSON lines.
//!
//! Header names must line up positionally with the fields of every row.

mod csv;
mod json;
mod types;

pub use self::csv::CsvSink;
pub use self::json::JsonLinesSink;
pub use types::*;

use std::io::Write;

use anyhow::Result;
use clap::ValueEnum;

/// Trait for abstracting report output formats
pub trait ReportSink {
    /// Write the column names. Called once, before any row.
    fn write_header(&mut self, columns: &[&str]) -> Result<()>;

    /// Write one data row
    fn write_row(&mut self, fields: &[Field]) -> Result<()>;

    /// Flush any buffered data to the output
    fn finish(&mut self) -> Result<()>;
}

/// Output format selectable from the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

/// Create a sink of the requested format writing to `writer`.
pub fn sink_for<'w, W: Write + 'w>(format: OutputFormat, writer: W) -> Box<dyn ReportSink + 'w> {
    match format {
        OutputFormat::Csv => Box::new(CsvSink::new(writer)),
        OutputFormat::Json => Box::new(JsonLinesSink::new(writer)),
    }
}

/// Sink that keeps everything in memory, for tests and library callers that
/// want the rows rather than text.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub header: Vec<String>,
    pub rows: Vec<Vec<Field>>,
}

impl ReportSink for MemorySink {
    fn write_header(&mut self, columns: &[&str]) -> Result<()> {
        self.header = columns.iter().map(|c| c.to_string()).collect();
        Ok(())
    }

    fn write_row(&mut self, fields: &[Field]) -> Result<()> {
        self.rows.push(fields.to_vec());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}
