//! Text-dereference query construction.
//!
//! Telemetry stores every string once in a shared dictionary table
//! (`tmexpandedtext`) and data tables refer to it by integer id. A query that
//! wants readable output has to join each such column against the dictionary.
//! This module builds that `SELECT`.
//!
//! Column order is preserved exactly: plain columns first, then text columns,
//! each group in the order given. The CSV emitter relies on the header and
//! data rows lining up positionally.
//!
//! Table and column names are interpolated verbatim. They come from the
//! caller, never from captured data.

use crate::error::ZoneError;

/// Default name of the shared string dictionary table.
pub const TEXT_TABLE: &str = "tmexpandedtext";

/// Builder for a text-dereferencing `SELECT`.
#[derive(Debug, Clone)]
pub struct TextQuery {
    table: String,
    text_table: String,
    plain: Vec<String>,
    text: Vec<String>,
    filter: Option<String>,
}

impl TextQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            text_table: TEXT_TABLE.to_string(),
            plain: Vec::new(),
            text: Vec::new(),
            filter: None,
        }
    }

    /// Columns returned verbatim.
    pub fn plain<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.plain.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Columns holding dictionary ids, returned as the dereferenced string.
    pub fn text<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.text.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Trailing clause appended after the joins, e.g. `WHERE thread_id = 3`.
    pub fn filter(mut self, clause: impl Into<String>) -> Self {
        let clause = clause.into();
        self.filter = if clause.trim().is_empty() {
            None
        } else {
            Some(clause)
        };
        self
    }

    /// Override the dictionary table (defaults to [`TEXT_TABLE`]).
    pub fn text_table(mut self, table: impl Into<String>) -> Self {
        self.text_table = table.into();
        self
    }

    /// Header names in the positional order the query returns them.
    pub fn output_columns(&self) -> Vec<String> {
        self.plain
            .iter()
            .cloned()
            .chain(self.text.iter().map(|c| format!("{c}_text")))
            .collect()
    }

    pub fn build(&self) -> Result<String, ZoneError> {
        if self.plain.is_empty() && self.text.is_empty() {
            return Err(ZoneError::EmptyProjection {
                table: self.table.clone(),
            });
        }

        let projection: Vec<String> = self
            .plain
            .iter()
            .cloned()
            .chain(
                self.text
                    .iter()
                    .enumerate()
                    .map(|(i, name)| format!("text{i}.content AS {name}_text")),
            )
            .collect();

        let mut sql = format!("SELECT {} FROM {}", projection.join(", "), self.table);

        for (i, column) in self.text.iter().enumerate() {
            sql.push_str(&format!(
                " LEFT JOIN {} AS text{i} ON text{i}.id = {column}",
                self.text_table
            ));
        }

        if let Some(filter) = &self.filter {
            sql.push(' ');
            sql.push_str(filter);
        }

        Ok(sql)
    }
}

/// Build a dereferencing query in one call.
///
/// # Examples
///
/// ```
/// use tmdump::text_query::build_text_query;
///
/// let sql = build_text_query("myTable", &["col1", "col2"], &["textCol1"], None).unwrap();
/// assert_eq!(
///     sql,
///     "SELECT col1, col2, text0.content AS textCol1_text FROM myTable \
///      LEFT JOIN tmexpandedtext AS text0 ON text0.id = textCol1"
/// );
/// ```
pub fn build_text_query(
    table: &str,
    plain_columns: &[&str],
    text_columns: &[&str],
    filter: Option<&str>,
) -> Result<String, ZoneError> {
    let mut query = TextQuery::new(table)
        .plain(plain_columns.iter().copied())
        .text(text_columns.iter().copied());
    if let Some(filter) = filter {
        query = query.filter(filter);
    }
    query.build()
}
