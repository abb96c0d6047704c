use std::io::Write;

use anyhow::Result;

use super::{Field, ReportSink};

/// Comma-separated output, one line per row.
///
/// Fields containing a comma, quote or line break are quoted, with embedded
/// quotes doubled. Zone names are frequently C++ signatures, so this matters.
pub struct CsvSink<W: Write> {
    writer: W,
}

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    fn write_line<I, S>(&mut self, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let line: Vec<String> = fields
            .into_iter()
            .map(|f| escape_field(f.as_ref()))
            .collect();
        writeln!(self.writer, "{}", line.join(","))?;
        Ok(())
    }
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

impl<W: Write> ReportSink for CsvSink<W> {
    fn write_header(&mut self, columns: &[&str]) -> Result<()> {
        self.write_line(columns)
    }

    fn write_row(&mut self, fields: &[Field]) -> Result<()> {
        self.write_line(fields.iter().map(Field::to_string))
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(header: &[&str], rows: &[Vec<Field>]) -> String {
        let mut buf = Vec::new();
        let mut sink = CsvSink::new(&mut buf);
        sink.write_header(header).unwrap();
        for row in rows {
            sink.write_row(row).unwrap();
        }
        sink.finish().unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_plain_rows() {
        let out = render(
            &["name", "total"],
            &[
                vec![Field::from("update"), Field::UInt(10)],
                vec![Field::from("render"), Field::Null],
            ],
        );
        assert_eq!(out, "name,total\nupdate,10\nrender,\n");
    }

    #[test]
    fn test_escaping() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("f(int, int)"), "\"f(int, int)\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_header_only() {
        assert_eq!(render(&["a", "b,c"], &[]), "a,\"b,c\"\n");
    }
}
