use std::io::Write;

use anyhow::{bail, Result};

use super::{Field, ReportSink};

/// One JSON object per line, keyed by the header's column names.
pub struct JsonLinesSink<W: Write> {
    writer: W,
    columns: Option<Vec<String>>,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            columns: None,
        }
    }
}

impl<W: Write> ReportSink for JsonLinesSink<W> {
    fn write_header(&mut self, columns: &[&str]) -> Result<()> {
        self.columns = Some(columns.iter().map(|c| c.to_string()).collect());
        Ok(())
    }

    fn write_row(&mut self, fields: &[Field]) -> Result<()> {
        let Some(columns) = &self.columns else {
            bail!("JSON sink received a row before its header");
        };
        if columns.len() != fields.len() {
            bail!(
                "row has {} fields but the header names {} columns",
                fields.len(),
                columns.len()
            );
        }

        let obj: serde_json::Map<String, serde_json::Value> = columns
            .iter()
            .zip(fields)
            .map(|(k, v)| Ok((k.clone(), serde_json::to_value(v)?)))
            .collect::<Result<_>>()?;
        serde_json::to_writer(&mut self.writer, &obj)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_lines() {
        let mut buf = Vec::new();
        let mut sink = JsonLinesSink::new(&mut buf);
        sink.write_header(&["name", "excl"]).unwrap();
        sink.write_row(&[Field::from("update"), Field::UInt(50_000)])
            .unwrap();
        sink.write_row(&[Field::Null, Field::Float(0.5)]).unwrap();
        sink.finish().unwrap();

        let out = String::from_utf8(buf).unwrap();
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines[0], serde_json::json!({"name": "update", "excl": 50000}));
        assert_eq!(lines[1], serde_json::json!({"name": null, "excl": 0.5}));
    }

    #[test]
    fn test_row_before_header() {
        let mut sink = JsonLinesSink::new(Vec::new());
        assert!(sink.write_row(&[Field::Int(1)]).is_err());
    }

    #[test]
    fn test_width_mismatch() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.write_header(&["a", "b"]).unwrap();
        assert!(sink.write_row(&[Field::Int(1)]).is_err());
    }
}
