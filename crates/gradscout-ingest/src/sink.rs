//! Append-only CSV output

use crate::error::Result;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// CSV writer with a fixed header
///
/// The header is written on creation, even when no row follows, and every row
/// is serialized in struct field order. Rows must match the header.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    rows: usize,
}

impl CsvSink<File> {
    /// Create (or truncate) `path` and write the header
    pub fn create(path: &Path, header: &[&str]) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_writer(File::create(path)?, header)
    }
}

impl<W: Write> CsvSink<W> {
    pub fn from_writer(inner: W, header: &[&str]) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(inner);
        writer.write_record(header)?;
        Ok(Self { writer, rows: 0 })
    }

    /// Append one row
    pub fn write<T: Serialize>(&mut self, row: &T) -> Result<()> {
        self.writer.serialize(row)?;
        self.rows += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn rows_written(&self) -> usize {
        self.rows
    }

    /// Flush and hand back the underlying writer
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| crate::error::IngestError::Io(e.into_error()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::projector::{ApplicationRow, APPLICATION_HEADER};

    #[test]
    fn test_header_written_without_rows() {
        let sink = CsvSink::from_writer(Vec::new(), &APPLICATION_HEADER).unwrap();
        let bytes = sink.into_inner().unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "student_id,university_id,university_name\n"
        );
    }

    #[test]
    fn test_rows_follow_header() {
        let mut sink = CsvSink::from_writer(Vec::new(), &APPLICATION_HEADER).unwrap();
        sink.write(&ApplicationRow {
            student_id: "1".into(),
            university_id: "5".into(),
            university_name: "Carnegie Mellon, Pittsburgh".into(),
        })
        .unwrap();
        assert_eq!(sink.rows_written(), 1);

        let text = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "1,5,\"Carnegie Mellon, Pittsburgh\"");
    }

    #[test]
    fn test_create_makes_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("rows.csv");

        let mut sink = CsvSink::create(&path, &APPLICATION_HEADER).unwrap();
        sink.flush().unwrap();

        assert!(path.exists());
    }
}
