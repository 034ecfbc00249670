//! Subject list loading
//!
//! Rows without a usable identifier or name are skipped with a warning; a
//! bad row never fails the load. Only a missing column or an unreadable file
//! is an error.

use crate::error::{IngestError, Result};
use crate::types::Subject;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

pub const DEFAULT_ID_COLUMN: &str = "university_id";
pub const DEFAULT_NAME_COLUMNS: [&str; 2] = ["name", "university_name"];

/// Which columns hold the identifier and the display name
#[derive(Debug, Clone)]
pub struct SubjectColumns {
    pub id: String,
    /// First column present in the header wins
    pub name: Vec<String>,
}

impl Default for SubjectColumns {
    fn default() -> Self {
        Self {
            id: DEFAULT_ID_COLUMN.to_string(),
            name: DEFAULT_NAME_COLUMNS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Outcome of a load
#[derive(Debug, Default)]
pub struct SubjectLoad {
    pub subjects: Vec<Subject>,
    pub skipped: usize,
}

pub fn load_subjects(path: &Path, columns: &SubjectColumns) -> Result<SubjectLoad> {
    let file = std::fs::File::open(path).map_err(|e| {
        IngestError::config(format!("cannot open subject list {}: {}", path.display(), e))
    })?;
    let load = read_subjects(file, columns)?;
    info!(
        path = %path.display(),
        loaded = load.subjects.len(),
        skipped = load.skipped,
        "Loaded subjects"
    );
    Ok(load)
}

pub fn read_subjects<R: Read>(input: R, columns: &SubjectColumns) -> Result<SubjectLoad> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);
    let headers = reader.headers()?.clone();

    let position = |name: &str| headers.iter().position(|h| h.trim() == name);
    let id_idx = position(columns.id.as_str()).ok_or_else(|| {
        IngestError::config(format!("subject list has no '{}' column", columns.id))
    })?;
    let name_idx = columns
        .name
        .iter()
        .find_map(|c| position(c.as_str()))
        .ok_or_else(|| {
            IngestError::config(format!(
                "subject list has none of the name columns {:?}",
                columns.name
            ))
        })?;

    let mut load = SubjectLoad::default();
    let mut seen = HashSet::new();

    for (index, record) in reader.records().enumerate() {
        // Header is row 1
        let row = index + 2;
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!(row, error = %e, "Skipping unreadable row");
                load.skipped += 1;
                continue;
            },
        };

        let raw_id = record.get(id_idx).unwrap_or_default();
        let raw_name = record.get(name_idx).unwrap_or_default().trim();

        let checked = parse_id(raw_id)
            .ok_or_else(|| IngestError::validation(row, format!("invalid identifier '{}'", raw_id)))
            .and_then(|id| {
                if raw_name.is_empty() {
                    Err(IngestError::validation(row, "missing name"))
                } else if !seen.insert(id) {
                    Err(IngestError::validation(row, format!("duplicate identifier {}", id)))
                } else {
                    Ok(Subject::new(id, raw_name))
                }
            });

        match checked {
            Ok(subject) => load.subjects.push(subject),
            Err(e) => {
                warn!(error = %e, "Skipping subject row");
                load.skipped += 1;
            },
        }
    }

    Ok(load)
}

/// Integer identifiers, also accepting integral floats such as `"5.0"`
pub fn parse_id(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(id) = raw.parse::<i64>() {
        return Some(id);
    }
    let float = raw.parse::<f64>().ok()?;
    let in_range = float.is_finite() && float.abs() < i64::MAX as f64;
    (in_range && float.fract() == 0.0).then_some(float as i64)
}
