//! University directory collection
//!
//! Walks a fixed number of pages and writes flat university lists. The
//! `university_id,university_name` directory is what the extraction commands
//! read back as their subject list; the rankings list is a standalone export.
//! A failed page is logged and skipped.

use crate::error::Result;
use crate::sink::CsvSink;
use crate::types::Item;
use crate::upstream::UpstreamClient;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::io::Write;
use tracing::{info, warn};

pub const DIRECTORY_HEADER: [&str; 2] = ["university_id", "university_name"];
pub const RANKINGS_HEADER: [&str; 6] = ["name", "city", "state", "url", "ranking", "schoolData"];

/// Render a JSON value as a CSV cell; missing and null become empty
fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Look up `key` inside a nested object, treating an empty object as absent
fn nested<'a>(item: &'a Item, object: &str, key: &str) -> Option<&'a Value> {
    item.get(object)
        .and_then(Value::as_object)
        .filter(|o| !o.is_empty())
        .and_then(|o| o.get(key))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub university_id: String,
    pub university_name: String,
}

impl DirectoryEntry {
    /// Missing values are left empty so the subject loader skips the row
    pub fn from_item(item: &Item) -> Self {
        Self {
            university_id: cell(item.get("university_id")),
            university_name: cell(item.get("university_name")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankingEntry {
    pub name: String,
    pub city: String,
    pub state: String,
    pub url: String,
    /// `ranking.display_rank`
    pub ranking: String,
    /// `schoolData.c_avg_acad_rep_score`
    #[serde(rename = "schoolData")]
    pub school_data: String,
}

impl RankingEntry {
    pub fn from_item(item: &Item) -> Self {
        Self {
            name: cell(item.get("name")),
            city: cell(item.get("city")),
            state: cell(item.get("state")),
            url: cell(item.get("url")),
            ranking: cell(nested(item, "ranking", "display_rank")),
            school_data: cell(nested(item, "schoolData", "c_avg_acad_rep_score")),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct DirectoryReport {
    pub entries: usize,
    pub failed_pages: Vec<u32>,
}

/// Fetch pages `1..=pages`, writing one row per entry
async fn walk_pages<W, R, F, Fut>(
    pages: u32,
    mut fetch: F,
    to_row: fn(&Item) -> R,
    sink: &mut CsvSink<W>,
) -> Result<DirectoryReport>
where
    W: Write,
    R: Serialize,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<Item>>>,
{
    let mut report = DirectoryReport::default();

    for page in 1..=pages {
        match fetch(page).await {
            Ok(items) => {
                for item in &items {
                    sink.write(&to_row(item))?;
                }
                report.entries += items.len();
                info!(page, entries = items.len(), "Page processed");
            },
            Err(e) => {
                warn!(page, error = %e, "Page failed, skipping");
                report.failed_pages.push(page);
            },
        }
    }

    sink.flush()?;
    info!(
        entries = report.entries,
        failed_pages = report.failed_pages.len(),
        "Collection complete"
    );
    Ok(report)
}

/// Collect the university directory into `sink`
pub async fn collect_directory<W: Write>(
    client: &UpstreamClient,
    pages: u32,
    page_size: u32,
    sink: &mut CsvSink<W>,
) -> Result<DirectoryReport> {
    walk_pages(
        pages,
        |page| client.fetch_directory_page(page, page_size),
        DirectoryEntry::from_item,
        sink,
    )
    .await
}

/// Collect the ranked program list into `sink`
pub async fn collect_rankings<W: Write>(
    client: &UpstreamClient,
    pages: u32,
    sink: &mut CsvSink<W>,
) -> Result<DirectoryReport> {
    walk_pages(
        pages,
        |page| client.fetch_rankings_page(page),
        RankingEntry::from_item,
        sink,
    )
    .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::IngestError;
    use serde_json::json;

    #[test]
    fn test_entry_from_item() {
        let item = json!({"university_id": 1234, "university_name": "Purdue University", "rank": 3});
        let entry = DirectoryEntry::from_item(item.as_object().unwrap());
        assert_eq!(entry.university_id, "1234");
        assert_eq!(entry.university_name, "Purdue University");

        let sparse = DirectoryEntry::from_item(json!({"university_id": null}).as_object().unwrap());
        assert_eq!(sparse.university_id, "");
        assert_eq!(sparse.university_name, "");
    }

    #[test]
    fn test_ranking_entry_reads_nested_fields() {
        let item = json!({
            "name": "Carnegie Mellon University",
            "city": "Pittsburgh",
            "state": "PA",
            "url": "/carnegie-mellon",
            "ranking": {"display_rank": "#1"},
            "schoolData": {"c_avg_acad_rep_score": 5.0}
        });
        let entry = RankingEntry::from_item(item.as_object().unwrap());
        assert_eq!(entry.ranking, "#1");
        assert_eq!(entry.school_data, "5.0");

        let unranked = json!({"name": "X", "ranking": null, "schoolData": {}});
        let entry = RankingEntry::from_item(unranked.as_object().unwrap());
        assert_eq!(entry.name, "X");
        assert_eq!(entry.ranking, "");
        assert_eq!(entry.school_data, "");
    }

    #[tokio::test]
    async fn test_walk_pages_skips_failed_pages() {
        let mut sink = CsvSink::from_writer(Vec::new(), &DIRECTORY_HEADER).unwrap();

        let report = walk_pages(
            3,
            |page| async move {
                match page {
                    2 => Err(IngestError::transient("503")),
                    n => Ok(vec![json!({"university_id": n, "university_name": "U"})
                        .as_object()
                        .unwrap()
                        .clone()]),
                }
            },
            DirectoryEntry::from_item,
            &mut sink,
        )
        .await
        .unwrap();

        assert_eq!(report.entries, 2);
        assert_eq!(report.failed_pages, vec![2]);
        let written = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        assert_eq!(written, "university_id,university_name\n1,U\n3,U\n");
    }
}
