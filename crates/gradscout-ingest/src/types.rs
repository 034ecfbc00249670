//! Core data types flowing through the pipeline

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Opaque JSON object returned by the listing endpoint (one student profile summary)
pub type Item = Map<String, Value>;

/// Opaque JSON object returned by the detail endpoint
pub type DetailRecord = Map<String, Value>;

/// An entity being enumerated, e.g. a university
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: i64,
    pub name: String,
}

impl Subject {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.id, self.name)
    }
}

/// One batch of listing results for a (subject, page-number) pair
#[derive(Debug, Clone)]
pub struct Page {
    pub subject: Arc<Subject>,
    pub number: u32,
    pub items: Vec<Item>,
}

impl Page {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// Unit of fan-out work: one application of one listed profile
#[derive(Debug, Clone)]
pub struct FetchTask {
    pub item: Arc<Item>,
    pub application: Map<String, Value>,
    pub subject: Arc<Subject>,
    /// Deduplication identity for the detail fetch
    pub detail_key: String,
}

impl FetchTask {
    /// Expand a page into tasks, one per application of each item
    ///
    /// Items without a usable `username` cannot be resolved and are skipped.
    pub fn from_page(page: &Page) -> Vec<FetchTask> {
        let mut tasks = Vec::new();

        for item in &page.items {
            let Some(username) = item
                .get("username")
                .and_then(Value::as_str)
                .filter(|u| !u.trim().is_empty())
            else {
                tracing::warn!(
                    subject_id = page.subject.id,
                    page = page.number,
                    "Skipping listed profile without username"
                );
                continue;
            };

            let item = Arc::new(item.clone());
            let applications = item
                .get("university_applications")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();

            for application in applications.iter().filter_map(Value::as_object) {
                tasks.push(FetchTask {
                    item: Arc::clone(&item),
                    application: application.clone(),
                    subject: Arc::clone(&page.subject),
                    detail_key: username.to_string(),
                });
            }
        }

        tasks
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(items: Value) -> Page {
        Page {
            subject: Arc::new(Subject::new(5, "X")),
            number: 0,
            items: serde_json::from_value(items).unwrap(),
        }
    }

    #[test]
    fn test_one_task_per_application() {
        let page = page(json!([
            {"username": "ana", "university_applications": [{"student_id": 1}, {"student_id": 2}]},
            {"username": "ben", "university_applications": [{"student_id": 3}]},
            {"username": "cy", "university_applications": []}
        ]));

        let tasks = FetchTask::from_page(&page);

        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0].detail_key, "ana");
        assert_eq!(tasks[1].detail_key, "ana");
        assert_eq!(tasks[2].detail_key, "ben");
        assert_eq!(tasks[2].application["student_id"], json!(3));
    }

    #[test]
    fn test_items_without_username_are_skipped() {
        let page = page(json!([
            {"university_applications": [{"student_id": 1}]},
            {"username": "  ", "university_applications": [{"student_id": 2}]}
        ]));

        assert!(FetchTask::from_page(&page).is_empty());
    }
}
