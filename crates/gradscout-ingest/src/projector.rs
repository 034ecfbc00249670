//! Flattening of detail records into output rows
//!
//! Every field of an [`OutputRow`] is always present: missing scalars become
//! [`NOT_AVAILABLE`], list fields are joined and nested structures are stored
//! as compact JSON strings.

use crate::types::{DetailRecord, FetchTask, Item, Page};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Placeholder for missing values
pub const NOT_AVAILABLE: &str = "Not Available";

/// Column order of the profiles output
pub const HEADER: [&str; 14] = [
    "student_id",
    "university_id",
    "university_name",
    "username",
    "ielts_score",
    "gre_score",
    "toefl_score",
    "technical_papers_count",
    "work_experience",
    "total_work_experience_in_months",
    "bachelors_college",
    "bachelors_course",
    "course_preferences",
    "ranks_and_metadata",
];

/// Column order of the applications output
pub const APPLICATION_HEADER: [&str; 3] = ["student_id", "university_id", "university_name"];

const SECONDS_PER_DAY: i64 = 86_400;
const DAYS_PER_MONTH: i64 = 30;

static NULL: Value = Value::Null;

/// One row of the profiles output; field order matches [`HEADER`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRow {
    pub student_id: String,
    pub university_id: String,
    pub university_name: String,
    pub username: String,
    pub ielts_score: String,
    pub gre_score: String,
    pub toefl_score: String,
    pub technical_papers_count: String,
    pub work_experience: String,
    pub total_work_experience_in_months: String,
    pub bachelors_college: String,
    pub bachelors_course: String,
    pub course_preferences: String,
    pub ranks_and_metadata: String,
}

/// One row of the applications output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationRow {
    pub student_id: String,
    pub university_id: String,
    pub university_name: String,
}

impl ApplicationRow {
    /// One row per application of every item on the page
    pub fn from_page(page: &Page) -> Vec<ApplicationRow> {
        page.items
            .iter()
            .flat_map(|item| object_list(item, "university_applications"))
            .map(|application| ApplicationRow {
                student_id: scalar(application.get("student_id")),
                university_id: scalar(application.get("university_id")),
                university_name: page.subject.name.clone(),
            })
            .collect()
    }
}

#[derive(Serialize)]
struct WorkPeriod<'a> {
    from_date: &'a Value,
    to_date: &'a Value,
}

#[derive(Serialize)]
struct RanksAndMetadata<'a> {
    status_rank: &'a Value,
    intake_rank: &'a Value,
    testimonial_rank: &'a Value,
    term: &'a Value,
    year: &'a Value,
    level: &'a Value,
    user_stage: &'a Value,
    created_at: &'a Value,
    updated_at: &'a Value,
    total_profile: &'a Item,
}

/// Maps (detail, task) pairs to [`OutputRow`]s
///
/// Open-ended work periods are measured against the reference time fixed at
/// construction, so projecting the same input twice gives the same row.
#[derive(Debug, Clone, Copy)]
pub struct RecordProjector {
    now: NaiveDateTime,
}

impl Default for RecordProjector {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordProjector {
    pub fn new() -> Self {
        Self::at(Utc::now().naive_utc())
    }

    /// Projector with an explicit reference time
    pub fn at(now: NaiveDateTime) -> Self {
        Self { now }
    }

    pub fn project(&self, detail: &DetailRecord, task: &FetchTask) -> OutputRow {
        let (ielts_score, gre_score, toefl_score) = test_scores(detail);
        let (bachelors_college, bachelors_course) = bachelors(detail);

        let work = object_list(detail, "work_experiences");
        let periods: Vec<WorkPeriod<'_>> = work
            .iter()
            .map(|w| WorkPeriod {
                from_date: w.get("from_date").unwrap_or(&NULL),
                to_date: w.get("to_date").unwrap_or(&NULL),
            })
            .collect();
        let total_months: i64 = periods
            .iter()
            .filter_map(|p| self.months_between(p.from_date, p.to_date))
            .sum();

        let preferences = object_list(detail, "course_preferences");
        let course_preferences = if preferences.is_empty() {
            NOT_AVAILABLE.to_string()
        } else {
            preferences
                .iter()
                .map(|c| scalar(c.get("name")))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let metadata = RanksAndMetadata {
            status_rank: field(detail, "status_rank"),
            intake_rank: field(detail, "intake_rank"),
            testimonial_rank: field(detail, "testimonial_rank"),
            term: field(detail, "term"),
            year: field(detail, "year"),
            level: field(detail, "level"),
            user_stage: field(detail, "user_stage"),
            created_at: field(detail, "created_at"),
            updated_at: field(detail, "updated_at"),
            total_profile: &task.item,
        };

        OutputRow {
            student_id: scalar(task.application.get("student_id")),
            university_id: scalar(task.application.get("university_id")),
            university_name: task.subject.name.clone(),
            username: scalar(task.item.get("username")),
            ielts_score,
            gre_score,
            toefl_score,
            technical_papers_count: list_len(detail, "technical_papers").to_string(),
            work_experience: to_json(&periods),
            total_work_experience_in_months: total_months.to_string(),
            bachelors_college,
            bachelors_course,
            course_preferences,
            ranks_and_metadata: to_json(&metadata),
        }
    }

    /// Whole months between two timestamps as `floor(days) / 30`
    ///
    /// A missing or unreadable start yields `None`; a missing end means now.
    pub fn months_between(&self, from: &Value, to: &Value) -> Option<i64> {
        let start = from.as_str().and_then(parse_timestamp)?;
        let end = match to {
            Value::Null => self.now,
            Value::String(s) if s.trim().is_empty() => self.now,
            other => other.as_str().and_then(parse_timestamp)?,
        };
        let days = (end - start).num_seconds().div_euclid(SECONDS_PER_DAY);
        Some(days.div_euclid(DAYS_PER_MONTH))
    }
}

/// Parse the timestamp shapes seen upstream, normalised to UTC
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    let naive = raw.trim_end_matches('Z');
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Render a JSON value as a flat cell
fn scalar(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => NOT_AVAILABLE.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn object_list<'a>(record: &'a Map<String, Value>, key: &str) -> Vec<&'a Map<String, Value>> {
    record
        .get(key)
        .and_then(Value::as_array)
        .map(|values| values.iter().filter_map(Value::as_object).collect())
        .unwrap_or_default()
}

fn field<'a>(record: &'a Map<String, Value>, key: &str) -> &'a Value {
    record.get(key).unwrap_or(&NULL)
}

fn list_len(record: &Map<String, Value>, key: &str) -> usize {
    record.get(key).and_then(Value::as_array).map_or(0, Vec::len)
}

/// IELTS, GRE and TOEFL composites; a later entry for the same test wins
fn test_scores(detail: &DetailRecord) -> (String, String, String) {
    let mut ielts = None;
    let mut gre = None;
    let mut toefl = None;

    for score in object_list(detail, "user_test_scores") {
        let composite = Some(scalar(score.get("composite")));
        match score.get("name").and_then(Value::as_str) {
            Some("IELTS") => ielts = composite,
            Some("GRE") => gre = composite,
            Some("TOEFL") => toefl = composite,
            _ => {},
        }
    }

    let or_missing = |s: Option<String>| s.unwrap_or_else(|| NOT_AVAILABLE.to_string());
    (or_missing(ielts), or_missing(gre), or_missing(toefl))
}

/// Institute and course of the last education entry that names them
fn bachelors(detail: &DetailRecord) -> (String, String) {
    let mut college = NOT_AVAILABLE.to_string();
    let mut course = NOT_AVAILABLE.to_string();

    for education in object_list(detail, "user_education") {
        if let Some(institute) = non_empty_object(education.get("institutes")) {
            college = scalar(institute.get("name"));
        }
        if let Some(c) = non_empty_object(education.get("course")) {
            course = scalar(c.get("name"));
        }
    }

    (college, course)
}

fn non_empty_object(value: Option<&Value>) -> Option<&Map<String, Value>> {
    value.and_then(Value::as_object).filter(|o| !o.is_empty())
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| NOT_AVAILABLE.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::Subject;
    use serde_json::json;
    use std::sync::Arc;

    fn reference_time() -> NaiveDateTime {
        parse_timestamp("2025-01-31T00:00:00Z").unwrap()
    }

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    fn task(item: Value, application: Value) -> FetchTask {
        FetchTask {
            item: Arc::new(object(item)),
            application: object(application),
            subject: Arc::new(Subject::new(5, "Stanford University")),
            detail_key: "ana".to_string(),
        }
    }

    fn full_detail() -> DetailRecord {
        object(json!({
            "username": "ana",
            "user_test_scores": [
                {"name": "GRE", "composite": 320},
                {"name": "TOEFL", "composite": "110"},
                {"name": "GMAT", "composite": 700}
            ],
            "technical_papers": [{"title": "a"}, {"title": "b"}],
            "work_experiences": [
                {"from_date": "2024-01-01T00:00:00.000Z", "to_date": "2024-04-01T00:00:00.000Z"},
                {"from_date": null, "to_date": "2023-01-01T00:00:00.000Z"},
                {"from_date": "2024-12-01T00:00:00Z"}
            ],
            "user_education": [
                {"institutes": {"name": "School"}, "course": {"name": "High School"}},
                {"institutes": {"name": "IIT Bombay"}, "course": {"name": "B.Tech CSE"}},
                {"institutes": {}, "course": null}
            ],
            "course_preferences": [{"name": "MS CS"}, {"name": "MS DS"}],
            "status_rank": 1,
            "term": "Fall",
            "year": 2025
        }))
    }

    #[test]
    fn test_duration_is_floor_days_over_thirty() {
        let projector = RecordProjector::at(reference_time());
        let months = projector.months_between(&json!("2024-01-01"), &json!("2024-04-01"));
        assert_eq!(months, Some(3));
    }

    #[test]
    fn test_missing_start_contributes_nothing() {
        let projector = RecordProjector::at(reference_time());
        assert_eq!(projector.months_between(&Value::Null, &json!("2024-04-01")), None);
        assert_eq!(projector.months_between(&json!("soon"), &json!("2024-04-01")), None);
    }

    #[test]
    fn test_missing_end_uses_reference_time() {
        let projector = RecordProjector::at(reference_time());
        // 61 days
        assert_eq!(projector.months_between(&json!("2024-12-01"), &Value::Null), Some(2));
    }

    #[test]
    fn test_projects_full_record() {
        let projector = RecordProjector::at(reference_time());
        let task = task(
            json!({"username": "ana", "university_applications": [{"student_id": 77}]}),
            json!({"student_id": 77, "university_id": 5}),
        );

        let row = projector.project(&full_detail(), &task);

        assert_eq!(row.student_id, "77");
        assert_eq!(row.university_id, "5");
        assert_eq!(row.university_name, "Stanford University");
        assert_eq!(row.username, "ana");
        assert_eq!(row.ielts_score, NOT_AVAILABLE);
        assert_eq!(row.gre_score, "320");
        assert_eq!(row.toefl_score, "110");
        assert_eq!(row.technical_papers_count, "2");
        // 3 + 0 (no start) + 2
        assert_eq!(row.total_work_experience_in_months, "5");
        assert_eq!(row.bachelors_college, "IIT Bombay");
        assert_eq!(row.bachelors_course, "B.Tech CSE");
        assert_eq!(row.course_preferences, "MS CS, MS DS");

        let work: Value = serde_json::from_str(&row.work_experience).unwrap();
        assert_eq!(work.as_array().unwrap().len(), 3);
        assert_eq!(work[1], json!({"from_date": null, "to_date": "2023-01-01T00:00:00.000Z"}));
        assert_eq!(work[2]["to_date"], Value::Null);
    }

    #[test]
    fn test_ranks_and_metadata_field_order() {
        let projector = RecordProjector::at(reference_time());
        let task = task(json!({"username": "ana"}), json!({"student_id": 1}));

        let row = projector.project(&full_detail(), &task);

        assert!(row.ranks_and_metadata.starts_with(
            r#"{"status_rank":1,"intake_rank":null,"testimonial_rank":null,"term":"Fall","year":2025,"#
        ));
        assert!(row
            .ranks_and_metadata
            .ends_with(r#""total_profile":{"username":"ana"}}"#));
    }

    #[test]
    fn test_total_profile_keeps_upstream_key_order() {
        let projector = RecordProjector::at(reference_time());
        let item: Item = serde_json::from_str(
            r#"{"username":"ana","zeta":1,"alpha":2,"university_applications":[]}"#,
        )
        .unwrap();
        let task = task(Value::Object(item), json!({"student_id": 1}));

        let row = projector.project(&full_detail(), &task);

        assert!(row.ranks_and_metadata.ends_with(
            r#""total_profile":{"username":"ana","zeta":1,"alpha":2,"university_applications":[]}}"#
        ));
    }

    #[test]
    fn test_empty_detail_fills_sentinels() {
        let projector = RecordProjector::at(reference_time());
        let task = task(json!({}), json!({}));

        let row = projector.project(&DetailRecord::new(), &task);

        assert_eq!(row.student_id, NOT_AVAILABLE);
        assert_eq!(row.username, NOT_AVAILABLE);
        assert_eq!(row.gre_score, NOT_AVAILABLE);
        assert_eq!(row.technical_papers_count, "0");
        assert_eq!(row.work_experience, "[]");
        assert_eq!(row.total_work_experience_in_months, "0");
        assert_eq!(row.bachelors_college, NOT_AVAILABLE);
        assert_eq!(row.course_preferences, NOT_AVAILABLE);
    }

    #[test]
    fn test_projection_is_idempotent() {
        let projector = RecordProjector::new();
        let task = task(json!({"username": "ana"}), json!({"student_id": 9}));
        let detail = full_detail();

        assert_eq!(projector.project(&detail, &task), projector.project(&detail, &task));
    }

    #[test]
    fn test_application_rows_from_page() {
        let page = Page {
            subject: Arc::new(Subject::new(5, "X")),
            number: 0,
            items: vec![
                object(json!({"university_applications": [
                    {"student_id": 1, "university_id": 5},
                    {"student_id": 2, "university_id": 5}
                ]})),
                object(json!({"username": "no-apps"})),
            ],
        };

        let rows = ApplicationRow::from_page(&page);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].student_id, "2");
        assert_eq!(rows[1].university_name, "X");
    }

    #[test]
    fn test_parse_timestamp_shapes() {
        assert!(parse_timestamp("2024-01-01T10:00:00.000Z").is_some());
        assert!(parse_timestamp("2024-01-01T10:00:00+05:30").is_some());
        assert!(parse_timestamp("2024-01-01T10:00:00").is_some());
        assert!(parse_timestamp("2024-01-01").is_some());
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("last spring").is_none());
    }
}
