use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PulseError, Result};

pub const SCHEMA_VERSION: u32 = 1;

/// Sentinel for an author the platform could not resolve and for a contributor
/// missing from the affiliation table.
pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub id: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
}

impl CommitRecord {
    pub fn new(id: impl Into<String>, author: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            author: author.into(),
            timestamp,
        }
    }
}

/// Half-open date window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(PulseError::InvalidDate(format!(
                "Invalid range: start ({start}) is after end ({end})"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn start_datetime(&self) -> DateTime<Utc> {
        self.start.and_time(NaiveTime::MIN).and_utc()
    }

    pub fn end_datetime(&self) -> DateTime<Utc> {
        self.end.and_time(NaiveTime::MIN).and_utc()
    }

    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        *timestamp >= self.start_datetime() && *timestamp < self.end_datetime()
    }
}

pub fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|e| PulseError::InvalidDate(format!("'{input}' is not YYYY-MM-DD: {e}")))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMetrics {
    pub total_commits: usize,
    pub total_contributors: usize,
    pub total_contributor_affiliations: usize,
    pub top_half_contributor_count: usize,
    pub top_half_contributor_affiliations: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProjectOutcome {
    Metrics(ProjectMetrics),
    Error { error: String },
}

impl ProjectOutcome {
    pub fn error(message: impl Into<String>) -> Self {
        ProjectOutcome::Error {
            error: message.into(),
        }
    }

    pub fn metrics(&self) -> Option<&ProjectMetrics> {
        match self {
            ProjectOutcome::Metrics(m) => Some(m),
            ProjectOutcome::Error { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectReport {
    pub name: String,
    #[serde(flatten)]
    pub outcome: ProjectOutcome,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top_contributors: Vec<String>,
}

impl ProjectReport {
    pub fn new(name: impl Into<String>, outcome: ProjectOutcome) -> Self {
        Self {
            name: name.into(),
            outcome,
            top_contributors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsOutput {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub platform: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub projects: Vec<ProjectReport>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn window_is_half_open() {
        let window = DateWindow::parse("2024-01-01", "2024-02-01").unwrap();
        let first = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let last = Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        assert!(window.contains(&first));
        assert!(window.contains(&last));
        assert!(!window.contains(&end));
    }

    #[test]
    fn window_rejects_reversed_dates() {
        assert!(matches!(
            DateWindow::parse("2024-03-01", "2024-02-01"),
            Err(PulseError::InvalidDate(_))
        ));
    }

    #[test]
    fn parse_date_rejects_other_formats() {
        assert!(parse_date("01/02/2024").is_err());
        assert!(parse_date("2024-13-01").is_err());
        assert_eq!(
            parse_date(" 2024-02-29 ").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
    }

    #[test]
    fn error_outcome_serializes_as_error_object() {
        let report = ProjectReport::new("releng", ProjectOutcome::error("Failed to fetch commits"));
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["name"], "releng");
        assert_eq!(v["error"], "Failed to fetch commits");
        assert!(v.get("total_commits").is_none());
    }

    #[test]
    fn metrics_outcome_serializes_flat() {
        let report = ProjectReport::new(
            "functest",
            ProjectOutcome::Metrics(ProjectMetrics {
                total_commits: 4,
                total_contributors: 2,
                total_contributor_affiliations: 1,
                top_half_contributor_count: 1,
                top_half_contributor_affiliations: 1,
            }),
        );
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["total_commits"], 4);
        assert_eq!(v["top_half_contributor_count"], 1);
        assert!(v.get("error").is_none());
    }
}
