use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Keys the model's JSON must carry for the report to be accepted.
pub const REQUIRED_REPORT_KEYS: [&str; 2] = ["summary", "categories"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressStep {
    pub step: u8,
    pub message: String,
}

/// Result envelope of `POST /analysis/{user_id}/analyze`, for both outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub status: AnalysisStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub progress: Vec<ProgressStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Success,
    Error,
}

/// Typed view of an accepted report. Parsing is lenient: the stored JSON is
/// always the model's object as returned, this view only feeds rendering.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalysisReport {
    pub summary: String,
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Category {
    pub name: String,
    pub description: String,
    pub strengths: Vec<String>,
    pub development_areas: Vec<String>,
    pub recommendations: Vec<String>,
    pub motivation: String,
    pub example: String,
    pub resources: Vec<String>,
}

/// Merged onto `users/{uid}/profile_data/analysis_report`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredReport {
    pub report: Value,
    pub model: String,
    pub generated_at: DateTime<Utc>,
}

/// One document in `users/{uid}/analysis_history`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub report: Value,
    pub model: String,
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_key: Option<String>,
}

impl HistoryEntry {
    /// Ids sort by time so the log reads oldest first even by id.
    pub fn new_id(at: DateTime<Utc>) -> String {
        format!(
            "{}-{}",
            at.format("%Y%m%dT%H%M%S%.6fZ"),
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        )
    }
}
