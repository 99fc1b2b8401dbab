//! Runs one career analysis end to end.
//!
//! Flow: collect cards → prompt → completion (primary, then fallback model)
//!       → parse and check the report → store report and history entry
//!       → optional Markdown archive.
//!
//! Outcomes are reported in the `AnalysisResponse` envelope, not as HTTP
//! errors: a user with no cards or a failing model still gets a 200 with
//! `status: "error"`. Only storage failures turn into a 500.

use axum::http::StatusCode;
use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::analysis::archive::{render_report_markdown, ReportArchive};
use crate::analysis::prompts::{analysis_system, build_analysis_prompt};
use crate::errors::AppError;
use crate::llm_client::{
    complete_with_fallback, parse_json_response, CompletionBackend, LlmError, FALLBACK_MODEL,
    PRIMARY_MODEL,
};
use crate::models::analysis::{
    AnalysisReport, AnalysisResponse, AnalysisStatus, HistoryEntry, ProgressStep, StoredReport,
    REQUIRED_REPORT_KEYS,
};
use crate::profile::service::collect_cards;
use crate::store::{paths, DocumentStore, StoreError};

pub const STEP_COLLECTING: &str = "Collecting profile data...";
pub const STEP_ANALYSING: &str = "Running AI analysis...";
pub const STEP_SAVING: &str = "Saving analysis results...";
pub const STEP_DONE: &str = "Analysis complete!";

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("no profile data")]
    NoProfileData,

    #[error("completion failed: {0}")]
    Completion(LlmError),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for AnalysisError {
    fn from(err: StoreError) -> Self {
        AnalysisError::Storage(err.to_string())
    }
}

impl AnalysisError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AnalysisError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::OK,
        }
    }

    fn into_envelope(self, progress: Vec<ProgressStep>) -> AnalysisResponse {
        let (message, error, details) = match self {
            AnalysisError::NoProfileData => (
                "No profile data found for user",
                "Profile data missing".to_string(),
                None,
            ),
            AnalysisError::Completion(LlmError::AllModelsFailed { primary, fallback }) => (
                "Analysis failed",
                fallback,
                Some(format!(
                    "Tried {PRIMARY_MODEL} and {FALLBACK_MODEL}; {PRIMARY_MODEL} failed with: {primary}"
                )),
            ),
            AnalysisError::Completion(e) => ("Analysis failed", e.to_string(), None),
            AnalysisError::MalformedResponse(reason) => (
                "Analysis failed",
                "Model returned a malformed response".to_string(),
                Some(reason),
            ),
            AnalysisError::Storage(_) => (
                "An unexpected error occurred",
                "Failed to save analysis results".to_string(),
                Some("System error".to_string()),
            ),
        };

        AnalysisResponse {
            status: AnalysisStatus::Error,
            message: Some(message.to_string()),
            progress,
            data: None,
            error: Some(error),
            details,
        }
    }
}

/// Runs the analysis for `user_id` and returns the HTTP status together with
/// the response envelope.
pub async fn analyze_profile(
    store: &dyn DocumentStore,
    llm: &dyn CompletionBackend,
    archive: Option<&dyn ReportArchive>,
    user_id: &str,
) -> (StatusCode, AnalysisResponse) {
    let mut progress = Vec::new();
    match run_analysis(store, llm, archive, user_id, &mut progress).await {
        Ok(report) => (
            StatusCode::OK,
            AnalysisResponse {
                status: AnalysisStatus::Success,
                message: Some("Analysis completed successfully".to_string()),
                progress,
                data: Some(report),
                error: None,
                details: None,
            },
        ),
        Err(e) => {
            match &e {
                AnalysisError::Storage(msg) => error!("Analysis for {user_id} failed: {msg}"),
                other => warn!("Analysis for {user_id} did not complete: {other}"),
            }
            (e.status_code(), e.into_envelope(progress))
        }
    }
}

async fn run_analysis(
    store: &dyn DocumentStore,
    llm: &dyn CompletionBackend,
    archive: Option<&dyn ReportArchive>,
    user_id: &str,
    progress: &mut Vec<ProgressStep>,
) -> Result<Value, AnalysisError> {
    push_step(progress, 1, STEP_COLLECTING);
    let cards = collect_cards(store, user_id)
        .await
        .map_err(|e| AnalysisError::Storage(e.to_string()))?;
    if cards.values().all(Option::is_none) {
        return Err(AnalysisError::NoProfileData);
    }
    info!(
        "Analysing {} of {} cards for {user_id}",
        cards.values().filter(|c| c.is_some()).count(),
        cards.len()
    );

    push_step(progress, 2, STEP_ANALYSING);
    let prompt = build_analysis_prompt(&cards);
    let completion = complete_with_fallback(llm, &prompt, &analysis_system())
        .await
        .map_err(AnalysisError::Completion)?;
    let report = check_report(&completion.text)?;

    push_step(progress, 3, STEP_SAVING);
    persist_report(store, archive, user_id, &report, &completion.model).await?;

    push_step(progress, 4, STEP_DONE);
    info!("Analysis for {user_id} completed with {}", completion.model);
    Ok(report)
}

fn push_step(progress: &mut Vec<ProgressStep>, step: u8, message: &str) {
    progress.push(ProgressStep {
        step,
        message: message.to_string(),
    });
}

/// Parses the model output and checks it is an object with the required keys.
fn check_report(text: &str) -> Result<Value, AnalysisError> {
    let value =
        parse_json_response(text).map_err(|e| AnalysisError::MalformedResponse(e.to_string()))?;
    let Some(object) = value.as_object() else {
        return Err(AnalysisError::MalformedResponse(
            "report is not a JSON object".to_string(),
        ));
    };

    let missing: Vec<&str> = REQUIRED_REPORT_KEYS
        .into_iter()
        .filter(|key| !object.contains_key(*key))
        .collect();
    if !missing.is_empty() {
        return Err(AnalysisError::MalformedResponse(format!(
            "report is missing keys: {}",
            missing.join(", ")
        )));
    }
    Ok(value)
}

async fn persist_report(
    store: &dyn DocumentStore,
    archive: Option<&dyn ReportArchive>,
    user_id: &str,
    report: &Value,
    model: &str,
) -> Result<(), AnalysisError> {
    let generated_at = Utc::now();
    let stored = StoredReport {
        report: report.clone(),
        model: model.to_string(),
        generated_at,
    };
    store
        .merge(&paths::analysis_report(user_id)?, to_document(&stored)?)
        .await?;

    let entry_id = HistoryEntry::new_id(generated_at);
    let archive_key = match archive {
        Some(archive) => match serde_json::from_value::<AnalysisReport>(report.clone()) {
            Ok(view) => {
                let markdown = render_report_markdown(user_id, &view, model, generated_at);
                match archive.store(user_id, &entry_id, markdown).await {
                    Ok(key) => Some(key),
                    Err(e) => {
                        warn!("Archiving report {entry_id} for {user_id} failed: {e:#}");
                        None
                    }
                }
            }
            Err(e) => {
                warn!("Not archiving report {entry_id} for {user_id}, unexpected shape: {e}");
                None
            }
        },
        None => None,
    };

    let entry = HistoryEntry {
        id: entry_id.clone(),
        report: report.clone(),
        model: model.to_string(),
        generated_at,
        archive_key,
    };
    store
        .set(&paths::history_entry(user_id, &entry_id)?, to_document(&entry)?)
        .await?;
    Ok(())
}

fn to_document<T: serde::Serialize>(value: &T) -> Result<Value, AnalysisError> {
    serde_json::to_value(value).map_err(|e| AnalysisError::Storage(e.to_string()))
}

/// The latest stored report. `NotFound` if the user was never analysed.
pub async fn get_report(store: &dyn DocumentStore, user_id: &str) -> Result<StoredReport, AppError> {
    let doc = store
        .get(&paths::analysis_report(user_id)?)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No analysis report for user '{user_id}'")))?;
    serde_json::from_value(doc)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("stored report is unreadable: {e}")))
}

/// Every past report, oldest first.
pub async fn history(store: &dyn DocumentStore, user_id: &str) -> Result<Vec<HistoryEntry>, AppError> {
    let docs = store.list(&paths::history_collection(user_id)?).await?;
    let mut entries = Vec::with_capacity(docs.len());
    for (id, doc) in docs {
        match serde_json::from_value::<HistoryEntry>(doc) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!("Skipping unreadable history entry {id} for {user_id}: {e}"),
        }
    }
    Ok(entries)
}
