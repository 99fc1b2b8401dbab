use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::analysis::orchestrator;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::analysis::{AnalysisResponse, HistoryEntry, StoredReport};
use crate::state::AppState;

/// POST /analysis/:user_id/analyze
pub async fn handle_analyze(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(user_id): Path<String>,
) -> Result<(StatusCode, Json<AnalysisResponse>), AppError> {
    caller.ensure_owner(&user_id)?;
    let (status, response) = orchestrator::analyze_profile(
        state.store.as_ref(),
        state.llm.as_ref(),
        state.archive.as_deref(),
        &user_id,
    )
    .await;
    Ok((status, Json(response)))
}

/// GET /analysis/:user_id/report
pub async fn handle_get_report(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<StoredReport>, AppError> {
    caller.ensure_owner(&user_id)?;
    Ok(Json(orchestrator::get_report(state.store.as_ref(), &user_id).await?))
}

/// GET /analysis/:user_id/history
pub async fn handle_history(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    caller.ensure_owner(&user_id)?;
    Ok(Json(orchestrator::history(state.store.as_ref(), &user_id).await?))
}
