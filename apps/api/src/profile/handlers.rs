use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Map, Value};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::cards::CardKind;
use crate::profile::service;
use crate::state::AppState;

fn card_kind(card: &str) -> Result<CardKind, AppError> {
    card.parse::<CardKind>()
        .map_err(|e| AppError::NotFound(e.to_string()))
}

/// GET /profile/:user_id
pub async fn handle_get_profile(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<BTreeMap<String, Value>>, AppError> {
    caller.ensure_owner(&user_id)?;
    Ok(Json(service::get_profile(state.store.as_ref(), &user_id).await?))
}

/// PUT /profile/:user_id
pub async fn handle_update_profile(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(user_id): Path<String>,
    Json(cards): Json<Map<String, Value>>,
) -> Result<Json<Value>, AppError> {
    caller.ensure_owner(&user_id)?;
    let updated = service::update_profile(state.store.as_ref(), &user_id, cards).await?;
    Ok(Json(json!({
        "status": "success",
        "updated": updated.iter().map(|kind| kind.doc_id()).collect::<Vec<_>>()
    })))
}

/// GET /profile/:user_id/:card
pub async fn handle_get_card(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path((user_id, card)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    caller.ensure_owner(&user_id)?;
    let kind = card_kind(&card)?;
    Ok(Json(service::get_card(state.store.as_ref(), &user_id, kind).await?))
}

/// POST /profile/:user_id/:card
pub async fn handle_save_card(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path((user_id, card)): Path<(String, String)>,
    Json(data): Json<Value>,
) -> Result<Json<Value>, AppError> {
    caller.ensure_owner(&user_id)?;
    let kind = card_kind(&card)?;
    service::save_card(state.store.as_ref(), &user_id, kind, data).await?;
    Ok(Json(json!({ "status": "success" })))
}
