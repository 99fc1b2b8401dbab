use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::errors::AppError;
use crate::models::cards::CardKind;
use crate::store::{paths, DocumentStore};

/// The stored card, or the kind's empty record if it was never saved.
pub async fn get_card(
    store: &dyn DocumentStore,
    user_id: &str,
    kind: CardKind,
) -> Result<Value, AppError> {
    match store.get(&paths::card(user_id, kind.doc_id())?).await? {
        Some(stored) => normalize(kind, stored),
        None => {
            debug!("Card {kind} not saved for {user_id}; returning defaults");
            Ok(kind.empty())
        }
    }
}

/// Overwrites the card with `data` passed through its schema.
pub async fn save_card(
    store: &dyn DocumentStore,
    user_id: &str,
    kind: CardKind,
    data: Value,
) -> Result<(), AppError> {
    let card = normalize(kind, data)?;
    store.set(&paths::card(user_id, kind.doc_id())?, card).await?;
    info!("Saved card {kind} for {user_id}");
    Ok(())
}

/// Every saved card keyed by its id, with defaults filled in like
/// `get_card`. `NotFound` if the user saved none.
pub async fn get_profile(
    store: &dyn DocumentStore,
    user_id: &str,
) -> Result<BTreeMap<String, Value>, AppError> {
    let docs = store.list(&paths::profile_collection(user_id)?).await?;
    let mut profile = BTreeMap::new();
    for (id, doc) in docs {
        // Other documents share the collection, e.g. the analysis report.
        let Ok(kind) = id.parse::<CardKind>() else {
            continue;
        };
        profile.insert(id, normalize(kind, doc)?);
    }

    if profile.is_empty() {
        return Err(AppError::NotFound(format!(
            "No profile data found for user '{user_id}'"
        )));
    }
    Ok(profile)
}

/// Merges each named card into what is stored. All names and bodies are
/// checked before anything is written.
pub async fn update_profile(
    store: &dyn DocumentStore,
    user_id: &str,
    cards: Map<String, Value>,
) -> Result<Vec<CardKind>, AppError> {
    if cards.is_empty() {
        return Err(AppError::Validation("No cards to update".into()));
    }

    let mut updates = Vec::with_capacity(cards.len());
    for (name, body) in cards {
        let kind = name
            .parse::<CardKind>()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        if !body.is_object() {
            return Err(AppError::Validation(format!("Card '{name}' must be an object")));
        }
        updates.push((kind, only_known_fields(kind, body)?));
    }

    for (kind, patch) in &updates {
        store
            .merge(&paths::card(user_id, kind.doc_id())?, patch.clone())
            .await?;
    }

    let updated: Vec<CardKind> = updates.into_iter().map(|(kind, _)| kind).collect();
    info!("Updated {} profile cards for {user_id}", updated.len());
    Ok(updated)
}

/// All seven cards for the analysis prompt. A card counts as present only
/// when it is a non-empty object.
pub async fn collect_cards(
    store: &dyn DocumentStore,
    user_id: &str,
) -> Result<BTreeMap<CardKind, Option<Value>>, AppError> {
    let mut cards = BTreeMap::new();
    for kind in CardKind::ALL {
        let doc = store
            .get(&paths::card(user_id, kind.doc_id())?)
            .await?
            .filter(|v| v.as_object().is_some_and(|o| !o.is_empty()));
        cards.insert(kind, doc);
    }
    Ok(cards)
}

fn normalize(kind: CardKind, raw: Value) -> Result<Value, AppError> {
    kind.normalize(raw)
        .map_err(|e| AppError::Validation(format!("Invalid {kind} card: {e}")))
}

/// A merge patch must not fill unsent fields with defaults. Keeps fields
/// sent under their schema name, plus any field an alias set to a non-empty
/// value. An alias sent with an empty value leaves the stored field alone.
fn only_known_fields(kind: CardKind, body: Value) -> Result<Value, AppError> {
    let sent: Vec<String> = body
        .as_object()
        .map(|o| o.keys().cloned().collect())
        .unwrap_or_default();
    let normalized = normalize(kind, body)?;
    let Value::Object(mut fields) = normalized else {
        return Ok(Value::Object(Map::new()));
    };

    let defaults = kind.empty();
    fields.retain(|key, value| {
        sent.iter().any(|s| s == key) || defaults.get(key.as_str()) != Some(value)
    });
    Ok(Value::Object(fields))
}
