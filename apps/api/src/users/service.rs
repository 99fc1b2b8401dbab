use chrono::Utc;
use serde_json::Value;
use tracing::info;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::{AuthError, Authenticator, IssuedToken};
use crate::errors::AppError;
use crate::models::user::{RegisterRequest, UserData};
use crate::store::{paths, DocPath, DocumentStore};

/// Stored beside the user fields; never returned to clients.
const PASSWORD_HASH_FIELD: &str = "password_hash";
const UPDATED_AT_FIELD: &str = "updated_at";
const MIN_PASSWORD_LEN: usize = 8;

/// Creates the user document. Fails with `Conflict` if the uid is taken.
pub async fn register(store: &dyn DocumentStore, req: RegisterRequest) -> Result<UserData, AppError> {
    let RegisterRequest { mut user, password } = req;
    user.validate().map_err(AppError::Validation)?;
    let path = paths::user(&user.uid)?;

    if store.get(&path).await?.is_some() {
        return Err(AppError::Conflict(format!("User '{}' already exists", user.uid)));
    }

    let password_hash = match password {
        Some(password) if password.chars().count() < MIN_PASSWORD_LEN => {
            return Err(AppError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )))
        }
        Some(password) => Some(hash_password(password).await?),
        None => None,
    };

    let now = Utc::now().to_rfc3339();
    if user.created_at.is_none() {
        user.created_at = Some(now.clone());
    }

    let mut doc = user_document(&user)?;
    if let Some(hash) = password_hash {
        doc.insert(PASSWORD_HASH_FIELD.into(), Value::String(hash));
    }
    doc.insert(UPDATED_AT_FIELD.into(), Value::String(now));
    store.set(&path, Value::Object(doc)).await?;

    info!("Registered user {}", user.uid);
    Ok(user)
}

/// Exchanges a uid and password for an access token.
pub async fn login_with_password(
    store: &dyn DocumentStore,
    auth: &Authenticator,
    uid: &str,
    password: &str,
) -> Result<IssuedToken, AppError> {
    let path = paths::user(uid).map_err(|_| AuthError::InvalidCredentials)?;
    let doc = store.get(&path).await?.ok_or(AuthError::InvalidCredentials)?;
    let hash = doc
        .get(PASSWORD_HASH_FIELD)
        .and_then(Value::as_str)
        .ok_or(AuthError::InvalidCredentials)?;

    if !verify_password(password.to_string(), hash.to_string()).await? {
        return Err(AuthError::InvalidCredentials.into());
    }

    info!("User {uid} signed in with password");
    Ok(auth.issuer().issue(uid)?)
}

/// Exchanges a Firebase ID token of a registered user for an access token.
pub async fn login_with_federated(
    store: &dyn DocumentStore,
    auth: &Authenticator,
    id_token: &str,
) -> Result<IssuedToken, AppError> {
    let identity = auth.verify_federated(id_token).await?;
    let path = paths::user(&identity.uid).map_err(|_| AuthError::UnknownUser)?;
    if store.get(&path).await?.is_none() {
        return Err(AuthError::UnknownUser.into());
    }

    info!(
        "User {} signed in with Firebase ({})",
        identity.uid,
        identity.email.as_deref().unwrap_or("no email")
    );
    Ok(auth.issuer().issue(&identity.uid)?)
}

pub async fn get_user(store: &dyn DocumentStore, uid: &str) -> Result<UserData, AppError> {
    let doc = store
        .get(&paths::user(uid)?)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User '{uid}' not found")))?;
    parse_user(doc)
}

/// Full replace of the user record. The uid always comes from the path, and
/// the password hash and creation time carry over.
pub async fn replace_user(
    store: &dyn DocumentStore,
    uid: &str,
    mut user: UserData,
) -> Result<UserData, AppError> {
    let path = paths::user(uid)?;
    let existing = store
        .get(&path)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User '{uid}' not found")))?;

    user.uid = uid.to_string();
    user.validate().map_err(AppError::Validation)?;
    if user.created_at.is_none() {
        user.created_at = existing
            .get("createdAt")
            .and_then(Value::as_str)
            .map(String::from);
    }

    let mut doc = user_document(&user)?;
    if let Some(hash) = existing.get(PASSWORD_HASH_FIELD) {
        doc.insert(PASSWORD_HASH_FIELD.into(), hash.clone());
    }
    doc.insert(UPDATED_AT_FIELD.into(), Value::String(Utc::now().to_rfc3339()));
    store.set(&path, Value::Object(doc)).await?;

    info!("Replaced user {uid}");
    Ok(user)
}

/// Deletes the user together with cards, report and history.
pub async fn delete_user(store: &dyn DocumentStore, uid: &str) -> Result<(), AppError> {
    let path = paths::user(uid)?;
    if store.get(&path).await?.is_none() {
        return Err(AppError::NotFound(format!("User '{uid}' not found")));
    }

    let mut removed = 0usize;
    for collection in [paths::profile_collection(uid)?, paths::history_collection(uid)?] {
        for (id, _) in store.list(&collection).await? {
            store.delete(&DocPath::new(collection.as_str(), id)?).await?;
            removed += 1;
        }
    }
    store.delete(&path).await?;

    info!("Deleted user {uid} and {removed} owned documents");
    Ok(())
}

fn user_document(user: &UserData) -> Result<serde_json::Map<String, Value>, AppError> {
    match serde_json::to_value(user).map_err(anyhow::Error::from)? {
        Value::Object(map) => Ok(map),
        _ => Err(AppError::Internal(anyhow::anyhow!("user did not serialize to an object"))),
    }
}

fn parse_user(doc: Value) -> Result<UserData, AppError> {
    serde_json::from_value(doc)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("stored user is unreadable: {e}")))
}
