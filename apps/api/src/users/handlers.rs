use axum::{
    extract::{Path, State},
    http::StatusCode,
    Form, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{AuthUser, IssuedToken};
use crate::errors::AppError;
use crate::models::user::{RegisterRequest, UserData};
use crate::state::AppState;
use crate::users::service;

/// OAuth2-style password form, or a Firebase ID token.
#[derive(Debug, Deserialize)]
pub struct TokenForm {
    pub username: Option<String>,
    pub password: Option<String>,
    pub firebase_token: Option<String>,
}

/// POST /users/auth/register
pub async fn handle_register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let user = service::register(state.store.as_ref(), req).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Registration successful",
            "uid": user.uid
        })),
    ))
}

/// POST /users/auth/token
pub async fn handle_token(
    State(state): State<AppState>,
    Form(form): Form<TokenForm>,
) -> Result<Json<IssuedToken>, AppError> {
    let store = state.store.as_ref();
    let token = match form {
        TokenForm {
            firebase_token: Some(id_token),
            ..
        } => service::login_with_federated(store, &state.auth, &id_token).await?,
        TokenForm {
            username: Some(username),
            password: Some(password),
            ..
        } => service::login_with_password(store, &state.auth, &username, &password).await?,
        _ => {
            return Err(AppError::Validation(
                "Provide either username and password, or firebase_token".into(),
            ))
        }
    };
    Ok(Json(token))
}

/// GET /users/:user_id
pub async fn handle_get_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<UserData>, AppError> {
    caller.ensure_owner(&user_id)?;
    Ok(Json(service::get_user(state.store.as_ref(), &user_id).await?))
}

/// PUT /users/:user_id
pub async fn handle_replace_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(user_id): Path<String>,
    Json(user): Json<UserData>,
) -> Result<Json<UserData>, AppError> {
    caller.ensure_owner(&user_id)?;
    Ok(Json(
        service::replace_user(state.store.as_ref(), &user_id, user).await?,
    ))
}

/// DELETE /users/:user_id
pub async fn handle_delete_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    caller.ensure_owner(&user_id)?;
    service::delete_user(state.store.as_ref(), &user_id).await?;
    Ok(Json(json!({ "message": "User deleted" })))
}
