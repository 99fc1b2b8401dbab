//! Bearer-token authentication.
//!
//! Two token kinds are accepted on protected routes:
//!
//! ```text
//! HS256  locally issued access token  -> LocalTokenIssuer::verify
//! RS256  Firebase ID token            -> IdentityVerifier (Google JWKS)
//! ```
//!
//! Handlers take an [`AuthUser`] argument and call
//! [`AuthenticatedUser::ensure_owner`] against the `{user_id}` path segment.

pub mod firebase;
pub mod local;
pub mod password;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use jsonwebtoken::{decode_header, Algorithm};
use thiserror::Error;
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::state::AppState;

pub use firebase::FirebaseTokenVerifier;
pub use local::{IssuedToken, LocalTokenIssuer};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token expired")]
    TokenExpired,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user is not registered")]
    UnknownUser,

    #[error("federated sign-in is not configured")]
    FederatedDisabled,

    #[error("identity service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("token signing failed: {0}")]
    Signing(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthProvider {
    Local,
    Firebase,
}

/// Caller identity resolved from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub provider: AuthProvider,
}

impl AuthenticatedUser {
    /// Users may only touch their own documents.
    pub fn ensure_owner(&self, user_id: &str) -> Result<(), AppError> {
        if self.user_id == user_id {
            Ok(())
        } else {
            warn!(
                "User {} attempted to access resources of {}",
                self.user_id, user_id
            );
            Err(AppError::Forbidden)
        }
    }
}

/// Claims taken from a verified third-party ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedIdentity {
    pub uid: String,
    pub email: Option<String>,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<FederatedIdentity, AuthError>;
}

/// Dispatches a bearer token to the verifier matching its signing algorithm.
#[derive(Clone)]
pub struct Authenticator {
    local: LocalTokenIssuer,
    federated: Option<Arc<dyn IdentityVerifier>>,
}

impl Authenticator {
    pub fn new(local: LocalTokenIssuer, federated: Option<Arc<dyn IdentityVerifier>>) -> Self {
        Self { local, federated }
    }

    pub fn issuer(&self) -> &LocalTokenIssuer {
        &self.local
    }

    pub async fn verify_federated(&self, token: &str) -> Result<FederatedIdentity, AuthError> {
        let verifier = self.federated.as_ref().ok_or(AuthError::FederatedDisabled)?;
        verifier.verify(token).await
    }

    pub async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        if header.alg == Algorithm::HS256 {
            let user_id = self.local.verify(token)?;
            return Ok(AuthenticatedUser {
                user_id,
                provider: AuthProvider::Local,
            });
        }

        let identity = match self.verify_federated(token).await {
            Err(AuthError::FederatedDisabled) => {
                return Err(AuthError::InvalidToken(format!(
                    "{:?} tokens are not accepted",
                    header.alg
                )))
            }
            other => other?,
        };
        Ok(AuthenticatedUser {
            user_id: identity.uid,
            provider: AuthProvider::Firebase,
        })
    }
}

/// Pulls the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)
}

/// Extractor for routes that require a signed-in user.
#[derive(Debug, Clone)]
pub struct AuthUser(pub AuthenticatedUser);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let user = state.auth.authenticate(token).await.map_err(|e| {
            debug!("Rejected bearer token: {e}");
            e
        })?;
        debug!("Authenticated {} via {:?} token", user.user_id, user.provider);
        Ok(AuthUser(user))
    }
}
