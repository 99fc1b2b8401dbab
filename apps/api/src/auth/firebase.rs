//! Firebase ID token verification.
//!
//! Tokens are RS256 JWTs signed by Google. Keys come from the secure-token
//! JWKS and are cached for an hour. Checked claims:
//! - `iss` = `https://securetoken.google.com/{project}`
//! - `aud` = `{project}`
//! - `exp` in the future, `sub` non-empty

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{
    decode, decode_header, errors::ErrorKind, jwk::JwkSet, Algorithm, DecodingKey, Header,
    Validation,
};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use super::{AuthError, FederatedIdentity, IdentityVerifier};

const GOOGLE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
const ISSUER_PREFIX: &str = "https://securetoken.google.com/";
const JWKS_CACHE_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Deserialize)]
struct FirebaseClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
}

struct JwksCache {
    jwks: JwkSet,
    fetched_at: Instant,
}

impl JwksCache {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() > ttl
    }
}

pub struct FirebaseTokenVerifier {
    project_id: String,
    jwks_url: String,
    http_client: reqwest::Client,
    cache: Arc<RwLock<Option<JwksCache>>>,
}

impl FirebaseTokenVerifier {
    /// Keys are fetched lazily on the first verification.
    pub fn new(project_id: impl Into<String>) -> Result<Self, AuthError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AuthError::ServiceUnavailable(e.to_string()))?;

        Ok(Self {
            project_id: project_id.into(),
            jwks_url: GOOGLE_JWKS_URL.to_string(),
            http_client,
            cache: Arc::new(RwLock::new(None)),
        })
    }

    fn issuer(&self) -> String {
        format!("{ISSUER_PREFIX}{}", self.project_id)
    }

    async fn fetch_jwks(&self) -> Result<JwkSet, AuthError> {
        debug!("Fetching Firebase JWKS from {}", self.jwks_url);

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to fetch JWKS: {e}");
                AuthError::ServiceUnavailable(format!("Failed to fetch JWKS: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            error!("JWKS endpoint returned {status}");
            return Err(AuthError::ServiceUnavailable(format!(
                "JWKS endpoint returned {status}"
            )));
        }

        let jwks: JwkSet = response.json().await.map_err(|e| {
            error!("Failed to parse JWKS: {e}");
            AuthError::ServiceUnavailable(format!("Failed to parse JWKS: {e}"))
        })?;

        debug!("Fetched {} keys from JWKS", jwks.keys.len());
        Ok(jwks)
    }

    async fn get_jwks(&self) -> Result<JwkSet, AuthError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if !cached.is_expired(JWKS_CACHE_TTL) {
                    return Ok(cached.jwks.clone());
                }
            }
        }

        let jwks = self.fetch_jwks().await?;
        *self.cache.write().await = Some(JwksCache {
            jwks: jwks.clone(),
            fetched_at: Instant::now(),
        });
        Ok(jwks)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[self.issuer()]);
        validation.set_audience(&[&self.project_id]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation
    }
}

/// Looks up the JWK named by the token's `kid`.
fn find_decoding_key(header: &Header, jwks: &JwkSet) -> Result<DecodingKey, AuthError> {
    if header.alg != Algorithm::RS256 {
        return Err(AuthError::InvalidToken(format!(
            "unsupported algorithm {:?}",
            header.alg
        )));
    }
    let kid = header
        .kid
        .as_deref()
        .ok_or_else(|| AuthError::InvalidToken("missing 'kid' header".into()))?;
    let jwk = jwks.find(kid).ok_or_else(|| {
        warn!("No matching key found for kid: {kid}");
        AuthError::InvalidToken(format!("unknown key id '{kid}'"))
    })?;
    DecodingKey::from_jwk(jwk).map_err(|e| AuthError::InvalidToken(e.to_string()))
}

#[async_trait]
impl IdentityVerifier for FirebaseTokenVerifier {
    async fn verify(&self, token: &str) -> Result<FederatedIdentity, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        let jwks = self.get_jwks().await?;
        let key = find_decoding_key(&header, &jwks)?;

        let data = decode::<FirebaseClaims>(token, &key, &self.validation()).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::InvalidIssuer | ErrorKind::InvalidAudience => {
                    warn!("Firebase token for another project: {e}");
                    AuthError::InvalidToken(e.to_string())
                }
                _ => AuthError::InvalidToken(e.to_string()),
            }
        })?;

        let claims = data.claims;
        if claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidToken("empty subject".into()));
        }
        Ok(FederatedIdentity {
            uid: claims.sub,
            email: claims.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwks_with_kid(kid: &str) -> JwkSet {
        serde_json::from_value(serde_json::json!({
            "keys": [{
                "kty": "RSA",
                "alg": "RS256",
                "use": "sig",
                "kid": kid,
                "n": "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw",
                "e": "AQAB"
            }]
        }))
        .unwrap()
    }

    fn header(kid: Option<&str>) -> Header {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = kid.map(String::from);
        header
    }

    #[test]
    fn test_issuer_is_project_scoped() {
        let verifier = FirebaseTokenVerifier::new("skillcompass-dev").unwrap();
        assert_eq!(verifier.issuer(), "https://securetoken.google.com/skillcompass-dev");
    }

    #[test]
    fn test_find_key_by_kid() {
        let jwks = jwks_with_kid("k1");
        assert!(find_decoding_key(&header(Some("k1")), &jwks).is_ok());
        assert!(matches!(
            find_decoding_key(&header(Some("other")), &jwks),
            Err(AuthError::InvalidToken(_))
        ));
        assert!(matches!(
            find_decoding_key(&header(None), &jwks),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_non_rs256_header_rejected() {
        let jwks = jwks_with_kid("k1");
        let mut hs = Header::new(Algorithm::HS256);
        hs.kid = Some("k1".into());
        assert!(matches!(
            find_decoding_key(&hs, &jwks),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn test_fresh_cache_is_served_without_fetching() {
        let mut verifier = FirebaseTokenVerifier::new("p").unwrap();
        // Any fetch would fail against this address.
        verifier.jwks_url = "http://127.0.0.1:9/jwks".into();
        *verifier.cache.write().await = Some(JwksCache {
            jwks: jwks_with_kid("cached"),
            fetched_at: Instant::now(),
        });
        let jwks = verifier.get_jwks().await.unwrap();
        assert!(jwks.find("cached").is_some());
    }

    #[tokio::test]
    async fn test_unreachable_jwks_is_service_unavailable() {
        let mut verifier = FirebaseTokenVerifier::new("p").unwrap();
        verifier.jwks_url = "http://127.0.0.1:9/jwks".into();
        assert!(matches!(
            verifier.get_jwks().await,
            Err(AuthError::ServiceUnavailable(_))
        ));
    }
}
