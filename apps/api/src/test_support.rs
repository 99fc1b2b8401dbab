//! Fixtures shared by unit and router tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::auth::{Authenticator, LocalTokenIssuer};
use crate::config::{Config, StoreBackend};
use crate::llm_client::{CompletionBackend, LlmError};
use crate::rate_limit::InMemoryRateLimiter;
use crate::state::AppState;
use crate::store::MemoryDocumentStore;

pub const TEST_JWT_SECRET: &str = "test-secret-key";

/// Answers completions from a queue and records which models were asked.
/// An exhausted queue answers with `LlmError::EmptyContent`.
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    models: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn new(replies: Vec<Result<String, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            models: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())])
    }

    pub fn models(&self) -> Vec<String> {
        self.models.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedCompletion {
    async fn complete(&self, model: &str, _prompt: &str, _system: &str) -> Result<String, LlmError> {
        self.models.lock().unwrap().push(model.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyContent))
    }
}

pub fn test_config() -> Config {
    Config {
        store_backend: StoreBackend::Memory,
        redis_url: None,
        anthropic_api_key: "test-key".into(),
        jwt_secret_key: TEST_JWT_SECRET.into(),
        jwt_expire_minutes: 60,
        firebase_project_id: None,
        rate_limit_per_minute: 60,
        auth_rate_limit_per_minute: 5,
        trust_proxy_headers: false,
        cors_allowed_origins: Vec::new(),
        s3: None,
        port: 0,
        rust_log: "info".into(),
    }
}

/// In-memory state with no federated sign-in and no archive.
pub fn test_state(llm: Arc<dyn CompletionBackend>) -> AppState {
    let config = test_config();
    AppState {
        store: Arc::new(MemoryDocumentStore::new()),
        llm,
        auth: Authenticator::new(
            LocalTokenIssuer::new(&config.jwt_secret_key, config.jwt_expire_minutes),
            None,
        ),
        limiter: Arc::new(InMemoryRateLimiter::new()),
        archive: None,
        config,
    }
}
