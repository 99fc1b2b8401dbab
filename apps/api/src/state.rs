use std::sync::Arc;

use crate::analysis::archive::ReportArchive;
use crate::auth::Authenticator;
use crate::config::Config;
use crate::llm_client::CompletionBackend;
use crate::rate_limit::RateLimiter;
use crate::store::DocumentStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub llm: Arc<dyn CompletionBackend>,
    pub auth: Authenticator,
    /// Counters shared by every rate-limited route group.
    pub limiter: Arc<dyn RateLimiter>,
    /// Markdown report archive. `None` when no bucket is configured.
    pub archive: Option<Arc<dyn ReportArchive>>,
    pub config: Config,
}
