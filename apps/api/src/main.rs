mod analysis;
mod auth;
mod config;
mod db;
mod errors;
mod llm_client;
mod models;
mod profile;
mod rate_limit;
mod routes;
mod state;
mod store;
mod users;

#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use axum::http::HeaderValue;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
    LatencyUnit,
};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::archive::{ReportArchive, S3ReportArchive};
use crate::auth::{Authenticator, FirebaseTokenVerifier, IdentityVerifier, LocalTokenIssuer};
use crate::config::{Config, S3Config, StoreBackend};
use crate::db::{create_pool, ensure_schema};
use crate::llm_client::LlmClient;
use crate::rate_limit::{InMemoryRateLimiter, RateLimiter, RedisRateLimiter};
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{DocumentStore, MemoryDocumentStore, PgDocumentStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(default_log_directive(&config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting SkillCompass API v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn DocumentStore> = match &config.store_backend {
        StoreBackend::Postgres { database_url } => {
            let pool = create_pool(database_url).await?;
            ensure_schema(&pool).await?;
            Arc::new(PgDocumentStore::new(pool))
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory document store; data is lost on restart");
            Arc::new(MemoryDocumentStore::new())
        }
    };

    let limiter: Arc<dyn RateLimiter> = match &config.redis_url {
        Some(url) => {
            let limiter = RedisRateLimiter::connect(url)
                .await
                .context("failed to connect to Redis")?;
            info!("Rate limiting backed by Redis");
            Arc::new(limiter)
        }
        None => {
            info!("Rate limiting with in-process counters");
            Arc::new(InMemoryRateLimiter::new())
        }
    };

    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    info!(
        "LLM client initialized (models: {}, fallback {})",
        llm_client::PRIMARY_MODEL,
        llm_client::FALLBACK_MODEL
    );

    let federated: Option<Arc<dyn IdentityVerifier>> = match &config.firebase_project_id {
        Some(project_id) => {
            info!("Firebase sign-in enabled for project {project_id}");
            Some(Arc::new(FirebaseTokenVerifier::new(project_id.clone())?))
        }
        None => None,
    };
    let auth = Authenticator::new(
        LocalTokenIssuer::new(&config.jwt_secret_key, config.jwt_expire_minutes),
        federated,
    );

    let archive: Option<Arc<dyn ReportArchive>> = match &config.s3 {
        Some(s3) => {
            let client = build_s3_client(s3).await;
            info!("Report archive enabled (bucket: {})", s3.bucket);
            Some(Arc::new(S3ReportArchive::new(client, s3.bucket.clone())))
        }
        None => None,
    };

    let state = AppState {
        store,
        llm: Arc::new(llm),
        auth,
        limiter,
        archive,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(LatencyUnit::Millis),
                ),
        )
        .layer(cors_layer(&config.cors_allowed_origins)?);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Our crate plus `tower_http`, which carries the per-request trace events.
fn default_log_directive(level: &str) -> String {
    format!("{}={level},tower_http={level}", env!("CARGO_CRATE_NAME"))
}

/// Permissive when no origins are configured.
fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    if origins.is_empty() {
        warn!("CORS_ALLOWED_ORIGINS not set; allowing any origin");
        return Ok(CorsLayer::permissive());
    }

    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).with_context(|| format!("invalid CORS origin '{origin}'"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any))
}

/// Constructs an S3 client for MinIO (local) or AWS (production).
async fn build_s3_client(s3: &S3Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &s3.access_key_id,
        &s3.secret_access_key,
        None,
        None,
        "skillcompass-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(s3.region.clone()))
        .credentials_provider(credentials)
        .endpoint_url(&s3.endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
