//! Process-local counters. Each replica keeps its own budget, so this is
//! only accurate for single-instance deployments and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};

use super::{RateDecision, RateLimitError, RateLimiter, RatePolicy};

#[derive(Debug, Default)]
pub struct InMemoryRateLimiter {
    windows: RwLock<HashMap<String, Window>>,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    started: Instant,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, key: &str, policy: &RatePolicy) -> Result<RateDecision, RateLimitError> {
        let window_len = Duration::from_secs(policy.window_secs);
        let now = Instant::now();
        let mut windows = self.windows.write().await;

        // Drop stale windows so the map tracks only active clients.
        windows.retain(|_, w| now.duration_since(w.started) < window_len);

        let window = windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            started: now,
        });
        window.count += 1;

        if window.count > policy.limit {
            let elapsed = now.duration_since(window.started);
            let retry_after_secs = window_len.saturating_sub(elapsed).as_secs().max(1);
            return Ok(RateDecision::Denied { retry_after_secs });
        }

        Ok(RateDecision::Allowed {
            remaining: policy.limit - window.count,
        })
    }
}
