//! Redis-backed counters shared by every replica.
//!
//! Fixed window with INCR + EXPIRE: the first hit in a window sets the
//! expiry, the TTL tells a denied client when to come back.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use super::{RateDecision, RateLimitError, RateLimiter, RatePolicy};

#[derive(Clone)]
pub struct RedisRateLimiter {
    conn: MultiplexedConnection,
}

impl RedisRateLimiter {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }

    pub async fn connect(url: &str) -> Result<Self, RateLimitError> {
        let client = redis::Client::open(url).map_err(unavailable)?;
        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(unavailable)?;
        Ok(Self::new(conn))
    }
}

fn unavailable(e: redis::RedisError) -> RateLimitError {
    RateLimitError::Unavailable(e.to_string())
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(&self, key: &str, policy: &RatePolicy) -> Result<RateDecision, RateLimitError> {
        let mut conn = self.conn.clone();

        let count: u64 = conn.incr(key, 1_u64).await.map_err(unavailable)?;
        if count == 1 {
            conn.expire::<_, ()>(key, policy.window_secs as i64)
                .await
                .map_err(unavailable)?;
        }

        if count > u64::from(policy.limit) {
            let ttl: i64 = conn.ttl(key).await.map_err(unavailable)?;
            // -1 means the EXPIRE was lost; restore it so the key can't stick.
            if ttl == -1 {
                conn.expire::<_, ()>(key, policy.window_secs as i64)
                    .await
                    .map_err(unavailable)?;
            }
            let retry_after_secs = if ttl > 0 { ttl as u64 } else { policy.window_secs };
            return Ok(RateDecision::Denied { retry_after_secs });
        }

        Ok(RateDecision::Allowed {
            remaining: policy.limit - count as u32,
        })
    }
}
