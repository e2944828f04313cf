use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::KvStore;
use crate::error::WeatherError;
use crate::routes::AppState;

/// Gate run before any handler. `Err` carries the rejection to render.
#[async_trait]
pub trait AdmissionCheck: Send + Sync {
    async fn admit(&self, client: &str) -> Result<(), WeatherError>;
}

#[derive(Debug, Clone)]
pub struct Quota {
    pub limit: u64,
    pub window: Duration,
    label: &'static str,
}

impl Quota {
    pub fn per_minute(limit: u64) -> Self {
        Self {
            limit,
            window: Duration::from_secs(60),
            label: "1 minute",
        }
    }

    pub fn per_day(limit: u64) -> Self {
        Self {
            limit,
            window: Duration::from_secs(24 * 60 * 60),
            label: "1 day",
        }
    }

    fn describe(&self) -> String {
        format!("{} per {}", self.limit, self.label)
    }
}

/// Fixed-window counters per client, kept in the shared key-value store.
pub struct RateLimiter {
    store: Arc<dyn KvStore>,
    quotas: Vec<Quota>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KvStore>, quotas: Vec<Quota>) -> Self {
        Self { store, quotas }
    }

    async fn check_at(&self, client: &str, now_secs: u64) -> Result<(), WeatherError> {
        for quota in &self.quotas {
            let window_secs = quota.window.as_secs().max(1);
            let bucket = now_secs / window_secs;
            let key = format!("ratelimit:{}:{}:{}", window_secs, client, bucket);

            let count = match self.store.incr(&key, quota.window).await {
                Ok(count) => count,
                Err(e) => {
                    tracing::warn!("Rate limit store unavailable, admitting {}: {}", client, e);
                    continue;
                }
            };

            if count > quota.limit {
                return Err(WeatherError::RateLimited {
                    limit: quota.describe(),
                    retry_after_secs: window_secs - now_secs % window_secs,
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AdmissionCheck for RateLimiter {
    async fn admit(&self, client: &str) -> Result<(), WeatherError> {
        let now_secs = chrono::Utc::now().timestamp().max(0) as u64;
        self.check_at(client, now_secs).await
    }
}

pub async fn admission(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let client = connect_info
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    match state.admission.admit(&client).await {
        Ok(()) => next.run(request).await,
        Err(err) => {
            err.log();
            err.into_response()
        }
    }
}
