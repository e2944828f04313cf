use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cache;
mod config;
mod error;
mod forecast;
mod rate_limit;
mod routes;
mod views;

use cache::{CachedFetcher, KvStore, MemoryStore, RedisStore};
use config::Config;
use forecast::visualcrossing::VisualCrossingClient;
use rate_limit::{Quota, RateLimiter};
use routes::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weather_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    // Cache and rate limiter share one store
    let store: Arc<dyn KvStore> = match config.redis_url() {
        Some(url) => {
            let redis = RedisStore::connect(&url).await?;
            redis.ping().await?;
            tracing::info!(
                "Connected to Redis at {}:{}",
                config.redis_host.as_deref().unwrap_or_default(),
                config.redis_port
            );
            Arc::new(redis)
        }
        None => {
            tracing::warn!("REDIS_HOST not set, using an in-process store");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState {
        timezone: config.timezone()?,
        fetcher: Arc::new(CachedFetcher::new(store.clone())),
        forecast_source: Arc::new(VisualCrossingClient::new(&config)?),
        admission: Arc::new(RateLimiter::new(
            store,
            vec![
                Quota::per_minute(config.rate_limit_per_minute),
                Quota::per_day(config.rate_limit_per_day),
            ],
        )),
    };

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server starting on http://{}", config.bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
