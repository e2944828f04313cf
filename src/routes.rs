use axum::{
    extract::{Query, State},
    middleware,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::{
    cache::{CacheStatus, CachedFetcher},
    error::WeatherError,
    forecast::{
        request::{ForecastRequest, WeatherParams},
        ForecastSource,
    },
    rate_limit::{self, AdmissionCheck},
    views,
};

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub timezone: chrono_tz::Tz,
    pub fetcher: Arc<CachedFetcher>,
    pub forecast_source: Arc<dyn ForecastSource>,
    pub admission: Arc<dyn AdmissionCheck>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn home() -> Html<String> {
    views::index_page()
}

pub async fn get_weather(
    State(state): State<AppState>,
    Query(params): Query<WeatherParams>,
) -> Response {
    match fetch_weather(&state, params).await {
        Ok((payload, status)) => ([("x-cache", status.as_str())], Json(payload)).into_response(),
        Err(err) => {
            err.log();
            err.into_response()
        }
    }
}

async fn fetch_weather(
    state: &AppState,
    params: WeatherParams,
) -> Result<(Value, CacheStatus), WeatherError> {
    let today = chrono::Utc::now().with_timezone(&state.timezone).date_naive();
    let request = ForecastRequest::from_params(params, today)?;
    let key = request.cache_key();

    let source = state.forecast_source.clone();
    state
        .fetcher
        .fetch_or_cache(&key, || async move { source.fetch_timeline(&request).await })
        .await
}

// Create the router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/weather", get(get_weather))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::admission,
        ))
        .route("/health", get(health))
        .with_state(state)
}
