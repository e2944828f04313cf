pub mod request;
pub mod visualcrossing;

use async_trait::async_trait;

use crate::error::WeatherError;
use request::ForecastRequest;

/// Anything that can answer a forecast query with a raw JSON body.
#[async_trait]
pub trait ForecastSource: Send + Sync {
    async fn fetch_timeline(&self, request: &ForecastRequest) -> Result<String, WeatherError>;
}
