use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::views;

pub const DATE_RANGE_EXCEEDED: &str =
    "Date range exceeds the limit. Only forecasts for the next 15 days are available.";

/// Everything that can go wrong between an inbound request and its response.
///
/// The `Display` text is what ends up on the error page, so it must never
/// carry internal details for `Unexpected`.
#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("Missing required parameter: location.")]
    MissingLocation,
    #[error("{}", DATE_RANGE_EXCEEDED)]
    DateRangeExceeded,
    #[error("Invalid {field} date '{value}': {source}")]
    DateParse {
        field: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("Weather API Error: Invalid location parameter value.")]
    UpstreamInvalidLocation,
    #[error("Weather API Error")]
    Upstream(reqwest::StatusCode),
    #[error("HTTP error occurred: {0}")]
    Transport(String),
    #[error("Request timed out while trying to connect: {0}")]
    Timeout(String),
    #[error("An unexpected error occurred while fetching weather data.")]
    Unexpected(String),
    #[error("Rate limit exceeded: {limit}")]
    RateLimited { limit: String, retry_after_secs: u64 },
}

impl WeatherError {
    pub fn kind(&self) -> &'static str {
        match self {
            WeatherError::MissingLocation => "missing_location",
            WeatherError::DateRangeExceeded => "date_range_exceeded",
            WeatherError::DateParse { .. } => "date_parse_error",
            WeatherError::UpstreamInvalidLocation => "upstream_invalid_location",
            WeatherError::Upstream(_) => "upstream_error",
            WeatherError::Transport(_) => "transport_error",
            WeatherError::Timeout(_) => "upstream_timeout",
            WeatherError::Unexpected(_) => "unexpected_error",
            WeatherError::RateLimited { .. } => "rate_limited",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            WeatherError::MissingLocation
            | WeatherError::DateRangeExceeded
            | WeatherError::DateParse { .. }
            | WeatherError::UpstreamInvalidLocation => StatusCode::BAD_REQUEST,
            WeatherError::Upstream(_) | WeatherError::Transport(_) => StatusCode::BAD_GATEWAY,
            WeatherError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            WeatherError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WeatherError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Validation problems are the caller's fault and logged quietly; anything
    /// that went wrong talking to the upstream is an error.
    pub fn log(&self) {
        match self {
            WeatherError::MissingLocation
            | WeatherError::DateRangeExceeded
            | WeatherError::DateParse { .. }
            | WeatherError::RateLimited { .. } => {
                tracing::info!(kind = self.kind(), "Request rejected: {}", self);
            }
            WeatherError::UpstreamInvalidLocation | WeatherError::Upstream(_) => {
                tracing::error!(kind = self.kind(), "Weather API request failed: {:?}", self);
            }
            WeatherError::Transport(cause) | WeatherError::Timeout(cause) => {
                tracing::error!(kind = self.kind(), "Upstream call failed: {}", cause);
            }
            WeatherError::Unexpected(detail) => {
                tracing::error!(kind = self.kind(), "An unexpected error occurred: {}", detail);
            }
        }
    }
}

/// The request URL carries the API key, so it is dropped before the error is
/// turned into text.
impl From<reqwest::Error> for WeatherError {
    fn from(err: reqwest::Error) -> Self {
        let err = err.without_url();
        let cause = describe(&err);
        if err.is_timeout() {
            WeatherError::Timeout(cause)
        } else if err.is_connect() || err.is_request() {
            WeatherError::Transport(cause)
        } else {
            WeatherError::Unexpected(cause)
        }
    }
}

fn describe(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

impl IntoResponse for WeatherError {
    fn into_response(self) -> Response {
        let mut response =
            (self.status_code(), views::error_page(&self.to_string())).into_response();

        if let WeatherError::RateLimited { retry_after_secs, .. } = &self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(WeatherError::DateRangeExceeded.to_string(), DATE_RANGE_EXCEEDED);
        assert_eq!(
            WeatherError::UpstreamInvalidLocation.to_string(),
            "Weather API Error: Invalid location parameter value."
        );
        assert_eq!(
            WeatherError::Upstream(reqwest::StatusCode::SERVICE_UNAVAILABLE).to_string(),
            "Weather API Error"
        );
        assert!(WeatherError::Timeout("deadline elapsed".to_string())
            .to_string()
            .contains("deadline elapsed"));
    }

    #[test]
    fn test_unexpected_hides_detail() {
        let err = WeatherError::Unexpected("redis://:secret@host".to_string());
        assert!(!err.to_string().contains("secret"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(WeatherError::MissingLocation.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(WeatherError::DateRangeExceeded.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            WeatherError::Upstream(reqwest::StatusCode::INTERNAL_SERVER_ERROR).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            WeatherError::Timeout(String::new()).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            WeatherError::Unexpected(String::new()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = WeatherError::RateLimited {
            limit: "5 per 1 minute".to_string(),
            retry_after_secs: 42,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "42");
    }
}
