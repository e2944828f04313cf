use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

use super::{request::ForecastRequest, ForecastSource};
use crate::config::Config;
use crate::error::WeatherError;

pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for the Visual Crossing timeline API.
///
/// TLS goes through rustls with the bundled webpki roots; certificate
/// verification is never relaxed.
pub struct VisualCrossingClient {
    client: Client,
    timeline_url: String,
    api_key: String,
}

impl VisualCrossingClient {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        Self::with_timeout(config, UPSTREAM_TIMEOUT)
    }

    pub fn with_timeout(config: &Config, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("weather-gateway/", env!("CARGO_PKG_VERSION")))
            .use_rustls_tls()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            timeline_url: config.timeline_url(),
            api_key: config.weather_api_key.clone(),
        })
    }

    pub fn request_url(&self, request: &ForecastRequest) -> String {
        let mut url = format!("{}/{}", self.timeline_url, request.location_segment());
        if let Some(range) = request.dates {
            url.push_str(&format!("/{}/{}", range.start, range.end));
        }
        url
    }
}

#[async_trait]
impl ForecastSource for VisualCrossingClient {
    async fn fetch_timeline(&self, request: &ForecastRequest) -> Result<String, WeatherError> {
        let mut params = vec![("unitGroup", "metric")];
        if let Some(include) = request.include() {
            params.push(("include", include));
        }
        params.push(("key", self.api_key.as_str()));
        params.push(("contentType", "json"));

        let response = self
            .client
            .get(self.request_url(request))
            .query(&params)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.text().await?),
            StatusCode::BAD_REQUEST => {
                tracing::debug!("API request failed with status {}", StatusCode::BAD_REQUEST);
                Err(WeatherError::UpstreamInvalidLocation)
            }
            status => {
                tracing::debug!("API request failed with status {}", status);
                Err(WeatherError::Upstream(status))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::request::WeatherParams;
    use chrono::NaiveDate;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TIMELINE: &str = "/VisualCrossingWebServices/rest/services/timeline";

    fn config_for(server: &MockServer) -> Config {
        let mut config = Config::for_tests();
        config.weather_base_url = server.uri();
        config
    }

    fn paris(start: Option<&str>, end: Option<&str>, daily_data: Option<&str>) -> ForecastRequest {
        let params = WeatherParams {
            location: Some("Paris".to_string()),
            city: None,
            start: start.map(str::to_string),
            end: end.map(str::to_string),
            daily_data: daily_data.map(str::to_string),
        };
        ForecastRequest::from_params(params, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .unwrap()
    }

    #[tokio::test]
    async fn test_ok_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/Paris/2024-01-01/2024-01-05", TIMELINE)))
            .and(query_param("unitGroup", "metric"))
            .and(query_param("include", "days,hours"))
            .and(query_param("key", "test-key"))
            .and(query_param("contentType", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"days":[]}"#))
            .expect(1)
            .mount(&server)
            .await;

        let client = VisualCrossingClient::new(&config_for(&server)).unwrap();
        let body = client
            .fetch_timeline(&paris(Some("2024-01-01"), Some("2024-01-05"), Some("days,hours")))
            .await
            .unwrap();

        assert_eq!(body, r#"{"days":[]}"#);
    }

    #[tokio::test]
    async fn test_no_range_hits_location_only() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/Paris", TIMELINE)))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let client = VisualCrossingClient::new(&config_for(&server)).unwrap();
        assert!(client.fetch_timeline(&paris(None, None, None)).await.is_ok());
    }

    #[tokio::test]
    async fn test_bad_request_is_invalid_location() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Bad API Request:Invalid location"))
            .mount(&server)
            .await;

        let client = VisualCrossingClient::new(&config_for(&server)).unwrap();
        let err = client.fetch_timeline(&paris(None, None, None)).await.unwrap_err();
        assert!(matches!(err, WeatherError::UpstreamInvalidLocation));
    }

    #[tokio::test]
    async fn test_other_status_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = VisualCrossingClient::new(&config_for(&server)).unwrap();
        let err = client.fetch_timeline(&paris(None, None, None)).await.unwrap_err();
        assert!(matches!(err, WeatherError::Upstream(status) if status == StatusCode::TOO_MANY_REQUESTS));
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("{}")
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client =
            VisualCrossingClient::with_timeout(&config_for(&server), Duration::from_millis(100))
                .unwrap();
        let err = client.fetch_timeline(&paris(None, None, None)).await.unwrap_err();
        assert!(matches!(err, WeatherError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_refused_connection_is_transport_error() {
        let client = VisualCrossingClient::new(&Config::for_tests()).unwrap();
        let err = client.fetch_timeline(&paris(None, None, None)).await.unwrap_err();
        assert!(matches!(err, WeatherError::Transport(_)));
    }

    async fn rendered(err: WeatherError) -> String {
        use axum::response::IntoResponse;

        let body = axum::body::to_bytes(err.into_response().into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_transport_error_page_hides_api_key() {
        let mut config = Config::for_tests();
        config.weather_api_key = "SUPERSECRETKEY".to_string();
        let client = VisualCrossingClient::new(&config).unwrap();

        let err = client.fetch_timeline(&paris(None, None, None)).await.unwrap_err();
        assert!(matches!(err, WeatherError::Transport(_)));
        assert!(!format!("{:?}", err).contains("SUPERSECRETKEY"));

        let page = rendered(err).await;
        assert!(page.contains("HTTP error occurred"));
        assert!(!page.contains("SUPERSECRETKEY"));
    }

    #[tokio::test]
    async fn test_timeout_error_page_hides_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let mut config = config_for(&server);
        config.weather_api_key = "SUPERSECRETKEY".to_string();
        let client = VisualCrossingClient::with_timeout(&config, Duration::from_millis(100)).unwrap();

        let err = client.fetch_timeline(&paris(None, None, None)).await.unwrap_err();
        assert!(matches!(err, WeatherError::Timeout(_)));

        let page = rendered(err).await;
        assert!(page.contains("Request timed out"));
        assert!(!page.contains("SUPERSECRETKEY"));
    }

    #[test]
    fn test_request_url() {
        let mut config = Config::for_tests();
        config.weather_base_url = "https://weather.visualcrossing.com".to_string();
        let client = VisualCrossingClient::new(&config).unwrap();

        let mut request = paris(Some("2024-01-01"), Some("2024-01-05"), None);
        request.city = Some("France".to_string());

        assert_eq!(
            client.request_url(&request),
            "https://weather.visualcrossing.com/VisualCrossingWebServices/rest/services/timeline/Paris%2CFrance/2024-01-01/2024-01-05"
        );
    }
}
