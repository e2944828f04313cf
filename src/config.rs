use serde::{Deserialize, Serialize};
use std::env;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub weather_api_key: String,
    pub weather_base_url: String,
    pub weather_timeline_path: String,
    pub redis_host: Option<String>,
    pub redis_port: u16,
    pub redis_password: String,
    pub app_timezone: String,
    pub bind_addr: String,
    pub rate_limit_per_minute: u64,
    pub rate_limit_per_day: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Config {
            weather_api_key: env::var("API_KEY")
                .map_err(|_| anyhow::anyhow!("API_KEY not set"))?,
            weather_base_url: env::var("WEATHER_API_BASE_URL")
                .unwrap_or_else(|_| "https://weather.visualcrossing.com".to_string()),
            weather_timeline_path: env::var("WEATHER_API_TIMELINE_PATH").unwrap_or_else(|_| {
                "/VisualCrossingWebServices/rest/services/timeline".to_string()
            }),
            redis_host: env::var("REDIS_HOST").ok().filter(|host| !host.is_empty()),
            redis_port: parse_var("REDIS_PORT", 6379)?,
            redis_password: env::var("REDIS_PASSWORD").unwrap_or_default(),
            app_timezone: env::var("APP_TIMEZONE").unwrap_or_else(|_| "UTC".to_string()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:5500".to_string()),
            rate_limit_per_minute: parse_var("RATE_LIMIT_PER_MINUTE", 5)?,
            rate_limit_per_day: parse_var("RATE_LIMIT_PER_DAY", 200)?,
        };

        config.timezone()?;
        Ok(config)
    }

    /// Connection URL for the Redis store, `None` when no host is configured.
    pub fn redis_url(&self) -> Option<String> {
        let host = self.redis_host.as_ref()?;
        if self.redis_password.is_empty() {
            Some(format!("redis://{}:{}/0", host, self.redis_port))
        } else {
            Some(format!(
                "redis://:{}@{}:{}/0",
                urlencoding::encode(&self.redis_password),
                host,
                self.redis_port
            ))
        }
    }

    pub fn timezone(&self) -> anyhow::Result<chrono_tz::Tz> {
        self.app_timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| anyhow::anyhow!("Invalid APP_TIMEZONE: {}", self.app_timezone))
    }

    pub fn timeline_url(&self) -> String {
        format!(
            "{}{}",
            self.weather_base_url.trim_end_matches('/'),
            self.weather_timeline_path
        )
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T> {
    match env::var(name) {
        Ok(raw) if !raw.is_empty() => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: {}", name, raw)),
        _ => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Config {
            weather_api_key: "test-key".to_string(),
            weather_base_url: "http://127.0.0.1:1".to_string(),
            weather_timeline_path: "/VisualCrossingWebServices/rest/services/timeline".to_string(),
            redis_host: None,
            redis_port: 6379,
            redis_password: String::new(),
            app_timezone: "UTC".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            rate_limit_per_minute: 5,
            rate_limit_per_day: 200,
        }
    }
}
