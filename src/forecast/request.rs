use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::WeatherError;

/// Furthest `end` date the upstream will forecast, in days from today.
pub const MAX_DAYS_AHEAD: i64 = 14;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Raw query string of `GET /weather`.
#[derive(Debug, Default, Deserialize)]
pub struct WeatherParams {
    pub location: Option<String>,
    pub city: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    #[serde(rename = "daily-data")]
    pub daily_data: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// A forecast query that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastRequest {
    pub location: String,
    pub city: Option<String>,
    pub dates: Option<DateRange>,
    pub daily_data: Option<String>,
}

impl ForecastRequest {
    /// Validates `params` against `today`.
    ///
    /// A date range is only kept when both ends are given; a lone `start` or
    /// `end` is dropped so the upstream falls back to its current forecast.
    pub fn from_params(params: WeatherParams, today: NaiveDate) -> Result<Self, WeatherError> {
        let location = non_blank(params.location).ok_or(WeatherError::MissingLocation)?;

        let dates = match (non_blank(params.start), non_blank(params.end)) {
            (Some(start), Some(end)) => {
                let start = parse_date("start", start)?;
                let end = parse_date("end", end)?;
                if (end - today).num_days() > MAX_DAYS_AHEAD {
                    return Err(WeatherError::DateRangeExceeded);
                }
                Some(DateRange { start, end })
            }
            _ => None,
        };

        Ok(Self {
            location,
            city: non_blank(params.city),
            dates,
            daily_data: non_blank(params.daily_data),
        })
    }

    /// Storage key for this query.
    ///
    /// Each field is length-prefixed, so values containing the separator (or
    /// shifting characters between location and city) cannot collide.
    pub fn cache_key(&self) -> String {
        let start = self.dates.map(|d| d.start.format(DATE_FORMAT).to_string());
        let end = self.dates.map(|d| d.end.format(DATE_FORMAT).to_string());

        let fields = [
            self.location.as_str(),
            self.city.as_deref().unwrap_or(""),
            start.as_deref().unwrap_or(""),
            end.as_deref().unwrap_or(""),
            self.daily_data.as_deref().unwrap_or(""),
        ];

        let mut key = String::from("weather");
        for field in fields {
            key.push_str(&format!("|{}:{}", field.len(), field));
        }
        key
    }

    /// Path segment naming the place, with the city joined by an encoded comma.
    pub fn location_segment(&self) -> String {
        let mut segment = urlencoding::encode(&self.location).into_owned();
        if let Some(city) = &self.city {
            segment.push_str("%2C");
            segment.push_str(&urlencoding::encode(city));
        }
        segment
    }

    pub fn include(&self) -> Option<&str> {
        self.daily_data.as_deref()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_date(field: &'static str, value: String) -> Result<NaiveDate, WeatherError> {
    NaiveDate::parse_from_str(&value, DATE_FORMAT).map_err(|source| WeatherError::DateParse {
        field,
        value,
        source,
    })
}
