use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::{
    error::{Result, WeatherError},
    model::{DATE_FORMAT, WeatherRecord, now_stamp, parse_date},
};

use super::WeatherProvider;

const HISTORY: &str = "history";
const FORECAST: &str = "forecast";

#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl WeatherApiProvider {
    /// Provider against a custom endpoint root with an explicit request timeout.
    pub fn with_base_url(api_key: String, base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| WeatherError::Request { operation: "client setup", source })?;

        Ok(Self { api_key, base_url: base_url.trim_end_matches('/').to_string(), http })
    }

    async fn get_days(
        &self,
        operation: &'static str,
        city: &str,
        extra: (&str, String),
    ) -> Result<Vec<WaForecastDay>> {
        let url = format!("{}/{}.json", self.base_url, operation);
        debug!(city, operation, %url, "requesting WeatherAPI");

        let res = self
            .http
            .get(&url)
            .query(&[("key", self.api_key.as_str()), ("q", city), (extra.0, extra.1.as_str())])
            .send()
            .await
            .map_err(|source| WeatherError::Request { operation, source })?;

        let status = res.status();
        let body = res.text().await.map_err(|source| WeatherError::Request { operation, source })?;

        if !status.is_success() {
            return Err(WeatherError::Status { operation, status, body: truncate_body(&body) });
        }

        let parsed: WaForecastResponse = serde_json::from_str(&body)
            .map_err(|e| WeatherError::Schema { operation, reason: e.to_string() })?;

        Ok(parsed.forecast.forecastday)
    }
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
}

#[derive(Debug, Deserialize)]
struct WaDay {
    avgtemp_c: f64,
    avgtemp_f: f64,
    // WeatherAPI has served this both as an integer and as a float.
    avghumidity: f64,
    maxwind_kph: f64,
    condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaForecastDay {
    date: Option<String>,
    day: WaDay,
}

#[derive(Debug, Deserialize)]
struct WaForecast {
    forecastday: Vec<WaForecastDay>,
}

#[derive(Debug, Deserialize)]
struct WaForecastResponse {
    forecast: WaForecast,
}

impl WaDay {
    fn into_record(
        self,
        city: &str,
        date: NaiveDate,
        fetched_at: NaiveDateTime,
    ) -> WeatherRecord {
        WeatherRecord {
            city: city.to_string(),
            date,
            temp_c: self.avgtemp_c,
            temp_f: self.avgtemp_f,
            condition_text: self.condition.text,
            humidity: self.avghumidity.round() as i64,
            wind_kph: self.maxwind_kph,
            fetched_at,
        }
    }
}

#[async_trait]
impl WeatherProvider for WeatherApiProvider {
    async fn fetch_history(&self, city: &str, date: NaiveDate) -> Result<WeatherRecord> {
        let dt = date.format(DATE_FORMAT).to_string();
        let days = self.get_days(HISTORY, city, ("dt", dt)).await?;

        let first = days.into_iter().next().ok_or_else(|| WeatherError::Schema {
            operation: HISTORY,
            reason: "response contained no forecastday data".to_string(),
        })?;

        // The requested date is authoritative; the response echoes it anyway.
        Ok(first.day.into_record(city, date, now_stamp()))
    }

    async fn fetch_forecast(&self, city: &str, days: u32) -> Result<Vec<WeatherRecord>> {
        let entries = self.get_days(FORECAST, city, ("days", days.to_string())).await?;
        let fetched_at = now_stamp();

        entries
            .into_iter()
            .map(|entry| -> Result<WeatherRecord> {
                let raw = entry.date.ok_or_else(|| WeatherError::Schema {
                    operation: FORECAST,
                    reason: "forecastday entry without date".to_string(),
                })?;
                let date = parse_date(&raw).ok_or_else(|| WeatherError::Schema {
                    operation: FORECAST,
                    reason: format!("invalid forecastday date '{raw}'"),
                })?;
                Ok(entry.day.into_record(city, date, fetched_at))
            })
            .collect()
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}
