use crate::{Config, WeatherRecord, error::Result, provider::weatherapi::WeatherApiProvider};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt::Debug;

pub mod weatherapi;

/// Source of normalized daily weather records.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Daily summary for `city` on a past `date`.
    async fn fetch_history(&self, city: &str, date: NaiveDate) -> Result<WeatherRecord>;

    /// `days` days of forecast starting today, in upstream day order.
    async fn fetch_forecast(&self, city: &str, days: u32) -> Result<Vec<WeatherRecord>>;
}

/// Construct the WeatherAPI.com provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let api_key = config.require_api_key()?;

    let provider = WeatherApiProvider::with_base_url(
        api_key.to_owned(),
        &config.base_url,
        config.request_timeout(),
    )?;

    Ok(Box::new(provider))
}
