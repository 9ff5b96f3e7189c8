//! Fetch-normalize-persist ingestion.
//!
//! For every configured city the pipeline fetches the historical days and
//! one forecast batch, one request at a time. A failed fetch is logged and
//! skipped; the run carries on with the next date or city. Everything that
//! was fetched is written with a single bulk insert at the end, stamped with
//! one shared `fetched_at`.

use chrono::{Days, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use crate::{
    error::Result,
    model::{WeatherRecord, now_stamp, truncate_to_seconds},
    provider::WeatherProvider,
    store::WeatherStore,
};

/// What one ingestion run fetches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    pub cities: Vec<String>,
    /// Days before today, fetched in list order.
    pub history_offsets: Vec<u32>,
    /// Forecast window, today included.
    pub forecast_days: u32,
}

impl IngestConfig {
    /// Rows a fully successful run inserts.
    pub fn expected_records(&self) -> usize {
        self.cities.len() * (self.history_offsets.len() + self.forecast_days as usize)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    History(NaiveDate),
    Forecast,
}

impl fmt::Display for FetchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchKind::History(date) => write!(f, "history {date}"),
            FetchKind::Forecast => f.write_str("forecast"),
        }
    }
}

/// A fetch that was skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchFailure {
    pub city: String,
    pub kind: FetchKind,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub fetched_at: NaiveDateTime,
    pub inserted: usize,
    pub failures: Vec<FetchFailure>,
}

impl IngestReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Records gathered by one run, before they are written.
#[derive(Debug, Default)]
pub struct Collected {
    pub records: Vec<WeatherRecord>,
    pub failures: Vec<FetchFailure>,
}

pub struct Pipeline<'a> {
    provider: &'a dyn WeatherProvider,
    config: &'a IngestConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(provider: &'a dyn WeatherProvider, config: &'a IngestConfig) -> Self {
        Self { provider, config }
    }

    /// Run against the local clock.
    pub async fn run(&self, store: &mut WeatherStore) -> Result<IngestReport> {
        self.run_at(store, Local::now().date_naive(), now_stamp()).await
    }

    /// Run as if today were `today`, stamping every record with `fetched_at`.
    ///
    /// Only storage errors are returned; fetch errors end up in the report.
    pub async fn run_at(
        &self,
        store: &mut WeatherStore,
        today: NaiveDate,
        fetched_at: NaiveDateTime,
    ) -> Result<IngestReport> {
        let fetched_at = truncate_to_seconds(fetched_at);
        let Collected { mut records, failures } = self.collect(today).await;

        for record in &mut records {
            record.fetched_at = fetched_at;
        }

        info!(records = records.len(), skipped = failures.len(), "inserting records");
        let inserted = store.insert_batch(&records)?;

        Ok(IngestReport { fetched_at, inserted, failures })
    }

    /// Fetch everything for every city, sequentially, without touching storage.
    pub async fn collect(&self, today: NaiveDate) -> Collected {
        let mut out = Collected::default();

        for city in &self.config.cities {
            info!(city = %city, "fetching weather");

            for &offset in &self.config.history_offsets {
                let Some(date) = today.checked_sub_days(Days::new(u64::from(offset))) else {
                    warn!(city = %city, offset, "history offset out of calendar range");
                    continue;
                };

                match self.provider.fetch_history(city, date).await {
                    Ok(record) => {
                        info!(city = %city, %date, "history fetched");
                        out.records.push(record);
                    }
                    Err(e) => {
                        warn!(
                            city = %city,
                            %date,
                            operation = "history",
                            error_kind = e.kind(),
                            error = %e,
                            "skipping"
                        );
                        out.failures.push(FetchFailure {
                            city: city.clone(),
                            kind: FetchKind::History(date),
                            error: e.to_string(),
                        });
                    }
                }
            }

            match self.provider.fetch_forecast(city, self.config.forecast_days).await {
                Ok(batch) => {
                    info!(city = %city, days = batch.len(), "forecast fetched");
                    out.records.extend(batch);
                }
                Err(e) => {
                    warn!(
                        city = %city,
                        operation = "forecast",
                        error_kind = e.kind(),
                        error = %e,
                        "skipping"
                    );
                    out.failures.push(FetchFailure {
                        city: city.clone(),
                        kind: FetchKind::Forecast,
                        error: e.to_string(),
                    });
                }
            }
        }

        out
    }
}
