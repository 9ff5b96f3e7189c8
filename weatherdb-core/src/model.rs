use chrono::{Local, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Text format of the `date` column.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Text format of the `fetched_at` column.
pub const FETCHED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One normalized day of weather for one city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub city: String,
    pub date: NaiveDate,
    pub temp_c: f64,
    pub temp_f: f64,
    pub condition_text: String,
    pub humidity: i64,
    pub wind_kph: f64,
    pub fetched_at: NaiveDateTime,
}

impl WeatherRecord {
    pub fn date_string(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }

    pub fn fetched_at_string(&self) -> String {
        self.fetched_at.format(FETCHED_AT_FORMAT).to_string()
    }
}

/// A row read back from the `weather` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredWeatherRecord {
    pub id: i64,
    #[serde(flatten)]
    pub record: WeatherRecord,
}

/// Aggregate view of the whole table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub rows: usize,
    pub cities: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub latest_fetch: NaiveDateTime,
}

/// Current local wall-clock time at the resolution stored in `fetched_at`.
pub fn now_stamp() -> NaiveDateTime {
    truncate_to_seconds(Local::now().naive_local())
}

pub fn truncate_to_seconds(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_nanosecond(0).unwrap_or(ts)
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

pub fn parse_fetched_at(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, FETCHED_AT_FORMAT).ok()
}
