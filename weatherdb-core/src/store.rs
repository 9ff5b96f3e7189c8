//! SQLite storage for weather records.
//!
//! The `weather` table is append-only: rows are added by [`WeatherStore::insert_batch`]
//! and only ever read afterwards.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{Connection, ToSql, params};
use std::{fs, path::Path};
use tracing::debug;

use crate::{
    error::Result,
    model::{
        DATE_FORMAT, FETCHED_AT_FORMAT, StoredWeatherRecord, TableSummary, WeatherRecord,
        parse_date, parse_fetched_at,
    },
};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS weather (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        city TEXT,
        date TEXT,
        temp_c REAL,
        temp_f REAL,
        condition_text TEXT,
        humidity INTEGER,
        wind_kph REAL,
        fetched_at TEXT
    );
"#;

const COLUMNS: &str =
    "id, city, date, temp_c, temp_f, condition_text, humidity, wind_kph, fetched_at";

/// Row filter for [`WeatherStore::query`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub city: Option<String>,
    pub fetched_at: Option<NaiveDateTime>,
    /// Inclusive lower bound.
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound.
    pub to: Option<NaiveDate>,
}

pub struct WeatherStore {
    conn: Connection,
}

impl WeatherStore {
    /// Open the database at `path`, creating the file, its parent directories
    /// and the schema if they don't exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = fs::create_dir_all(parent) {
                debug!(path = %parent.display(), error = %e, "could not create database directory");
            }
        }

        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Idempotent: existing tables and rows are left alone.
    pub fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Insert all records in one transaction. Returns the number of rows written.
    pub fn insert_batch(&mut self, records: &[WeatherRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO weather (
                    city, date, temp_c, temp_f, condition_text,
                    humidity, wind_kph, fetched_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;

            for r in records {
                stmt.execute(params![
                    r.city,
                    r.date_string(),
                    r.temp_c,
                    r.temp_f,
                    r.condition_text,
                    r.humidity,
                    r.wind_kph,
                    r.fetched_at_string(),
                ])?;
            }
        }
        tx.commit()?;

        Ok(records.len())
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<StoredWeatherRecord> {
        let date_str: String = row.get(2)?;
        let fetched_str: String = row.get(8)?;

        let date = parse_date(&date_str).ok_or_else(|| bad_text(2, &date_str))?;
        let fetched_at = parse_fetched_at(&fetched_str).ok_or_else(|| bad_text(8, &fetched_str))?;

        Ok(StoredWeatherRecord {
            id: row.get(0)?,
            record: WeatherRecord {
                city: row.get(1)?,
                date,
                temp_c: row.get(3)?,
                temp_f: row.get(4)?,
                condition_text: row.get(5)?,
                humidity: row.get(6)?,
                wind_kph: row.get(7)?,
                fetched_at,
            },
        })
    }

    /// Every row, in insertion order.
    pub fn all(&self) -> Result<Vec<StoredWeatherRecord>> {
        self.query(&RecordFilter::default()).map(|mut rows| {
            rows.sort_by_key(|r| r.id);
            rows
        })
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM weather", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Table-wide stats, or `None` when nothing has been ingested yet.
    pub fn summary(&self) -> Result<Option<TableSummary>> {
        let (rows, cities, first, last, latest): (
            i64,
            i64,
            Option<String>,
            Option<String>,
            Option<String>,
        ) = self.conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT city), MIN(date), MAX(date), MAX(fetched_at)
             FROM weather",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
        )?;

        if rows == 0 {
            return Ok(None);
        }

        let (Some(first_date), Some(last_date), Some(latest_fetch)) = (
            first.as_deref().and_then(parse_date),
            last.as_deref().and_then(parse_date),
            latest.as_deref().and_then(parse_fetched_at),
        ) else {
            return Err(bad_text(0, "summary aggregate").into());
        };

        Ok(Some(TableSummary {
            rows: rows as usize,
            cities: cities as usize,
            first_date,
            last_date,
            latest_fetch,
        }))
    }

    /// Distinct cities in the order they were first inserted.
    pub fn cities(&self) -> Result<Vec<String>> {
        let mut stmt =
            self.conn.prepare("SELECT city FROM weather GROUP BY city ORDER BY MIN(id)")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }

    /// Fetch batches recorded for `city`, newest first.
    pub fn batches(&self, city: &str) -> Result<Vec<NaiveDateTime>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT fetched_at FROM weather WHERE city = ?1 ORDER BY fetched_at DESC",
        )?;
        let rows = stmt.query_map(params![city], |row| {
            let s: String = row.get(0)?;
            parse_fetched_at(&s).ok_or_else(|| bad_text(0, &s))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Rows matching `filter`, ordered by date then id.
    pub fn query(&self, filter: &RecordFilter) -> Result<Vec<StoredWeatherRecord>> {
        let mut clauses = Vec::new();
        let mut args: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(city) = &filter.city {
            args.push(Box::new(city.clone()));
            clauses.push(format!("city = ?{}", args.len()));
        }
        if let Some(ts) = filter.fetched_at {
            args.push(Box::new(ts.format(FETCHED_AT_FORMAT).to_string()));
            clauses.push(format!("fetched_at = ?{}", args.len()));
        }
        // ISO dates compare correctly as text.
        if let Some(from) = filter.from {
            args.push(Box::new(from.format(DATE_FORMAT).to_string()));
            clauses.push(format!("date >= ?{}", args.len()));
        }
        if let Some(to) = filter.to {
            args.push(Box::new(to.format(DATE_FORMAT).to_string()));
            clauses.push(format!("date <= ?{}", args.len()));
        }

        let mut sql = format!("SELECT {COLUMNS} FROM weather");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY date, id");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
            Self::row_to_record,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn bad_text(column: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        format!("unexpected value '{value}'").into(),
    )
}
