use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use inquire::{Password, Text};
use weatherdb_core::{
    Config, Pipeline, RecordFilter, StoredWeatherRecord, WeatherStore, model::FETCHED_AT_FORMAT,
    provider_from_config,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "weatherdb",
    version,
    about = "Collect daily weather for a set of cities into SQLite"
)]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database file, overriding the configured one.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// WeatherAPI.com key, overriding the configured one.
    #[arg(long, env = "WEATHERAPI_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactively set the API key and city list.
    Configure,

    /// Create the weather table if it doesn't exist yet.
    Init,

    /// Fetch history and forecast for every configured city and store it.
    Fetch,

    /// Row count, cities, date span and latest fetch.
    Summary,

    /// Show stored records for one city and fetch batch.
    Show {
        /// City name; defaults to the first stored city.
        city: Option<String>,

        /// Fetch batch timestamp ("YYYY-MM-DD HH:MM:SS"); defaults to the newest.
        #[arg(long, value_parser = parse_batch)]
        batch: Option<NaiveDateTime>,

        /// First date to include (YYYY-MM-DD).
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last date to include (YYYY-MM-DD).
        #[arg(long)]
        to: Option<NaiveDate>,
    },
}

const EMPTY_HINT: &str =
    "The database is empty.\nRun `weatherdb fetch` first to populate weather data.";

impl Cli {
    pub async fn run(self) -> Result<()> {
        let mut config = self.load_config()?;

        match self.command {
            Command::Configure => self.configure(config),
            Command::Init => {
                let path = config.database_path()?;
                open_store(&path)?;
                println!("Database initialized at: {}", path.display());
                Ok(())
            }
            Command::Fetch => {
                if let Some(key) = &self.api_key {
                    config.set_api_key(key.clone());
                }
                fetch(&config).await
            }
            Command::Summary => summary(&config),
            Command::Show { ref city, batch, from, to } => {
                show(&config, city.clone(), batch, from, to)
            }
        }
    }

    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };
        if let Some(db) = &self.db {
            config.database_path = Some(db.clone());
        }
        Ok(config)
    }

    fn configure(&self, mut config: Config) -> Result<()> {
        let key = Password::new("WeatherAPI.com key:")
            .without_confirmation()
            .with_help_message("Leave empty to keep the current key")
            .prompt()
            .context("Failed to read API key")?;
        if !key.trim().is_empty() {
            config.set_api_key(key.trim().to_string());
        }

        let current = config.cities.join(", ");
        let cities = Text::new("Cities (comma-separated):")
            .with_default(&current)
            .prompt()
            .context("Failed to read city list")?;
        config.cities = split_cities(&cities);
        config.validate()?;

        let path = match &self.config {
            Some(path) => {
                config.save_to(path)?;
                path.clone()
            }
            None => config.save()?,
        };
        println!("Configuration saved to {}", path.display());
        Ok(())
    }
}

fn open_store(path: &std::path::Path) -> Result<WeatherStore> {
    WeatherStore::open(path)
        .with_context(|| format!("Failed to open weather database: {}", path.display()))
}

async fn fetch(config: &Config) -> Result<()> {
    let path = config.database_path()?;
    let mut store = open_store(&path)?;

    let provider = provider_from_config(config)?;
    let ingest = config.ingest_config();

    let report = Pipeline::new(provider.as_ref(), &ingest)
        .run(&mut store)
        .await
        .context("Failed to store fetched weather data")?;

    for failure in &report.failures {
        println!("  skipped {} ({}): {}", failure.city, failure.kind, failure.error);
    }
    println!(
        "Inserted {} of {} records into {} (batch {}).",
        report.inserted,
        ingest.expected_records(),
        path.display(),
        report.fetched_at.format(FETCHED_AT_FORMAT),
    );
    Ok(())
}

fn summary(config: &Config) -> Result<()> {
    let store = open_store(&config.database_path()?)?;

    let Some(summary) = store.summary()? else {
        println!("{EMPTY_HINT}");
        return Ok(());
    };

    println!(
        "Loaded {} rows across {} cities from {} to {} (latest fetch at {}).",
        summary.rows,
        summary.cities,
        summary.first_date,
        summary.last_date,
        summary.latest_fetch.format(FETCHED_AT_FORMAT),
    );
    for city in store.cities()? {
        let batches = store.batches(&city)?;
        println!("  {city}: {} batch(es)", batches.len());
    }
    Ok(())
}

fn show(
    config: &Config,
    city: Option<String>,
    batch: Option<NaiveDateTime>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<()> {
    let store = open_store(&config.database_path()?)?;

    let cities = store.cities()?;
    if cities.is_empty() {
        println!("{EMPTY_HINT}");
        return Ok(());
    }

    let city = match city {
        Some(city) => city,
        None => cities[0].clone(),
    };

    let batch = match batch {
        Some(batch) => batch,
        None => store.batches(&city)?.first().copied().ok_or_else(|| {
            anyhow!("No records for '{city}'. Stored cities: {}", cities.join(", "))
        })?,
    };

    let filter = RecordFilter { city: Some(city.clone()), fetched_at: Some(batch), from, to };
    let rows = store.query(&filter)?;

    println!("Weather records for {city} (fetched at {})", batch.format(FETCHED_AT_FORMAT));
    print_table(&rows);
    Ok(())
}

fn print_table(rows: &[StoredWeatherRecord]) {
    if rows.is_empty() {
        println!("  (no records match)");
        return;
    }

    println!(
        "{:>6}  {:<10}  {:>7}  {:>7}  {:<28}  {:>8}  {:>8}",
        "id", "date", "temp_c", "temp_f", "condition", "humidity", "wind_kph"
    );
    for row in rows {
        let r = &row.record;
        println!(
            "{:>6}  {:<10}  {:>7.1}  {:>7.1}  {:<28}  {:>8}  {:>8.1}",
            row.id,
            r.date_string(),
            r.temp_c,
            r.temp_f,
            r.condition_text,
            r.humidity,
            r.wind_kph,
        );
    }
}

fn parse_batch(s: &str) -> std::result::Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(s, FETCHED_AT_FORMAT)
        .map_err(|e| format!("expected \"YYYY-MM-DD HH:MM:SS\": {e}"))
}

fn split_cities(input: &str) -> Vec<String> {
    input.split(',').map(str::trim).filter(|c| !c.is_empty()).map(String::from).collect()
}
