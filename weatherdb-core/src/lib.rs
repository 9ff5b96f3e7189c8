//! Core library for the `weatherdb` CLI.
//!
//! This crate defines:
//! - Configuration handling
//! - The WeatherAPI.com client behind the `WeatherProvider` trait
//! - SQLite storage of normalized daily records
//! - The ingestion pipeline tying the two together
//!
//! It is used by `weatherdb-cli`, but can also be reused by other binaries or services.

pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod store;

pub use config::Config;
pub use error::WeatherError;
pub use model::{StoredWeatherRecord, TableSummary, WeatherRecord};
pub use pipeline::{FetchFailure, FetchKind, IngestConfig, IngestReport, Pipeline};
pub use provider::{WeatherProvider, provider_from_config};
pub use store::{RecordFilter, WeatherStore};
