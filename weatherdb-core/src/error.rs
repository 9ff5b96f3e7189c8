//! Error taxonomy shared by the client, the store and the pipeline.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WeatherError {
    /// The request never produced a response (DNS, connect, timeout, body read).
    #[error("WeatherAPI {operation} request failed: {source}")]
    Request {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The upstream answered with a non-success status.
    #[error("WeatherAPI {operation} request failed with status {status}: {body}")]
    Status {
        operation: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("Unexpected WeatherAPI {operation} response: {reason}")]
    Schema {
        operation: &'static str,
        reason: String,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl WeatherError {
    /// Network or HTTP-status failure.
    pub fn is_request_error(&self) -> bool {
        matches!(self, Self::Request { .. } | Self::Status { .. })
    }

    pub fn is_schema_error(&self) -> bool {
        matches!(self, Self::Schema { .. })
    }

    /// Short label used in log fields.
    pub fn kind(&self) -> &'static str {
        if self.is_request_error() {
            "request"
        } else if self.is_schema_error() {
            "schema"
        } else {
            "storage"
        }
    }
}

pub type Result<T> = std::result::Result<T, WeatherError>;
