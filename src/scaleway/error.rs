//! Error types for the Scaleway API client.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised by the Scaleway Instances API client.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ScalewayApiError {
    /// Raised when the supplied configuration is incomplete.
    #[error("configuration error: {0}")]
    Config(String),
    /// Raised when the request never produced an HTTP response.
    #[error("transport failure calling {endpoint}: {message}")]
    Transport {
        /// Endpoint label (for example `list servers`).
        endpoint: &'static str,
        /// Message reported by the HTTP client.
        message: String,
    },
    /// Raised when the API answered with a non-success status.
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        /// Endpoint label (for example `create server`).
        endpoint: &'static str,
        /// Numeric HTTP status code.
        status: u16,
        /// Response body as returned by the API.
        body: String,
    },
    /// Raised when a success response body did not match the expected shape.
    #[error("failed to decode {endpoint} response: {message}")]
    Decode {
        /// Endpoint label (for example `list servers`).
        endpoint: &'static str,
        /// Parser error message.
        message: String,
    },
}

impl From<ConfigError> for ScalewayApiError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}
