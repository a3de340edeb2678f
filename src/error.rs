// Error types shared by the library modules.
//
// Configuration problems are fatal and surface before any network call.
// API errors keep enough detail to tell apart an error response from the
// management API, a request that never got a response, and a request that
// could not even be built.

use std::path::PathBuf;
use thiserror::Error;

/// Problems found while reading or validating the migration config file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config file {path} is not valid JSON")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        ConfigError::Invalid(msg.into())
    }
}

/// Failure of a single call against the management API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The remote API answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// No response was received (connection refused, reset, timeout, or the
    /// body could not be read).
    #[error("no response received: {message}")]
    NoResponse { message: String },

    /// The request could not be constructed or sent at all.
    #[error("request could not be built: {message}")]
    Request { message: String },

    /// The remote API answered with a success status but an unexpected body.
    #[error("unexpected response body: {message}")]
    Decode { message: String },
}

impl ApiError {
    /// Render the error body of a `Status` response the way the management API
    /// reports it: the `error.message` field plus any violation details.
    pub fn violation_details(&self) -> Option<String> {
        let ApiError::Status { body, .. } = self else {
            return None;
        };
        let parsed: serde_json::Value = serde_json::from_str(body).ok()?;
        let error = parsed.get("error")?;
        let mut out = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or_default()
            .to_string();
        if let Some(details) = error.get("details").and_then(|d| d.as_array()) {
            for violation in details
                .iter()
                .filter_map(|d| d.get("violations").and_then(|v| v.as_array()))
                .flatten()
            {
                let description = violation
                    .get("description")
                    .and_then(|d| d.as_str())
                    .unwrap_or_default();
                out.push_str(&format!("\n  - {description}"));
            }
        }
        Some(out)
    }
}
