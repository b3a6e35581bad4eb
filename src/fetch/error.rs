//! Error types for the retrying HTTP client.
//!
//! A single attempt fails with [`RequestError`]; once every attempt is
//! exhausted the client surfaces [`FetchFailed`], which is always fatal to
//! the calling operation.

use thiserror::Error;

/// Failure of one HTTP attempt.
#[derive(Debug, Error)]
pub enum RequestError {
    /// Network-level error (DNS resolution, connection refused, TLS, etc.)
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-success HTTP status (4xx client errors, 5xx server errors).
    #[error("HTTP {status} requesting {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Success status but the response body was rejected by the caller's
    /// validator (e.g. an empty-but-200 listing fragment).
    #[error("response failed validation for {url}")]
    Validation {
        /// The URL whose body failed validation.
        url: String,
    },
}

impl RequestError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a validation rejection.
    pub fn validation(url: impl Into<String>) -> Self {
        Self::Validation { url: url.into() }
    }

    /// Short description used in retry warnings.
    pub(crate) fn brief(&self) -> String {
        match self {
            Self::Network { source, .. } => {
                let text = source.to_string();
                if text.trim().is_empty() {
                    "network error".to_string()
                } else {
                    text
                }
            }
            Self::Timeout { .. } => "timed out".to_string(),
            Self::HttpStatus { status, .. } => format!("HTTP {status}"),
            Self::Validation { .. } => "response failed validation".to_string(),
        }
    }
}

// Note: no `From<reqwest::Error>` impl. The variants need URL context that
// the source error does not carry, so callers go through the constructors.

/// All attempts for one HTTP call were exhausted. Always fatal to the run.
#[derive(Debug, Error)]
#[error("unable to complete {purpose} for {url} after {attempts} attempts")]
pub struct FetchFailed {
    /// Human-readable label for what the request was for.
    pub purpose: String,
    /// The URL that could not be fetched.
    pub url: String,
    /// How many attempts were made.
    pub attempts: u32,
    /// The error from the final attempt.
    #[source]
    pub last_error: RequestError,
}
