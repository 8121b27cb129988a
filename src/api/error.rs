//! Errors raised while fetching from the backend or weather service.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request to {url} timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },

    #[error("cannot connect to {url}. Is the backend running?")]
    Connect { url: String },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("failed to decode response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

impl FetchError {
    /// Classify a reqwest error the same way for every endpoint.
    pub fn from_reqwest(url: &str, timeout_seconds: u64, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                seconds: timeout_seconds,
            }
        } else if error.is_builder() {
            FetchError::InvalidUrl {
                url: url.to_string(),
                reason: error.to_string(),
            }
        } else if error.is_connect() {
            FetchError::Connect {
                url: url.to_string(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                source: error,
            }
        }
    }
}
