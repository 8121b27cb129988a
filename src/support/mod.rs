//! Mutual-aid support requests and their local storage.

pub mod storage;
pub mod store;

pub use store::{NewSupportRequest, RequestStatus, ResourceType, SupportStore, Urgency};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("stored data is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("no support request with id {0}")]
    NotFound(i64),
}
