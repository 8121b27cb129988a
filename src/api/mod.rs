//! Backend API access.
//!
//! The client, the paginated listing walker it is built on, and the
//! error type every fetch returns.

pub mod client;
pub mod error;
pub mod pagination;

pub use client::{ApiClient, HazardLayer, MunicipalityLookup, Overview};
pub use error::FetchError;
pub use pagination::PageWalk;
