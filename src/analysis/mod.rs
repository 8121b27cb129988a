//! Analysis modules.
//!
//! Risk classification plus the display aggregates and alerts built
//! from aggregated records.

pub mod alerts;
pub mod distribution;
pub mod risk;

pub use alerts::{build_alerts, Alert};
pub use distribution::*;
