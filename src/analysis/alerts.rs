//! Risk alerts derived from barangay scores.

use crate::models::Record;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Scores at or above this raise a critical alert.
pub const CRITICAL_ALERT_THRESHOLD: f64 = 70.0;

/// Scores at or above this raise a warning (when not critical).
pub const WARNING_ALERT_THRESHOLD: f64 = 50.0;

/// Coastal barangays at or above this raise a coastal alert.
pub const COASTAL_ALERT_THRESHOLD: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Critical,
    Warning,
    Coastal,
}

impl AlertKind {
    pub fn emoji(&self) -> &'static str {
        match self {
            AlertKind::Critical => "🚨",
            AlertKind::Warning => "⚠️",
            AlertKind::Coastal => "🌊",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::Critical => write!(f, "Critical"),
            AlertKind::Warning => write!(f, "Warning"),
            AlertKind::Coastal => write!(f, "Coastal"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub id: String,
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
    pub barangay: String,
    pub timestamp: DateTime<Utc>,
}

/// Build alerts for every record, at most one pass per barangay id.
///
/// Records without an id are keyed by their position (`brgy-<index>`).
pub fn build_alerts(records: &[Record], now: DateTime<Utc>) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for (index, record) in records.iter().enumerate() {
        let key = record
            .id_key()
            .unwrap_or_else(|| format!("brgy-{}", index));
        if !seen.insert(key.clone()) {
            continue;
        }

        let score = record.score();
        let name = record.name();

        if score >= CRITICAL_ALERT_THRESHOLD {
            alerts.push(Alert {
                id: format!("critical-{}", key),
                kind: AlertKind::Critical,
                title: "Critical Risk Alert".to_string(),
                message: format!("{} has a very high BRRS score of {:.1}", name, score),
                barangay: name.to_string(),
                timestamp: now,
            });
        } else if score >= WARNING_ALERT_THRESHOLD {
            alerts.push(Alert {
                id: format!("high-{}", key),
                kind: AlertKind::Warning,
                title: "High Risk Warning".to_string(),
                message: format!("{} requires immediate attention (BRRS: {:.1})", name, score),
                barangay: name.to_string(),
                timestamp: now,
            });
        }

        if record.is_coastal() && score >= COASTAL_ALERT_THRESHOLD {
            alerts.push(Alert {
                id: format!("coastal-{}", key),
                kind: AlertKind::Coastal,
                title: "Coastal Risk Alert".to_string(),
                message: format!("{} is coastal with elevated risk (BRRS: {:.1})", name, score),
                barangay: name.to_string(),
                timestamp: now,
            });
        }
    }

    alerts
}

/// Remove one alert by id. Returns whether anything was removed.
pub fn dismiss(alerts: &mut Vec<Alert>, alert_id: &str) -> bool {
    let before = alerts.len();
    alerts.retain(|a| a.id != alert_id);
    alerts.len() != before
}
