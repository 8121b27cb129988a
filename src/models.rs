//! Data models for the resilience dashboard.
//!
//! This module contains the core data structures shared across the
//! application: normalized barangay records, statistics, air quality
//! readings and AI narratives returned by the backend.

use crate::analysis::risk;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Risk bucket derived from a resilience score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    /// Score below the medium threshold
    Low,
    /// Score between the medium and high thresholds
    Medium,
    /// Score at or above the high threshold
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "Low"),
            RiskLevel::Medium => write!(f, "Medium"),
            RiskLevel::High => write!(f, "High"),
        }
    }
}

impl RiskLevel {
    /// Returns an emoji representation of the risk level.
    pub fn emoji(&self) -> &'static str {
        match self {
            RiskLevel::Low => "🟢",
            RiskLevel::Medium => "🟡",
            RiskLevel::High => "🔴",
        }
    }

    /// All levels, lowest first.
    pub fn all() -> [RiskLevel; 3] {
        [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High]
    }
}

/// A hazard exposure entry attached to a barangay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardEntry {
    /// Hazard kind (flood, cyclone, landslide, storm_surge).
    #[serde(default = "unknown")]
    pub hazard_type: String,
    /// Susceptibility label as reported by the source agency.
    #[serde(default = "unknown")]
    pub susceptibility: String,
    /// Susceptibility on a 1-4 scale, when provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub susceptibility_score: Option<i64>,
    /// Share of the barangay area exposed, when provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposure_percentage: Option<f64>,
}

fn unknown() -> String {
    "Unknown".to_string()
}

/// One administrative area as a flat attribute map.
///
/// Records come from the backend either bare or wrapped in a GeoJSON
/// `Feature`. Both shapes are unwrapped into this one form; the geometry
/// payload is kept alongside when present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Server attributes (the Feature `properties`, or the bare object).
    pub attributes: Map<String, Value>,
    /// GeoJSON geometry, if the record arrived as a Feature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Value>,
}

impl Record {
    /// Normalize one listing item into a record.
    ///
    /// Returns `None` for items that are not JSON objects.
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(mut object) = value else {
            return None;
        };

        if is_feature(&object) {
            let geometry = object.remove("geometry").filter(|g| !g.is_null());
            let mut attributes = match object.remove("properties") {
                Some(Value::Object(props)) => props,
                _ => Map::new(),
            };
            if !attributes.contains_key("id") {
                if let Some(id) = object.remove("id") {
                    attributes.insert("id".to_string(), id);
                }
            }
            Some(Self {
                attributes,
                geometry,
            })
        } else {
            Some(Self {
                attributes: object,
                geometry: None,
            })
        }
    }

    /// Raw attribute lookup.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key).filter(|v| !v.is_null())
    }

    /// Numeric identifier, if the server sent one.
    pub fn id(&self) -> Option<i64> {
        self.get("id").and_then(Value::as_i64)
    }

    /// Identifier rendered as a string, accepting numeric or string ids.
    pub fn id_key(&self) -> Option<String> {
        match self.get("id")? {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }

    /// Display name, `"Unknown"` when absent.
    pub fn name(&self) -> &str {
        self.str_attr("name").unwrap_or("Unknown")
    }

    /// Municipality name, `"Unknown"` when absent.
    pub fn municipality(&self) -> &str {
        self.str_attr("municipality")
            .or_else(|| self.str_attr("municipality_name"))
            .unwrap_or("Unknown")
    }

    pub fn province(&self) -> Option<&str> {
        self.str_attr("province")
    }

    pub fn population(&self) -> Option<u64> {
        self.get("population").and_then(Value::as_u64)
    }

    pub fn is_coastal(&self) -> bool {
        self.get("is_coastal")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Resilience score as sent by the server, if any.
    ///
    /// Reads `resilience_score`, then `overall_score`, then the nested
    /// `resilience.overall_score` of detail responses.
    pub fn raw_score(&self) -> Option<f64> {
        self.get("resilience_score")
            .and_then(Value::as_f64)
            .or_else(|| self.get("overall_score").and_then(Value::as_f64))
            .or_else(|| {
                self.resilience()
                    .and_then(|r| r.get("overall_score"))
                    .and_then(Value::as_f64)
            })
    }

    /// Resilience score with the display default of 0.
    pub fn score(&self) -> f64 {
        risk::effective_score(self.raw_score())
    }

    /// Risk bucket for this record's score.
    pub fn risk_level(&self) -> RiskLevel {
        risk::classify(self.raw_score())
    }

    /// The `risk_level` label as reported by the server, if any.
    pub fn reported_risk_level(&self) -> Option<&str> {
        self.str_attr("risk_level").or_else(|| {
            self.resilience()
                .and_then(|r| r.get("risk_level"))
                .and_then(Value::as_str)
        })
    }

    /// Nested resilience breakdown of detail responses.
    pub fn resilience(&self) -> Option<&Map<String, Value>> {
        self.get("resilience").and_then(Value::as_object)
    }

    /// Hazard entries; malformed entries are skipped.
    pub fn hazards(&self) -> Vec<HazardEntry> {
        self.get("hazards")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|h| serde_json::from_value(h.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn str_attr(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }
}

fn is_feature(object: &Map<String, Value>) -> bool {
    object.get("type").and_then(Value::as_str) == Some("Feature")
}

/// Aggregate resilience figures from `/barangays/statistics/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResilienceStats {
    #[serde(default)]
    pub avg_score: Option<f64>,
    #[serde(default)]
    pub avg_hazard: Option<f64>,
    #[serde(default)]
    pub avg_health: Option<f64>,
    #[serde(default)]
    pub avg_capacity: Option<f64>,
    #[serde(default)]
    pub high_risk: u64,
    #[serde(default)]
    pub medium_risk: u64,
    #[serde(default)]
    pub low_risk: u64,
}

/// Count of barangays per hazard type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HazardCount {
    pub hazard_type: String,
    #[serde(default)]
    pub count: u64,
}

/// Number of records loaded per hazard layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HazardCoverage {
    #[serde(default)]
    pub noah_flood: u64,
    #[serde(default)]
    pub storm_surge: u64,
    #[serde(default)]
    pub liquefaction: u64,
    #[serde(default)]
    pub landslide: u64,
}

/// Region-wide statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Statistics {
    #[serde(default)]
    pub resilience_stats: ResilienceStats,
    #[serde(default)]
    pub hazard_stats: Vec<HazardCount>,
    #[serde(default)]
    pub hazard_coverage: HazardCoverage,
    #[serde(default)]
    pub total_barangays: u64,
    #[serde(default)]
    pub total_municipalities: u64,
    #[serde(default)]
    pub coastal_barangays: u64,
}

/// Monthly air quality average for one municipality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirQualityReading {
    #[serde(default)]
    pub municipality_name: Option<String>,
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub month: u32,
    /// AQI on the 1 (good) to 5 (very poor) scale.
    #[serde(default)]
    pub avg_aqi: f64,
    #[serde(default)]
    pub avg_pm25: Option<f64>,
    #[serde(default)]
    pub avg_pm10: Option<f64>,
    #[serde(default)]
    pub avg_o3: Option<f64>,
    #[serde(default)]
    pub avg_no2: Option<f64>,
    #[serde(default)]
    pub avg_co: Option<f64>,
}

impl AirQualityReading {
    /// Municipality label, `"Unknown"` when absent.
    pub fn municipality(&self) -> &str {
        self.municipality_name.as_deref().unwrap_or("Unknown")
    }

    /// Human label for the AQI band.
    pub fn aqi_label(&self) -> &'static str {
        match self.avg_aqi.round() as i64 {
            i64::MIN..=1 => "Good",
            2 => "Fair",
            3 => "Moderate",
            4 => "Poor",
            _ => "Very Poor",
        }
    }
}

/// An AI-generated narrative returned by the backend.
///
/// The body shape differs per endpoint, so it is kept as raw JSON with
/// accessors for the fields every narrative carries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Narrative(pub Value);

impl Narrative {
    /// The generated text (`analysis` or `report` field).
    pub fn text(&self) -> Option<&str> {
        self.0
            .get("analysis")
            .or_else(|| self.0.get("report"))
            .and_then(Value::as_str)
    }

    pub fn generated_at(&self) -> Option<&str> {
        self.0.get("generated_at").and_then(Value::as_str)
    }
}
