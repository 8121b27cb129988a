//! Markdown and JSON report generation.
//!
//! Two reports are produced: a profile of a single barangay (the export
//! offered on the detail view) and a region-wide dashboard summary.

use crate::analysis::{
    build_alerts, coastal_split, distribution_by_municipality, risk_distribution, score_histogram,
    top_risk, Alert, CoastalSplit, RiskCounts, ScoreBucket,
};
use crate::api::Overview;
use crate::models::{AirQualityReading, HazardEntry, Narrative, Record, RiskLevel, Statistics};
use crate::support::store::SupportSummary;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Province shown when a record does not name one.
const DEFAULT_PROVINCE: &str = "Negros Oriental";

/// Rows in the dashboard's top-risk table.
const TOP_RISK_ROWS: usize = 5;

/// Air quality readings shown on the dashboard.
const AIR_QUALITY_ROWS: usize = 3;

/// Report metadata.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    /// Backend the data was read from.
    pub source: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BarangayProfile {
    pub id: Option<i64>,
    pub name: String,
    pub municipality: String,
    pub province: String,
    pub population: Option<u64>,
    pub is_coastal: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResilienceScores {
    pub overall_score: f64,
    pub risk_level: RiskLevel,
    /// Label sent by the server, which may disagree with `risk_level`.
    pub reported_risk_level: Option<String>,
    pub hazard_exposure_score: Option<f64>,
    pub health_sensitivity_score: Option<f64>,
    pub adaptive_capacity_score: Option<f64>,
}

/// Everything exported for one barangay.
#[derive(Debug, Clone, Serialize)]
pub struct BarangayReport {
    pub metadata: ReportMetadata,
    pub barangay: BarangayProfile,
    pub scores: ResilienceScores,
    pub hazards: Vec<HazardEntry>,
    pub analysis: Option<String>,
}

impl BarangayReport {
    pub fn from_record(
        record: &Record,
        analysis: Option<&Narrative>,
        source: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            metadata: ReportMetadata {
                generated_at: now,
                source: source.to_string(),
            },
            barangay: BarangayProfile {
                id: record.id(),
                name: record.name().to_string(),
                municipality: record.municipality().to_string(),
                province: record.province().unwrap_or(DEFAULT_PROVINCE).to_string(),
                population: record.population(),
                is_coastal: record.is_coastal(),
            },
            scores: ResilienceScores {
                overall_score: record.score(),
                risk_level: record.risk_level(),
                reported_risk_level: record.reported_risk_level().map(str::to_string),
                hazard_exposure_score: sub_score(record, "hazard_exposure_score"),
                health_sensitivity_score: sub_score(record, "health_sensitivity_score"),
                adaptive_capacity_score: sub_score(record, "adaptive_capacity_score"),
            },
            hazards: record.hazards(),
            analysis: analysis.and_then(Narrative::text).map(str::to_string),
        }
    }
}

/// Component score from the nested resilience block, else the top level.
fn sub_score(record: &Record, key: &str) -> Option<f64> {
    record
        .resilience()
        .and_then(|r| r.get(key))
        .and_then(Value::as_f64)
        .or_else(|| record.get(key).and_then(Value::as_f64))
}

#[derive(Debug, Clone, Serialize)]
pub struct TopRiskEntry {
    pub name: String,
    pub municipality: String,
    pub score: f64,
    pub risk_level: RiskLevel,
}

impl From<&Record> for TopRiskEntry {
    fn from(record: &Record) -> Self {
        Self {
            name: record.name().to_string(),
            municipality: record.municipality().to_string(),
            score: record.score(),
            risk_level: record.risk_level(),
        }
    }
}

/// Region-wide summary built from an [`Overview`].
#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub metadata: ReportMetadata,
    pub statistics: Option<Statistics>,
    pub barangays_loaded: usize,
    /// False when pagination stopped before the last page.
    pub complete: bool,
    pub distribution: RiskCounts,
    pub by_municipality: BTreeMap<String, RiskCounts>,
    pub histogram: Vec<ScoreBucket>,
    pub coastal: CoastalSplit,
    pub top_risk: Vec<TopRiskEntry>,
    pub air_quality: Vec<AirQualityReading>,
    pub air_quality_analysis: Option<String>,
    pub alerts: Vec<Alert>,
    pub support: Option<SupportSummary>,
}

impl DashboardReport {
    pub fn build(
        overview: &Overview,
        support: Option<SupportSummary>,
        source: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let barangays = &overview.barangays.records;

        // Prefer the server's high-risk list; fall back to ranking everything.
        let ranked = if overview.high_risk.is_empty() {
            top_risk(barangays, TOP_RISK_ROWS)
        } else {
            top_risk(&overview.high_risk, TOP_RISK_ROWS)
        };

        Self {
            metadata: ReportMetadata {
                generated_at: now,
                source: source.to_string(),
            },
            statistics: overview.statistics.clone(),
            barangays_loaded: barangays.len(),
            complete: overview.barangays.is_complete(),
            distribution: risk_distribution(barangays),
            by_municipality: distribution_by_municipality(barangays),
            histogram: score_histogram(barangays),
            coastal: coastal_split(barangays),
            top_risk: ranked.into_iter().map(TopRiskEntry::from).collect(),
            air_quality: overview
                .air_quality
                .iter()
                .take(AIR_QUALITY_ROWS)
                .cloned()
                .collect(),
            air_quality_analysis: overview
                .air_quality_analysis
                .as_ref()
                .and_then(Narrative::text)
                .map(str::to_string),
            alerts: build_alerts(barangays, now),
            support,
        }
    }
}

/// Generate the Markdown export for one barangay.
pub fn generate_barangay_markdown(report: &BarangayReport) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "# Barangay Resilience Report: {}\n\n",
        report.barangay.name
    ));
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_profile_section(&report.barangay));
    output.push_str(&generate_scores_section(&report.scores));
    output.push_str(&generate_hazards_section(&report.hazards));

    if let Some(ref analysis) = report.analysis {
        output.push_str("## AI Analysis\n\n");
        output.push_str(analysis.trim());
        output.push_str("\n\n");
    }

    output.push_str(&generate_footer());
    output
}

/// Generate the Markdown dashboard summary.
pub fn generate_dashboard_markdown(report: &DashboardReport) -> String {
    let mut output = String::new();

    output.push_str("# CRAM Regional Resilience Dashboard\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));

    if !report.complete {
        output.push_str(&format!(
            "> ⚠️ Barangay listing is incomplete: {} record(s) loaded before the backend stopped responding.\n\n",
            report.barangays_loaded
        ));
    }

    if let Some(ref stats) = report.statistics {
        output.push_str(&generate_statistics_section(stats));
    }

    output.push_str(&generate_distribution_section(report));
    output.push_str(&generate_top_risk_section(&report.top_risk));
    output.push_str(&generate_air_quality_section(
        &report.air_quality,
        report.air_quality_analysis.as_deref(),
    ));
    output.push_str(&generate_alerts_section(&report.alerts));

    if let Some(ref support) = report.support {
        output.push_str("## Support Requests\n\n");
        output.push_str(&format!(
            "- **Active:** {}\n- **Critical (active):** {}\n- **Resolved:** {}\n\n",
            support.active, support.critical_active, support.resolved
        ));
    }

    output.push_str(&generate_footer());
    output
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Source:** {}\n\n", metadata.source));

    section
}

fn generate_profile_section(profile: &BarangayProfile) -> String {
    let mut section = String::new();

    section.push_str("## Basic Information\n\n");
    section.push_str(&format!("- **Barangay:** {}\n", profile.name));
    section.push_str(&format!("- **Municipality:** {}\n", profile.municipality));
    section.push_str(&format!("- **Province:** {}\n", profile.province));
    match profile.population {
        Some(population) => section.push_str(&format!("- **Population:** {}\n", population)),
        None => section.push_str("- **Population:** N/A\n"),
    }
    section.push_str(&format!(
        "- **Coastal:** {}\n\n",
        if profile.is_coastal { "Yes" } else { "No" }
    ));

    section
}

fn generate_scores_section(scores: &ResilienceScores) -> String {
    let mut section = String::new();

    section.push_str("## Resilience Scores\n\n");
    section.push_str("| Component | Score |\n");
    section.push_str("|:---|:---:|\n");
    section.push_str(&format!(
        "| **Overall** | **{:.1}** |\n",
        scores.overall_score
    ));
    for (label, value) in [
        ("Hazard Exposure", scores.hazard_exposure_score),
        ("Health Sensitivity", scores.health_sensitivity_score),
        ("Adaptive Capacity", scores.adaptive_capacity_score),
    ] {
        section.push_str(&format!("| {} | {} |\n", label, format_score(value)));
    }
    section.push_str("\n");

    section.push_str(&format!(
        "**Risk Level:** {} {}",
        scores.risk_level.emoji(),
        scores.risk_level
    ));
    if let Some(ref reported) = scores.reported_risk_level {
        if !reported.eq_ignore_ascii_case(&scores.risk_level.to_string()) {
            section.push_str(&format!(" (server reports: {})", reported));
        }
    }
    section.push_str("\n\n");

    section
}

fn generate_hazards_section(hazards: &[HazardEntry]) -> String {
    let mut section = String::new();

    section.push_str("## Hazards\n\n");
    if hazards.is_empty() {
        section.push_str("No hazard data recorded.\n\n");
        return section;
    }

    section.push_str("| Hazard | Susceptibility | Score | Exposure |\n");
    section.push_str("|:---|:---|:---:|:---:|\n");
    for hazard in hazards {
        section.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            hazard.hazard_type.replace('_', " "),
            hazard.susceptibility,
            hazard
                .susceptibility_score
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string()),
            hazard
                .exposure_percentage
                .map(|p| format!("{:.1}%", p))
                .unwrap_or_else(|| "-".to_string()),
        ));
    }
    section.push_str("\n");

    section
}

fn generate_statistics_section(stats: &Statistics) -> String {
    let mut section = String::new();
    let resilience = &stats.resilience_stats;

    section.push_str("## Regional Statistics\n\n");
    section.push_str(&format!("- **Barangays:** {}\n", stats.total_barangays));
    section.push_str(&format!(
        "- **Municipalities:** {}\n",
        stats.total_municipalities
    ));
    section.push_str(&format!(
        "- **Coastal Barangays:** {}\n",
        stats.coastal_barangays
    ));
    section.push_str(&format!(
        "- **Average Resilience Score:** {}\n\n",
        format_score(resilience.avg_score)
    ));

    if !stats.hazard_stats.is_empty() {
        section.push_str("### Hazard Exposure\n\n");
        section.push_str("| Hazard | Barangays |\n");
        section.push_str("|:---|:---:|\n");
        for hazard in &stats.hazard_stats {
            section.push_str(&format!(
                "| {} | {} |\n",
                hazard.hazard_type.replace('_', " "),
                hazard.count
            ));
        }
        section.push_str("\n");
    }

    section
}

fn generate_distribution_section(report: &DashboardReport) -> String {
    let mut section = String::new();
    let counts = &report.distribution;

    section.push_str("## Risk Distribution\n\n");
    section.push_str(&format!(
        "| {} Low | {} Medium | {} High | **Total** |\n",
        RiskLevel::Low.emoji(),
        RiskLevel::Medium.emoji(),
        RiskLevel::High.emoji(),
    ));
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | **{}** |\n\n",
        counts.low,
        counts.medium,
        counts.high,
        counts.total()
    ));
    section.push_str(&format!(
        "Coastal: {} | Inland: {}\n\n",
        report.coastal.coastal, report.coastal.inland
    ));

    if !report.by_municipality.is_empty() {
        section.push_str("### By Municipality\n\n");
        section.push_str("| Municipality | Low | Medium | High |\n");
        section.push_str("|:---|:---:|:---:|:---:|\n");
        for (municipality, counts) in &report.by_municipality {
            section.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                municipality, counts.low, counts.medium, counts.high
            ));
        }
        section.push_str("\n");
    }

    if !report.histogram.is_empty() {
        section.push_str("### Score Histogram\n\n");
        section.push_str("| Score | Barangays |\n");
        section.push_str("|:---|:---:|\n");
        for bucket in &report.histogram {
            section.push_str(&format!("| {} | {} |\n", bucket.range, bucket.count));
        }
        section.push_str("\n");
    }

    section
}

fn generate_top_risk_section(entries: &[TopRiskEntry]) -> String {
    if entries.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Highest Risk Barangays\n\n");
    section.push_str("| # | Barangay | Municipality | Score | Risk |\n");
    section.push_str("|:---:|:---|:---|:---:|:---|\n");
    for (i, entry) in entries.iter().enumerate() {
        section.push_str(&format!(
            "| {} | {} | {} | {:.1} | {} {} |\n",
            i + 1,
            entry.name,
            entry.municipality,
            entry.score,
            entry.risk_level.emoji(),
            entry.risk_level
        ));
    }
    section.push_str("\n");

    section
}

fn generate_air_quality_section(readings: &[AirQualityReading], analysis: Option<&str>) -> String {
    if readings.is_empty() && analysis.is_none() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Air Quality\n\n");
    if !readings.is_empty() {
        section.push_str("| Municipality | Period | AQI | Band |\n");
        section.push_str("|:---|:---:|:---:|:---|\n");
        for reading in readings {
            section.push_str(&format!(
                "| {} | {}-{:02} | {:.1} | {} |\n",
                reading.municipality(),
                reading.year,
                reading.month,
                reading.avg_aqi,
                reading.aqi_label()
            ));
        }
        section.push_str("\n");
    }
    if let Some(text) = analysis {
        section.push_str(&format!("> {}\n\n", text.trim().replace('\n', "\n> ")));
    }

    section
}

fn generate_alerts_section(alerts: &[Alert]) -> String {
    let mut section = String::new();

    section.push_str("## Alerts\n\n");
    if alerts.is_empty() {
        section.push_str("No active risk alerts.\n\n");
        return section;
    }

    for alert in alerts {
        section.push_str(&format!(
            "- {} **{}**: {}\n",
            alert.kind.emoji(),
            alert.title,
            alert.message
        ));
    }
    section.push_str("\n");

    section
}

fn generate_footer() -> String {
    "---\n\n*Report generated by CRAM, the Climate Resilience Action Matrix*\n".to_string()
}

fn format_score(score: Option<f64>) -> String {
    score
        .map(|s| format!("{:.1}", s))
        .unwrap_or_else(|| "N/A".to_string())
}

/// Generate a JSON report.
pub fn generate_json_report<T: Serialize>(report: &T) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write rendered report content to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::pagination::{PageWalk, WalkEnd};
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_record(id: i64, name: &str, score: f64, coastal: bool) -> Record {
        Record::from_value(json!({
            "id": id,
            "name": name,
            "municipality": "Dumaguete City",
            "population": 4200,
            "is_coastal": coastal,
            "resilience_score": score,
        }))
        .unwrap()
    }

    fn create_test_overview() -> Overview {
        Overview {
            statistics: Some(Statistics {
                total_barangays: 3,
                total_municipalities: 1,
                coastal_barangays: 1,
                ..Statistics::default()
            }),
            high_risk: Vec::new(),
            air_quality: Vec::new(),
            barangays: PageWalk {
                records: vec![
                    create_test_record(1, "Bantayan", 72.0, true),
                    create_test_record(2, "Daro", 35.0, false),
                    create_test_record(3, "Piapi", 12.0, false),
                ],
                pages_fetched: 1,
                end: WalkEnd::Exhausted,
            },
            air_quality_analysis: None,
        }
    }

    #[test]
    fn test_barangay_report_from_detail() {
        let record = Record::from_value(json!({
            "type": "Feature",
            "id": 9,
            "geometry": null,
            "properties": {
                "name": "Looc",
                "municipality_name": "Dumaguete City",
                "is_coastal": true,
                "resilience": {
                    "overall_score": 55.0,
                    "risk_level": "High",
                    "hazard_exposure_score": 61.5,
                    "adaptive_capacity_score": 40.0
                },
                "hazards": [
                    {"hazard_type": "storm_surge", "susceptibility": "High", "susceptibility_score": 3}
                ]
            }
        }))
        .unwrap();
        let narrative = Narrative(json!({"analysis": "Prioritize evacuation routes."}));

        let report = BarangayReport::from_record(&record, Some(&narrative), "test", Utc::now());

        assert_eq!(report.barangay.id, Some(9));
        assert_eq!(report.barangay.province, DEFAULT_PROVINCE);
        assert_eq!(report.scores.overall_score, 55.0);
        assert_eq!(report.scores.risk_level, RiskLevel::High);
        assert_eq!(report.scores.hazard_exposure_score, Some(61.5));
        assert_eq!(report.scores.health_sensitivity_score, None);
        assert_eq!(report.hazards.len(), 1);

        let markdown = generate_barangay_markdown(&report);
        assert!(markdown.contains("# Barangay Resilience Report: Looc"));
        assert!(markdown.contains("## Basic Information"));
        assert!(markdown.contains("- **Population:** N/A"));
        assert!(markdown.contains("| Hazard Exposure | 61.5 |"));
        assert!(markdown.contains("| Health Sensitivity | N/A |"));
        assert!(markdown.contains("storm surge"));
        assert!(markdown.contains("## AI Analysis"));
        assert!(!markdown.contains("server reports"));
    }

    #[test]
    fn test_reported_level_mismatch_is_shown() {
        let record = Record::from_value(json!({
            "name": "Tabuc-tubig",
            "resilience_score": 45.0,
            "risk_level": "High"
        }))
        .unwrap();

        let report = BarangayReport::from_record(&record, None, "test", Utc::now());
        let section = generate_scores_section(&report.scores);

        assert!(section.contains("Medium"));
        assert!(section.contains("(server reports: High)"));
    }

    #[test]
    fn test_dashboard_report() {
        let overview = create_test_overview();
        let report = DashboardReport::build(&overview, None, "test", Utc::now());

        assert!(report.complete);
        assert_eq!(report.barangays_loaded, 3);
        assert_eq!(report.distribution.high, 1);
        assert_eq!(report.distribution.medium, 1);
        assert_eq!(report.distribution.low, 1);
        assert_eq!(report.top_risk[0].name, "Bantayan");
        // 72 coastal: one critical and one coastal alert.
        assert_eq!(report.alerts.len(), 2);

        let markdown = generate_dashboard_markdown(&report);
        assert!(markdown.contains("## Regional Statistics"));
        assert!(markdown.contains("## Risk Distribution"));
        assert!(markdown.contains("| 70-80 | 1 |"));
        assert!(markdown.contains("## Highest Risk Barangays"));
        assert!(!markdown.contains("## Support Requests"));
        assert!(!markdown.contains("incomplete"));
    }

    #[test]
    fn test_dashboard_marks_partial_listing() {
        let mut overview = create_test_overview();
        overview.barangays.end = WalkEnd::Failed("HTTP 500".to_string());
        let support = SupportSummary {
            active: 2,
            resolved: 1,
            critical_active: 1,
        };

        let report = DashboardReport::build(&overview, Some(support), "test", Utc::now());
        let markdown = generate_dashboard_markdown(&report);

        assert!(!report.complete);
        assert!(markdown.contains("incomplete"));
        assert!(markdown.contains("## Support Requests"));
        assert!(markdown.contains("- **Active:** 2"));
    }

    #[test]
    fn test_generate_json_report() {
        let report = DashboardReport::build(&create_test_overview(), None, "test", Utc::now());
        let json = generate_json_report(&report).unwrap();

        assert!(json.contains("\"distribution\""));
        assert!(json.contains("\"top_risk\""));
        assert!(json.contains("\"alerts\""));
    }

    #[test]
    fn test_write_report_creates_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("report.md");

        write_report("# Report\n", &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Report\n");
    }
}
