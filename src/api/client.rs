//! Backend REST/GeoJSON API client.
//!
//! Typed accessors for every endpoint the dashboard reads. Listings go
//! through the pagination walker; single-shot endpoints return typed
//! bodies or a [`FetchError`].

use crate::api::error::FetchError;
use crate::api::pagination::{self, PageSource, PageWalk};
use crate::models::{AirQualityReading, Narrative, Record, Statistics};
use anyhow::{Context, Result};
use futures::join;
use indicatif::ProgressBar;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Hazard layers served by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HazardLayer {
    /// Project NOAH flood susceptibility
    NoahFlood,
    StormSurge,
    Liquefaction,
    Landslide,
}

impl HazardLayer {
    fn path(&self) -> &'static str {
        match self {
            HazardLayer::NoahFlood => "noah-flood/",
            HazardLayer::StormSurge => "storm-surge/",
            HazardLayer::Liquefaction => "liquefaction/",
            HazardLayer::Landslide => "hazards/?hazard_type=landslide",
        }
    }
}

impl fmt::Display for HazardLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HazardLayer::NoahFlood => write!(f, "NOAH Flood"),
            HazardLayer::StormSurge => write!(f, "Storm Surge"),
            HazardLayer::Liquefaction => write!(f, "Liquefaction"),
            HazardLayer::Landslide => write!(f, "Landslide"),
        }
    }
}

/// Everything the dashboard page shows, fetched together.
#[derive(Debug)]
pub struct Overview {
    pub statistics: Option<Statistics>,
    pub high_risk: Vec<Record>,
    pub air_quality: Vec<AirQualityReading>,
    pub barangays: PageWalk,
    /// Air quality narrative; `None` if skipped or failed.
    pub air_quality_analysis: Option<Narrative>,
}

/// Every municipality's latest air quality, with the optional narrative.
#[derive(Debug, Serialize)]
pub struct AirQualityView {
    pub readings: Vec<AirQualityReading>,
    pub analysis: Option<Narrative>,
}

/// A municipality profile from the listing plus its AI report.
#[derive(Debug, Serialize)]
pub struct MunicipalityDetail {
    pub municipality: Record,
    /// `None` if skipped or failed.
    pub report: Option<Narrative>,
}

/// Outcome of looking up one municipality in the listing.
#[derive(Debug)]
pub enum MunicipalityLookup {
    Found(MunicipalityDetail),
    /// Not in the listing; the walk says whether the listing was complete.
    Missing(PageWalk),
}

/// Keep a narrative, or log why it is unavailable.
fn optional_narrative(result: Result<Narrative, FetchError>, what: &str) -> Option<Narrative> {
    match result {
        Ok(narrative) => Some(narrative),
        Err(e) => {
            warn!("{} failed: {}", what, e);
            None
        }
    }
}

/// Client for the CRAM backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    timeout_seconds: u64,
}

impl ApiClient {
    /// Create a client for the API rooted at `base_url`.
    pub fn new(base_url: &str, timeout_seconds: u64) -> Result<Self> {
        Url::parse(base_url).with_context(|| format!("Invalid API URL: {}", base_url))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_seconds,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute address of `path` with `format=json` requested.
    pub fn endpoint(&self, path: &str) -> String {
        with_format_json(&format!(
            "{}/{}",
            self.base_url,
            path.trim_start_matches('/')
        ))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let url = self.endpoint(path);
        send_json(self.http.get(&url), &url, self.timeout_seconds).await
    }

    /// Every barangay, all pages.
    pub async fn barangays(&self, progress: Option<&ProgressBar>) -> PageWalk {
        let walk =
            pagination::collect_all_pages(self, &self.endpoint("barangays/"), progress)
                .await;
        info!("Barangays loaded: {}", walk.records.len());
        walk
    }

    /// Every municipality, all pages.
    pub async fn municipalities(&self, progress: Option<&ProgressBar>) -> PageWalk {
        pagination::collect_all_pages(
            self,
            &self.endpoint("municipalities/"),
            progress,
        )
        .await
    }

    /// One barangay with its resilience breakdown and hazards.
    pub async fn barangay(&self, id: i64) -> Result<Record, FetchError> {
        let path = format!("barangays/{}/", id);
        let body: Value = self.get(&path).await?;
        Record::from_value(body).ok_or_else(|| FetchError::Decode {
            url: self.endpoint(&path),
            reason: "expected a JSON object".to_string(),
        })
    }

    pub async fn barangay_ai_analysis(&self, id: i64) -> Result<Narrative, FetchError> {
        self.get(&format!("barangays/{}/ai_analysis/", id)).await
    }

    pub async fn municipality_ai_report(&self, id: i64) -> Result<Narrative, FetchError> {
        self.get(&format!("municipalities/{}/ai_report/", id)).await
    }

    /// Barangays the backend rates High risk.
    pub async fn high_risk(&self) -> Result<Vec<Record>, FetchError> {
        let body: Value = self.get("barangays/high_risk/").await?;
        Ok(pagination::records_from_body(body))
    }

    pub async fn statistics(&self) -> Result<Statistics, FetchError> {
        self.get("barangays/statistics/").await
    }

    /// Latest monthly air quality for every municipality.
    pub async fn air_quality(&self) -> Result<Vec<AirQualityReading>, FetchError> {
        self.get("air-quality/latest/").await
    }

    pub async fn air_quality_ai_analysis(&self) -> Result<Narrative, FetchError> {
        self.get("air-quality/ai_analysis/").await
    }

    /// One hazard layer. Failures are logged and yield an empty layer.
    pub async fn hazard_layer(&self, layer: HazardLayer) -> Vec<Record> {
        match self.get::<Value>(layer.path()).await {
            Ok(body) => pagination::records_from_body(body),
            Err(e) => {
                warn!("Error fetching {} layer: {}", layer, e);
                Vec::new()
            }
        }
    }

    /// Tropical cyclone tracks that affected the province.
    pub async fn cyclone_tracks(&self) -> Result<Vec<Record>, FetchError> {
        let body: Value = self.get("cyclone-tracks/affecting_negros/").await?;
        Ok(pagination::records_from_body(body))
    }

    /// Fetch the dashboard data concurrently.
    ///
    /// Statistics, the high-risk list, air quality and the full barangay
    /// listing are requested together. The air quality narrative is
    /// fetched afterwards when `with_narrative` is set; its failure only
    /// leaves the narrative empty.
    pub async fn overview(&self, with_narrative: bool, progress: Option<&ProgressBar>) -> Overview {
        let (statistics, high_risk, air_quality, barangays) = join!(
            self.statistics(),
            self.high_risk(),
            self.air_quality(),
            self.barangays(progress)
        );

        let statistics = statistics
            .map_err(|e| warn!("Statistics unavailable: {}", e))
            .ok();
        let high_risk = high_risk.unwrap_or_else(|e| {
            warn!("High-risk list unavailable: {}", e);
            Vec::new()
        });
        let air_quality = air_quality.unwrap_or_else(|e| {
            warn!("Air quality unavailable: {}", e);
            Vec::new()
        });

        let air_quality_analysis = if with_narrative {
            optional_narrative(self.air_quality_ai_analysis().await, "AI analysis")
        } else {
            None
        };

        Overview {
            statistics,
            high_risk,
            air_quality,
            barangays,
            air_quality_analysis,
        }
    }

    /// Every air quality reading. The narrative is fetched afterwards when
    /// `with_analysis` is set and never fails the view.
    pub async fn air_quality_view(&self, with_analysis: bool) -> Result<AirQualityView, FetchError> {
        let readings = self.air_quality().await?;
        let analysis = if with_analysis {
            optional_narrative(self.air_quality_ai_analysis().await, "AI analysis")
        } else {
            None
        };
        Ok(AirQualityView { readings, analysis })
    }

    /// Find municipality `id` in the full listing and attach its AI report.
    ///
    /// The report is only requested once the municipality is found; a
    /// report failure leaves `report` empty.
    pub async fn municipality_detail(
        &self,
        id: i64,
        with_report: bool,
        progress: Option<&ProgressBar>,
    ) -> MunicipalityLookup {
        let mut walk = self.municipalities(progress).await;
        let Some(index) = walk.records.iter().position(|r| r.id() == Some(id)) else {
            return MunicipalityLookup::Missing(walk);
        };
        let municipality = walk.records.swap_remove(index);

        let report = if with_report {
            optional_narrative(self.municipality_ai_report(id).await, "AI report")
        } else {
            None
        };

        MunicipalityLookup::Found(MunicipalityDetail {
            municipality,
            report,
        })
    }
}

impl PageSource for ApiClient {
    async fn fetch_page(&self, url: &str) -> Result<Value, FetchError> {
        send_json(self.http.get(url), url, self.timeout_seconds).await
    }
}

/// Send a request and decode a JSON body, mapping every failure to a
/// [`FetchError`].
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    url: &str,
    timeout_seconds: u64,
) -> Result<T, FetchError> {
    debug!("GET {}", url);

    let response = request
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(url, timeout_seconds, e))?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(FetchError::Status {
            url: url.to_string(),
            status,
            body,
        });
    }

    response.json::<T>().await.map_err(|e| FetchError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// Add `format=json` to a URL's query unless it is already there.
pub fn with_format_json(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            if !parsed.query_pairs().any(|(k, _)| k == "format") {
                let rest: Vec<(String, String)> = parsed
                    .query_pairs()
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect();
                let mut pairs = parsed.query_pairs_mut();
                pairs.clear().append_pair("format", "json");
                for (k, v) in &rest {
                    pairs.append_pair(k, v);
                }
            }
            parsed.to_string()
        }
        Err(_) if url.contains("format=") => url.to_string(),
        Err(_) if url.contains('?') => format!("{}&format=json", url),
        Err(_) => format!("{}?format=json", url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::pagination::WalkEnd;
    use crate::testing::spawn_json_server;
    use serde_json::json;

    #[test]
    fn test_with_format_json() {
        assert_eq!(
            with_format_json("http://127.0.0.1:8000/api/barangays/"),
            "http://127.0.0.1:8000/api/barangays/?format=json"
        );
        assert_eq!(
            with_format_json("http://h/api/hazards/?hazard_type=landslide"),
            "http://h/api/hazards/?format=json&hazard_type=landslide"
        );
        assert_eq!(
            with_format_json("http://h/api/x/?format=json&page=2"),
            "http://h/api/x/?format=json&page=2"
        );
    }

    #[test]
    fn test_endpoint_joins_paths() {
        let client = ApiClient::new("http://127.0.0.1:8000/api/", 5).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:8000/api");
        assert_eq!(
            client.endpoint("/barangays/statistics/"),
            "http://127.0.0.1:8000/api/barangays/statistics/?format=json"
        );
        assert_eq!(
            client.endpoint(HazardLayer::Landslide.path()),
            "http://127.0.0.1:8000/api/hazards/?format=json&hazard_type=landslide"
        );
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(ApiClient::new("not a url", 5).is_err());
    }

    #[tokio::test]
    async fn test_barangays_walks_live_pages() {
        let page1 = json!({
            "next": "?format=json&page=2",
            "results": {"type": "FeatureCollection", "features": [
                {"type": "Feature", "id": 1, "geometry": null, "properties": {"name": "Poblacion"}}
            ]}
        });
        let page2 = json!({
            "next": null,
            "results": {"type": "FeatureCollection", "features": [
                {"type": "Feature", "id": 2, "geometry": null, "properties": {"name": "Tinago"}}
            ]}
        });
        let server = spawn_json_server(vec![
            ("/api/barangays/?format=json", 200, page1.to_string()),
            ("/api/barangays/?format=json&page=2", 200, page2.to_string()),
        ])
        .await;

        let client = ApiClient::new(&format!("{}/api", server.base_url), 5).unwrap();
        let walk = client.barangays(None).await;

        assert_eq!(walk.end, WalkEnd::Exhausted);
        let names: Vec<_> = walk.records.iter().map(|r| r.name().to_string()).collect();
        assert_eq!(names, vec!["Poblacion", "Tinago"]);
        assert!(walk.records[0].geometry.is_none());
        assert_eq!(server.hit_count(), 2);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_status_error_is_typed() {
        let server = spawn_json_server(vec![(
            "/api/barangays/statistics/?format=json",
            500,
            r#"{"detail":"boom"}"#.to_string(),
        )])
        .await;

        let client = ApiClient::new(&format!("{}/api", server.base_url), 5).unwrap();
        let err = client.statistics().await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 500, .. }));
        server.stop().await;
    }

    #[tokio::test]
    async fn test_hazard_layer_failure_is_empty() {
        let server = spawn_json_server(vec![]).await;
        let client = ApiClient::new(&format!("{}/api", server.base_url), 5).unwrap();
        assert!(client.hazard_layer(HazardLayer::StormSurge).await.is_empty());
        server.stop().await;
    }

    #[tokio::test]
    async fn test_overview_survives_partial_failure() {
        let stats = json!({"total_barangays": 2, "resilience_stats": {"avg_score": 41.5}});
        let listing = json!([
            {"id": 1, "name": "A", "resilience_score": 55.0},
            {"id": 2, "name": "B", "resilience_score": 10.0}
        ]);
        let high_risk = json!({"type": "FeatureCollection", "features": [
            {"type": "Feature", "id": 1, "geometry": null, "properties": {"name": "A"}}
        ]});
        let server = spawn_json_server(vec![
            ("/api/barangays/statistics/?format=json", 200, stats.to_string()),
            ("/api/barangays/?format=json", 200, listing.to_string()),
            ("/api/barangays/high_risk/?format=json", 200, high_risk.to_string()),
            ("/api/air-quality/ai_analysis/?format=json", 404, "{}".to_string()),
        ])
        .await;

        let client = ApiClient::new(&format!("{}/api", server.base_url), 5).unwrap();
        let overview = client.overview(true, None).await;

        assert_eq!(overview.statistics.unwrap().total_barangays, 2);
        assert_eq!(overview.barangays.records.len(), 2);
        assert_eq!(overview.high_risk.len(), 1);
        assert!(overview.air_quality.is_empty());
        assert!(overview.air_quality_analysis.is_none());
        server.stop().await;
    }

    fn air_quality_body() -> String {
        json!([
            {"municipality_name": "Dumaguete City", "year": 2025, "month": 9, "avg_aqi": 2.0, "avg_pm25": 11.2},
            {"municipality_name": "Bais City", "year": 2025, "month": 9, "avg_aqi": 1.0},
            {"municipality_name": "Sibulan", "year": 2025, "month": 9, "avg_aqi": 3.0},
            {"municipality_name": "Valencia", "year": 2025, "month": 9, "avg_aqi": 4.0}
        ])
        .to_string()
    }

    #[tokio::test]
    async fn test_air_quality_view_lists_every_reading() {
        let server = spawn_json_server(vec![
            ("/api/air-quality/latest/", 200, air_quality_body()),
            (
                "/api/air-quality/ai_analysis/",
                200,
                json!({"analysis": "Air is mostly fair."}).to_string(),
            ),
        ])
        .await;

        let client = ApiClient::new(&format!("{}/api", server.base_url), 5).unwrap();
        let view = client.air_quality_view(true).await.unwrap();

        assert_eq!(view.readings.len(), 4);
        assert_eq!(view.readings[3].municipality(), "Valencia");
        assert_eq!(
            view.analysis.as_ref().and_then(Narrative::text),
            Some("Air is mostly fair.")
        );
        server.stop().await;
    }

    #[tokio::test]
    async fn test_air_quality_view_survives_analysis_failure() {
        let server = spawn_json_server(vec![
            ("/api/air-quality/latest/", 200, air_quality_body()),
            ("/api/air-quality/ai_analysis/", 500, r#"{"detail":"model down"}"#.to_string()),
        ])
        .await;

        let client = ApiClient::new(&format!("{}/api", server.base_url), 5).unwrap();
        let view = client.air_quality_view(true).await.unwrap();

        assert_eq!(view.readings.len(), 4);
        assert!(view.analysis.is_none());
        server.stop().await;
    }

    #[tokio::test]
    async fn test_air_quality_view_skips_analysis() {
        let server = spawn_json_server(vec![("/api/air-quality/latest/", 200, air_quality_body())]).await;

        let client = ApiClient::new(&format!("{}/api", server.base_url), 5).unwrap();
        let view = client.air_quality_view(false).await.unwrap();

        assert!(view.analysis.is_none());
        assert_eq!(server.hit_count(), 1);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_air_quality_view_fails_without_readings() {
        let server = spawn_json_server(vec![]).await;
        let client = ApiClient::new(&format!("{}/api", server.base_url), 5).unwrap();
        let err = client.air_quality_view(true).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        server.stop().await;
    }

    fn municipalities_body() -> String {
        json!([
            {"id": 3, "name": "Dauin", "province": "Negros Oriental", "barangay_count": 23},
            {"id": 8, "name": "Zamboanguita", "population": 29000, "land_area": 72.5}
        ])
        .to_string()
    }

    #[tokio::test]
    async fn test_municipality_detail_keeps_profile_when_report_fails() {
        let server = spawn_json_server(vec![
            ("/api/municipalities/", 200, municipalities_body()),
            ("/api/municipalities/8/ai_report/", 503, r#"{"detail":"busy"}"#.to_string()),
        ])
        .await;

        let client = ApiClient::new(&format!("{}/api", server.base_url), 5).unwrap();
        let lookup = client.municipality_detail(8, true, None).await;

        let MunicipalityLookup::Found(detail) = lookup else {
            panic!("municipality 8 should be found");
        };
        assert_eq!(detail.municipality.name(), "Zamboanguita");
        assert_eq!(detail.municipality.population(), Some(29000));
        assert!(detail.report.is_none());
        assert_eq!(server.hit_count(), 2);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_municipality_detail_attaches_report() {
        let server = spawn_json_server(vec![
            ("/api/municipalities/", 200, municipalities_body()),
            (
                "/api/municipalities/3/ai_report/",
                200,
                json!({"report": "Dauin should expand evacuation capacity."}).to_string(),
            ),
        ])
        .await;

        let client = ApiClient::new(&format!("{}/api", server.base_url), 5).unwrap();
        let MunicipalityLookup::Found(detail) = client.municipality_detail(3, true, None).await
        else {
            panic!("municipality 3 should be found");
        };
        assert_eq!(detail.municipality.name(), "Dauin");
        assert_eq!(
            detail.report.as_ref().and_then(Narrative::text),
            Some("Dauin should expand evacuation capacity.")
        );
        server.stop().await;
    }

    #[tokio::test]
    async fn test_municipality_detail_missing_skips_report() {
        let server = spawn_json_server(vec![("/api/municipalities/", 200, municipalities_body())]).await;

        let client = ApiClient::new(&format!("{}/api", server.base_url), 5).unwrap();
        let MunicipalityLookup::Missing(walk) = client.municipality_detail(99, true, None).await
        else {
            panic!("municipality 99 should be missing");
        };
        assert!(walk.is_complete());
        assert_eq!(walk.records.len(), 2);
        assert_eq!(server.hit_count(), 1);
        server.stop().await;
    }
}
