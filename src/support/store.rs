//! Mutual-aid support requests between barangays.
//!
//! Requests live as one serialized list under the `support_requests` key
//! of a [`LocalStorage`] file. The store is opened by whoever needs it and
//! owns its storage for as long as it lives.

use crate::models::Record;
use crate::support::storage::LocalStorage;
use crate::support::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::info;

/// Storage key holding the serialized request list.
pub const SUPPORT_REQUESTS_KEY: &str = "support_requests";

/// Kind of resource requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Food,
    Medicine,
    /// Rescue team
    Rescue,
    Shelter,
    Water,
    Other,
}

impl ResourceType {
    pub fn emoji(&self) -> &'static str {
        match self {
            ResourceType::Food => "🍚",
            ResourceType::Medicine => "💊",
            ResourceType::Rescue => "🚑",
            ResourceType::Shelter => "🏠",
            ResourceType::Water => "💧",
            ResourceType::Other => "📦",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceType::Food => write!(f, "Food"),
            ResourceType::Medicine => write!(f, "Medicine"),
            ResourceType::Rescue => write!(f, "Rescue Team"),
            ResourceType::Shelter => write!(f, "Shelter"),
            ResourceType::Water => write!(f, "Water"),
            ResourceType::Other => write!(f, "Other"),
        }
    }
}

/// How soon the resource is needed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    /// Can wait 24+ hours
    Low,
    /// Needed within 12-24 hours
    Medium,
    /// Needed within 6-12 hours
    High,
    /// Immediate (0-6 hours)
    Critical,
}

impl Urgency {
    pub fn emoji(&self) -> &'static str {
        match self {
            Urgency::Low => "🟢",
            Urgency::Medium => "🟡",
            Urgency::High => "🟠",
            Urgency::Critical => "🔴",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Urgency::Low => write!(f, "Low"),
            Urgency::Medium => write!(f, "Medium"),
            Urgency::High => write!(f, "High"),
            Urgency::Critical => write!(f, "Critical"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Active,
    Resolved,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Active => write!(f, "active"),
            RequestStatus::Resolved => write!(f, "resolved"),
        }
    }
}

/// Form input for a new request.
#[derive(Debug, Clone)]
pub struct NewSupportRequest {
    pub barangay_id: i64,
    pub resource_type: ResourceType,
    pub quantity: String,
    pub urgency: Urgency,
    pub description: String,
    pub contact_person: String,
    pub contact_number: String,
    pub contact_email: Option<String>,
}

impl NewSupportRequest {
    fn validate(&self) -> Result<(), StoreError> {
        let required = [
            ("quantity", &self.quantity),
            ("description", &self.description),
            ("contact person", &self.contact_person),
            ("contact number", &self.contact_number),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(StoreError::Invalid(format!("{} is required", field)));
            }
        }
        Ok(())
    }
}

/// A stored support request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportRequest {
    /// Creation time in epoch milliseconds, unique within the store.
    pub id: i64,
    pub barangay_id: i64,
    pub barangay_name: String,
    pub municipality: String,
    pub resource_type: ResourceType,
    pub quantity: String,
    pub urgency: Urgency,
    pub description: String,
    pub contact_person: String,
    pub contact_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub status: RequestStatus,
}

/// Request counts for the summary cards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SupportSummary {
    pub active: usize,
    pub resolved: usize,
    pub critical_active: usize,
}

#[derive(Debug)]
pub struct SupportStore {
    storage: LocalStorage,
    requests: Vec<SupportRequest>,
}

impl SupportStore {
    /// Open the store backed by the storage file at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let storage = LocalStorage::open(path)?;
        let requests = match storage.get_item(SUPPORT_REQUESTS_KEY) {
            Some(saved) => serde_json::from_str(saved)?,
            None => Vec::new(),
        };
        Ok(Self { storage, requests })
    }

    /// All requests, newest first.
    pub fn list(&self) -> &[SupportRequest] {
        &self.requests
    }

    pub fn list_by_status(&self, status: RequestStatus) -> Vec<&SupportRequest> {
        self.requests.iter().filter(|r| r.status == status).collect()
    }

    /// File the requests are persisted to.
    pub fn storage_path(&self) -> &Path {
        self.storage.path()
    }

    /// Validate and store a new request, newest first.
    ///
    /// The barangay name and municipality are looked up in `barangays`;
    /// an unknown id stores `"Unknown"` for both.
    pub fn create(
        &mut self,
        new: NewSupportRequest,
        barangays: &[Record],
        now: DateTime<Utc>,
    ) -> Result<SupportRequest, StoreError> {
        new.validate()?;

        let barangay = barangays.iter().find(|b| b.id() == Some(new.barangay_id));
        let (barangay_name, municipality) = match barangay {
            Some(b) => (b.name().to_string(), b.municipality().to_string()),
            None => ("Unknown".to_string(), "Unknown".to_string()),
        };

        let mut id = now.timestamp_millis();
        if let Some(max) = self.requests.iter().map(|r| r.id).max() {
            if id <= max {
                id = max + 1;
            }
        }

        let request = SupportRequest {
            id,
            barangay_id: new.barangay_id,
            barangay_name,
            municipality,
            resource_type: new.resource_type,
            quantity: new.quantity.trim().to_string(),
            urgency: new.urgency,
            description: new.description.trim().to_string(),
            contact_person: new.contact_person.trim().to_string(),
            contact_number: new.contact_number.trim().to_string(),
            contact_email: new
                .contact_email
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty()),
            timestamp: now,
            status: RequestStatus::Active,
        };

        self.requests.insert(0, request.clone());
        self.persist()?;
        info!(
            "Created support request {} for {}",
            request.id, request.barangay_name
        );

        Ok(request)
    }

    /// Mark a request resolved.
    pub fn resolve(&mut self, id: i64) -> Result<SupportRequest, StoreError> {
        let request = self
            .requests
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))?;
        request.status = RequestStatus::Resolved;
        let resolved = request.clone();

        self.persist()?;
        info!("Resolved support request {}", id);
        Ok(resolved)
    }

    pub fn summary(&self) -> SupportSummary {
        let mut summary = SupportSummary::default();
        for request in &self.requests {
            match request.status {
                RequestStatus::Active => {
                    summary.active += 1;
                    if request.urgency == Urgency::Critical {
                        summary.critical_active += 1;
                    }
                }
                RequestStatus::Resolved => summary.resolved += 1,
            }
        }
        summary
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        let serialized = serde_json::to_string(&self.requests)?;
        self.storage.set_item(SUPPORT_REQUESTS_KEY, serialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;

    fn barangays() -> Vec<Record> {
        vec![Record::from_value(json!({
            "type": "Feature",
            "id": 12,
            "geometry": null,
            "properties": {"name": "Lo-oc", "municipality": "Dumaguete City"}
        }))
        .unwrap()]
    }

    fn new_request(barangay_id: i64, urgency: Urgency) -> NewSupportRequest {
        NewSupportRequest {
            barangay_id,
            resource_type: ResourceType::Water,
            quantity: "50 gallons".to_string(),
            urgency,
            description: "Water supply cut after flooding".to_string(),
            contact_person: "Kagawad Reyes".to_string(),
            contact_number: "0917-000-0000".to_string(),
            contact_email: Some("  ".to_string()),
        }
    }

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn test_create_looks_up_barangay_and_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.json");

        let mut store = SupportStore::open(&path).unwrap();
        let created = store
            .create(new_request(12, Urgency::High), &barangays(), at(1_000))
            .unwrap();

        assert_eq!(created.id, 1_000);
        assert_eq!(created.barangay_name, "Lo-oc");
        assert_eq!(created.municipality, "Dumaguete City");
        assert_eq!(created.status, RequestStatus::Active);
        assert!(created.contact_email.is_none());

        let reopened = SupportStore::open(&path).unwrap();
        assert_eq!(reopened.list(), &[created]);
    }

    #[test]
    fn test_unknown_barangay_and_newest_first() {
        let dir = TempDir::new().unwrap();
        let mut store = SupportStore::open(&dir.path().join("s.json")).unwrap();

        store
            .create(new_request(12, Urgency::Low), &barangays(), at(5_000))
            .unwrap();
        let second = store
            .create(new_request(99, Urgency::Low), &barangays(), at(5_000))
            .unwrap();

        assert_eq!(second.barangay_name, "Unknown");
        assert_eq!(second.municipality, "Unknown");
        assert_eq!(second.id, 5_001);
        assert_eq!(store.list()[0].id, 5_001);
    }

    #[test]
    fn test_validation() {
        let dir = TempDir::new().unwrap();
        let mut store = SupportStore::open(&dir.path().join("s.json")).unwrap();

        let mut request = new_request(12, Urgency::Medium);
        request.contact_number = "   ".to_string();
        let err = store.create(request, &barangays(), at(1)).unwrap_err();

        assert!(matches!(err, StoreError::Invalid(_)));
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_resolve_and_summary() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s.json");
        let mut store = SupportStore::open(&path).unwrap();

        let a = store
            .create(new_request(12, Urgency::Critical), &barangays(), at(10))
            .unwrap();
        store
            .create(new_request(12, Urgency::Critical), &barangays(), at(20))
            .unwrap();

        let resolved = store.resolve(a.id).unwrap();
        assert_eq!(resolved.status, RequestStatus::Resolved);
        assert!(matches!(store.resolve(424242), Err(StoreError::NotFound(424242))));

        let summary = store.summary();
        assert_eq!(
            summary,
            SupportSummary {
                active: 1,
                resolved: 1,
                critical_active: 1
            }
        );

        let reopened = SupportStore::open(&path).unwrap();
        assert_eq!(reopened.list_by_status(RequestStatus::Resolved).len(), 1);
        let stored = reopened.list().iter().find(|r| r.id == a.id).unwrap();
        assert_eq!(stored.status, RequestStatus::Resolved);
    }

    #[test]
    fn test_serialized_field_names() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s.json");
        let mut store = SupportStore::open(&path).unwrap();
        store
            .create(new_request(12, Urgency::High), &barangays(), at(7))
            .unwrap();

        let storage = LocalStorage::open(&path).unwrap();
        let saved: serde_json::Value =
            serde_json::from_str(storage.get_item(SUPPORT_REQUESTS_KEY).unwrap()).unwrap();
        assert_eq!(saved[0]["resource_type"], "water");
        assert_eq!(saved[0]["urgency"], "high");
        assert_eq!(saved[0]["status"], "active");
    }
}
