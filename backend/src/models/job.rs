//! Catchment job model as served by the Crosscut job service.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::workflow::PublishStatus;

/// The only algorithm this admin surface creates and lists.
pub const SITE_BASED: &str = "site-based";

/// Job property that links a job to its DHIS2 attribute.
pub const ATTRIBUTE_ID_FIELD: &str = "attributeId";

/// A free-form `{field, value}` entry on a job record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobProperty {
    pub field: String,
    #[serde(default)]
    pub value: Option<Value>,
}

/// A catchment job record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatchmentJob {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    pub algorithm: String,
    pub status: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub properties: Option<Vec<JobProperty>>,
}

impl CatchmentJob {
    /// DHIS2 attribute id recorded on the job, if it is published.
    pub fn attribute_id(&self) -> Option<&str> {
        self.properties
            .as_deref()?
            .iter()
            .find(|p| p.field == ATTRIBUTE_ID_FIELD)
            .and_then(|p| p.value.as_ref())
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    /// Status derived from the record; never stored on our side.
    ///
    /// Any non-null `properties` reads as `Published`, even without an `attributeId`.
    /// The publish control keys on the attribute id instead, so such a job shows
    /// `Published` next to a `Publish` action. That pairing is intended.
    pub fn display_status(&self) -> JobStatus {
        if self.properties.is_some() {
            return JobStatus::Published;
        }
        match self.status.as_str() {
            "PENDING" => JobStatus::Pending,
            "SUCCESS" => JobStatus::Success,
            other => JobStatus::Other(other.to_string()),
        }
    }

    /// Creation date truncated to the calendar day.
    pub fn day(&self) -> String {
        let Some(date) = self.date.as_deref() else {
            return String::new();
        };
        match chrono::DateTime::parse_from_rfc3339(date) {
            Ok(parsed) => parsed.date_naive().to_string(),
            Err(_) => date.split('T').next().unwrap_or_default().to_string(),
        }
    }
}

/// Display status of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Success,
    Published,
    Other(String),
}

impl JobStatus {
    pub fn label(&self) -> &str {
        match self {
            JobStatus::Pending => "Pending",
            JobStatus::Success => "Ready",
            JobStatus::Published => "Published",
            JobStatus::Other(raw) => raw,
        }
    }
}

/// Envelope of `GET /catchment-jobs`.
#[derive(Debug, Clone, Deserialize)]
pub struct JobList {
    pub jobs: Vec<CatchmentJob>,
}

/// One row of the job list as shown to the admin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: i64,
    pub name: String,
    pub country: Option<String>,
    pub algorithm: String,
    pub status: String,
    pub date: String,
    pub properties: Option<Vec<JobProperty>>,
    pub publish_action: PublishStatus,
}

impl JobSummary {
    pub fn new(job: CatchmentJob, publish_action: PublishStatus) -> Self {
        Self {
            status: job.display_status().label().to_string(),
            date: job.day(),
            id: job.id,
            name: job.name,
            country: job.country,
            algorithm: job.algorithm,
            properties: job.properties,
            publish_action,
        }
    }
}

/// Column mapping sent with every new job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    pub lat: String,
    pub lng: String,
    pub name: String,
    pub org_unit_id: String,
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self {
            lat: "lat".to_string(),
            lng: "long".to_string(),
            name: "name".to_string(),
            org_unit_id: "orgUnitId".to_string(),
        }
    }
}

/// Body of `POST /catchment-jobs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJobPayload {
    pub fields: FieldMapping,
    pub name: String,
    pub country: String,
    pub csv: String,
    pub algorithm: String,
}

/// Body of `PUT /catchment-jobs/:id/item`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateItemRequest {
    pub field: String,
    #[serde(default)]
    pub value: Option<Value>,
}

/// Entry of the boundary catalogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Boundary {
    pub country_name: String,
    #[serde(default)]
    pub entire_country: bool,
    #[serde(default)]
    pub feature_flags: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Envelope of `GET /boundaries/:version`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundaryList {
    pub boundary_list: Vec<Boundary>,
}
