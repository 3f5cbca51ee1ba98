//! Publishing catchments into DHIS2 and taking them back out.
//!
//! Publish creates a GEOJSON attribute, attaches each catchment polygon to the
//! organisation unit that owns it, and records the attribute id on the job.
//! Unpublish reverses those three writes. Steps run strictly in sequence and
//! there is no compensation: if a late step fails, earlier writes stay applied
//! and the orphaned attribute id is logged.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{Map, Value};

use super::status::{PublishStatus, PublishTracker};
use crate::auth::Credential;
use crate::clients::{PrimaryClient, SecondaryClient};
use crate::errors::AppError;
use crate::models::{attribute_name, CatchmentJob, NewAttribute};

/// Message shown when the attribute name is already taken.
pub const NAME_IN_USE: &str =
    "Name is already in use. Create a new catchment with a different name.";

/// Result of a completed publish or unpublish.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub job_id: i64,
    pub attribute_id: String,
    /// Organisation units whose attribute values were written
    pub org_units: Vec<String>,
    pub status: PublishStatus,
}

/// Remove every attribute value that belongs to `attribute_id`.
///
/// All other fields of the record are left untouched. Returns how many values were removed.
pub fn strip_attribute_value(record: &mut Map<String, Value>, attribute_id: &str) -> usize {
    let Some(Value::Array(values)) = record.get_mut("attributeValues") else {
        return 0;
    };

    let before = values.len();
    values.retain(|value| {
        value
            .get("attribute")
            .and_then(|a| a.get("id"))
            .and_then(Value::as_str)
            != Some(attribute_id)
    });
    before - values.len()
}

/// Cross-backend publish workflow.
pub struct Publisher<'a> {
    pub primary: &'a PrimaryClient,
    pub secondary: &'a SecondaryClient,
    pub tracker: &'a PublishTracker,
}

impl Publisher<'_> {
    /// Publish a job's catchments as a new DHIS2 attribute.
    ///
    /// A name collision is reported before anything is written.
    pub async fn publish(
        &self,
        credential: &Credential,
        job: &CatchmentJob,
    ) -> Result<PublishOutcome, AppError> {
        self.tracker.ensure(job, PublishStatus::Publish)?;

        let name = attribute_name(&job.name).to_lowercase();
        let existing = self.secondary.geojson_attributes().await?;
        if existing.iter().any(|a| a.name.to_lowercase() == name) {
            tracing::warn!("Attribute for job {} ({}) already exists", job.id, job.name);
            return Err(AppError::DuplicateName(NAME_IN_USE.to_string()));
        }

        let flight = self.tracker.begin(job, PublishStatus::Publish)?;
        match self.run_publish(credential, job).await {
            Ok((attribute_id, org_units)) => Ok(PublishOutcome {
                job_id: job.id,
                attribute_id,
                org_units,
                status: flight.succeed(),
            }),
            Err(e) => {
                flight.fail();
                Err(e)
            }
        }
    }

    async fn run_publish(
        &self,
        credential: &Credential,
        job: &CatchmentJob,
    ) -> Result<(String, Vec<String>), AppError> {
        let features = self.primary.job_geojson(credential, job.id).await?;
        let org_units = self.secondary.org_units().await?;
        tracing::info!(
            "Publishing job {}: {} features, {} organisation units",
            job.id,
            features.len(),
            org_units.len()
        );

        let attribute_id = self
            .secondary
            .create_attribute(&NewAttribute::for_job(&job.name))
            .await?;
        tracing::info!("Created attribute {} for job {}", attribute_id, job.id);

        let mut patched = Vec::new();
        for unit in &org_units {
            let Some(feature) = features
                .iter()
                .find(|f| f.owner_org_unit() == Some(unit.id.as_str()))
            else {
                continue;
            };

            if let Err(e) = self
                .secondary
                .add_attribute_value(&unit.id, &attribute_id, &feature.geometry)
                .await
            {
                tracing::error!(
                    "Publish of job {} stopped at {}; attribute {} and {} earlier values remain",
                    job.id,
                    unit.id,
                    attribute_id,
                    patched.len()
                );
                return Err(e);
            }
            patched.push(unit.id.clone());
        }

        if let Err(e) = self
            .primary
            .set_attribute_id(credential, job.id, Some(&attribute_id))
            .await
        {
            tracing::error!(
                "Job {} was not linked to attribute {}; DHIS2 changes remain on {} units",
                job.id,
                attribute_id,
                patched.len()
            );
            return Err(e);
        }

        tracing::info!(
            "Published job {} to {} organisation units",
            job.id,
            patched.len()
        );
        Ok((attribute_id, patched))
    }

    /// Remove a published job's attribute values and the attribute itself.
    pub async fn unpublish(
        &self,
        credential: &Credential,
        job: &CatchmentJob,
    ) -> Result<PublishOutcome, AppError> {
        let Some(attribute_id) = job.attribute_id() else {
            return Err(AppError::Conflict(format!(
                "Job {} is not published",
                job.id
            )));
        };

        let flight = self.tracker.begin(job, PublishStatus::Unpublish)?;
        match self.run_unpublish(credential, job, attribute_id).await {
            Ok(org_units) => Ok(PublishOutcome {
                job_id: job.id,
                attribute_id: attribute_id.to_string(),
                org_units,
                status: flight.succeed(),
            }),
            Err(e) => {
                flight.fail();
                Err(e)
            }
        }
    }

    async fn run_unpublish(
        &self,
        credential: &Credential,
        job: &CatchmentJob,
        attribute_id: &str,
    ) -> Result<Vec<String>, AppError> {
        let features = self.primary.job_geojson(credential, job.id).await?;
        let org_units = self.secondary.org_units().await?;
        let known: HashSet<&str> = org_units.iter().map(|u| u.id.as_str()).collect();

        let mut rewritten = Vec::new();
        for owner in features.iter().filter_map(|f| f.owner_org_unit()) {
            if !known.contains(owner) || rewritten.iter().any(|id| id == owner) {
                continue;
            }

            let mut record = self.secondary.org_unit_record(owner).await?;
            let removed = strip_attribute_value(&mut record, attribute_id);
            tracing::debug!("Removing {} values from {}", removed, owner);

            // DHIS2 replaces the whole unit here, so the full record goes back.
            self.secondary.replace_org_unit(owner, &record).await?;
            rewritten.push(owner.to_string());
        }

        self.secondary.delete_attribute(attribute_id).await?;
        tracing::info!("Deleted attribute {} of job {}", attribute_id, job.id);

        if let Err(e) = self.primary.set_attribute_id(credential, job.id, None).await {
            tracing::error!(
                "Attribute {} is gone but job {} still references it",
                attribute_id,
                job.id
            );
            return Err(e);
        }

        Ok(rewritten)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> Map<String, Value> {
        json!({
            "id": "ou1",
            "code": "OU_1",
            "name": "Ngelehun CHC",
            "path": "/ImspTQPwCqd/O6uvpzGd5pu/ou1",
            "lastUpdated": "2023-01-01T00:00:00.000",
            "attributeValues": [
                {"value": "{}", "attribute": {"id": "keep", "name": "Other"}},
                {"value": "{}", "attribute": {"id": "drop", "name": "Crosscut North"}}
            ]
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn test_strip_only_matching_attribute() {
        let mut rec = record();
        let original = rec.clone();

        assert_eq!(strip_attribute_value(&mut rec, "drop"), 1);
        assert_eq!(rec["attributeValues"].as_array().unwrap().len(), 1);
        assert_eq!(rec["attributeValues"][0]["attribute"]["id"], "keep");

        for key in ["id", "code", "name", "path", "lastUpdated"] {
            assert_eq!(rec[key], original[key]);
        }
    }

    #[test]
    fn test_strip_without_values() {
        let mut rec = Map::new();
        rec.insert("id".into(), json!("ou2"));
        assert_eq!(strip_attribute_value(&mut rec, "drop"), 0);
        assert!(!rec.contains_key("attributeValues"));
    }
}
