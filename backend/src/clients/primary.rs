//! Client for the Crosscut catchment-job service.

use serde::Deserialize;
use serde_json::Value;

use super::{check, check_found};
use crate::auth::Credential;
use crate::errors::AppError;
use crate::models::{
    Boundary, BoundaryList, CatchmentJob, CreateJobPayload, Feature, JobList, RowTable,
    UpdateItemRequest, ATTRIBUTE_ID_FIELD, SITE_BASED,
};

/// Error body of a rejected job: the submitted rows with an error column added.
#[derive(Debug, Deserialize)]
struct RejectedRows {
    csv: String,
}

#[derive(Debug, Deserialize)]
struct JobGeoJson {
    #[serde(default)]
    features: Vec<Feature>,
}

/// Thin wrapper over the catchment-job REST API.
#[derive(Clone)]
pub struct PrimaryClient {
    http: reqwest::Client,
    base_url: String,
    boundary_version: String,
}

impl PrimaryClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, boundary_version: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            boundary_version: boundary_version.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn job_missing(id: i64) -> impl FnOnce() -> String {
        move || format!("Catchment job {} not found", id)
    }

    /// Site-based jobs, newest id first.
    pub async fn list_jobs(&self, credential: &Credential) -> Result<Vec<CatchmentJob>, AppError> {
        let request = credential.apply(self.http.get(self.url("/catchment-jobs")));
        let list: JobList = check(request.send().await?).await?.json().await?;

        let mut jobs: Vec<CatchmentJob> = list
            .jobs
            .into_iter()
            .filter(|job| job.algorithm == SITE_BASED)
            .collect();
        jobs.sort_by(|a, b| b.id.cmp(&a.id));

        tracing::debug!("Fetched {} site-based jobs", jobs.len());
        Ok(jobs)
    }

    pub async fn get_job(&self, credential: &Credential, id: i64) -> Result<CatchmentJob, AppError> {
        let request = credential.apply(self.http.get(self.url(&format!("/catchment-jobs/{}", id))));
        let response = check_found(request.send().await?, Self::job_missing(id)).await?;
        Ok(response.json().await?)
    }

    /// Submit a new job. Rejected rows come back as a `Validation` error with the table attached.
    pub async fn create_job(
        &self,
        credential: &Credential,
        payload: &CreateJobPayload,
    ) -> Result<(), AppError> {
        let request = credential.apply(self.http.post(self.url("/catchment-jobs")).json(payload));
        let response = request.send().await?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            let table = serde_json::from_str::<RejectedRows>(&body)
                .ok()
                .map(|rejected| RowTable::from_csv(&rejected.csv))
                .transpose()?
                .filter(RowTable::has_errors);
            if let Some(table) = table {
                tracing::info!(
                    "Job service rejected {} rows for {}",
                    table.rows.len(),
                    payload.name
                );
                return Err(AppError::Validation {
                    message: "Some rows were rejected".to_string(),
                    table: Some(table),
                });
            }
            return Err(AppError::Upstream {
                status: status.as_u16(),
                message: "/catchment-jobs rejected the job".to_string(),
            });
        }

        check(response).await?;
        tracing::info!("Created catchment job {}", payload.name);
        Ok(())
    }

    pub async fn delete_job(&self, credential: &Credential, id: i64) -> Result<(), AppError> {
        let request =
            credential.apply(self.http.delete(self.url(&format!("/catchment-jobs/{}", id))));
        check_found(request.send().await?, Self::job_missing(id)).await?;
        tracing::info!("Deleted catchment job {}", id);
        Ok(())
    }

    /// Catchment polygons of a finished job.
    pub async fn job_geojson(
        &self,
        credential: &Credential,
        id: i64,
    ) -> Result<Vec<Feature>, AppError> {
        let request = credential.apply(
            self.http
                .get(self.url(&format!("/catchment-jobs/{}/geojson", id))),
        );
        let response = check_found(request.send().await?, Self::job_missing(id)).await?;
        let geojson: JobGeoJson = response.json().await?;
        Ok(geojson.features)
    }

    /// Set one named field on the job record.
    pub async fn update_item(
        &self,
        credential: &Credential,
        id: i64,
        item: &UpdateItemRequest,
    ) -> Result<Value, AppError> {
        let request = credential.apply(
            self.http
                .put(self.url(&format!("/catchment-jobs/{}/item", id)))
                .json(item),
        );
        let response = check_found(request.send().await?, Self::job_missing(id)).await?;
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Record (or clear, with `None`) the DHIS2 attribute linked to a job.
    pub async fn set_attribute_id(
        &self,
        credential: &Credential,
        id: i64,
        attribute_id: Option<&str>,
    ) -> Result<(), AppError> {
        let item = UpdateItemRequest {
            field: ATTRIBUTE_ID_FIELD.to_string(),
            value: attribute_id.map(|a| Value::String(a.to_string())),
        };
        self.update_item(credential, id, &item).await?;
        Ok(())
    }

    /// Whole-country boundaries available to every account, by country name.
    pub async fn boundaries(&self, credential: &Credential) -> Result<Vec<Boundary>, AppError> {
        let request = credential.apply(
            self.http
                .get(self.url(&format!("/boundaries/{}", self.boundary_version))),
        );
        let list: BoundaryList = check(request.send().await?).await?.json().await?;

        let mut boundaries: Vec<Boundary> = list
            .boundary_list
            .into_iter()
            .filter(|b| b.feature_flags.iter().any(|f| f == "all") && b.entire_country)
            .collect();
        boundaries.sort_by(|a, b| a.country_name.cmp(&b.country_name));
        Ok(boundaries)
    }
}
