//! Catchment job API endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::Value;

use super::{success, ApiResult};
use crate::auth::Credential;
use crate::errors::AppError;
use crate::models::{
    Boundary, CatchmentJob, Feature, JobSummary, RowTable, UpdateItemRequest, ATTRIBUTE_PREFIX,
};
use crate::workflow::{self, CreateJobRequest, FormEvent, FormState, SortInstructions};
use crate::AppState;

/// GET /api/jobs - List site-based jobs with display status.
pub async fn list_jobs(
    State(state): State<AppState>,
    credential: Credential,
    Query(sort): Query<SortInstructions>,
) -> ApiResult<Vec<JobSummary>> {
    let jobs = state.primary.list_jobs(&credential).await?;

    let mut summaries: Vec<JobSummary> = jobs
        .into_iter()
        .map(|job| {
            let action = state.tracker.status(&job);
            JobSummary::new(job, action)
        })
        .collect();
    sort.apply(&mut summaries);

    success(summaries)
}

/// GET /api/jobs/:id - Get a single job record.
pub async fn get_job(
    State(state): State<AppState>,
    credential: Credential,
    Path(id): Path<i64>,
) -> ApiResult<CatchmentJob> {
    success(state.primary.get_job(&credential, id).await?)
}

/// GET /api/jobs/:id/geojson - Catchment features of a job.
pub async fn get_job_geojson(
    State(state): State<AppState>,
    credential: Credential,
    Path(id): Path<i64>,
) -> ApiResult<Vec<Feature>> {
    success(state.primary.job_geojson(&credential, id).await?)
}

/// PUT /api/jobs/:id/item - Set a named field on a job.
pub async fn update_job_item(
    State(state): State<AppState>,
    credential: Credential,
    Path(id): Path<i64>,
    Json(item): Json<UpdateItemRequest>,
) -> ApiResult<Value> {
    if item.field.trim().is_empty() {
        return Err(AppError::validation("Field name is required"));
    }
    success(state.primary.update_item(&credential, id, &item).await?)
}

/// POST /api/jobs - Create a job from a facility lookup or supplied rows.
pub async fn create_job(
    State(state): State<AppState>,
    credential: Credential,
    Json(request): Json<CreateJobRequest>,
) -> ApiResult<()> {
    let taken_names = taken_names(&state, &credential).await?;
    let form = request.into_form(taken_names);
    let submission = form.submission()?;

    match workflow::create_job(&state.primary, &state.secondary, &credential, submission).await {
        Ok(()) => success(()),
        Err(AppError::Validation {
            message,
            table: Some(table),
        }) => {
            let form = workflow::reduce(form, FormEvent::SubmitFailed(table));
            Err(AppError::Validation {
                message,
                table: form.error_table,
            })
        }
        Err(e) => Err(e),
    }
}

/// Existing job names plus names behind published attributes.
async fn taken_names(state: &AppState, credential: &Credential) -> Result<Vec<String>, AppError> {
    let mut names: Vec<String> = state
        .primary
        .list_jobs(credential)
        .await?
        .into_iter()
        .map(|job| job.name)
        .collect();

    for attribute in state.secondary.geojson_attributes().await? {
        let prefix_len = ATTRIBUTE_PREFIX.len();
        let stripped = match attribute.name.get(..prefix_len) {
            Some(head) if head.eq_ignore_ascii_case(ATTRIBUTE_PREFIX) => {
                attribute.name[prefix_len..].to_string()
            }
            _ => attribute.name.clone(),
        };
        names.push(stripped);
        names.push(attribute.name);
    }
    Ok(names)
}

/// POST /api/jobs/error-table/remove-errors - Drop rejected rows and the error column.
pub async fn remove_error_rows(Json(table): Json<RowTable>) -> ApiResult<RowTable> {
    let form = FormState {
        error_table: Some(table),
        ..FormState::default()
    };
    let form = workflow::reduce(form, FormEvent::RemoveErrorRows);
    success(form.rows.unwrap_or_default())
}

/// DELETE /api/jobs/:id - Delete a job unless a map still uses its attribute.
pub async fn delete_job(
    State(state): State<AppState>,
    credential: Credential,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    let job = state.primary.get_job(&credential, id).await?;
    state.tracker.ensure(&job, workflow::PublishStatus::of(&job))?;

    if let Some(attribute_id) = job.attribute_id() {
        let maps = state.secondary.maps_using_attribute(attribute_id).await?;
        if !maps.is_empty() {
            return Err(AppError::Conflict(format!(
                "Catchment {} is used by {} map(s)",
                job.name,
                maps.len()
            )));
        }
    }

    state.primary.delete_job(&credential, id).await?;
    success(())
}

/// GET /api/boundaries - Countries a job can be created for.
pub async fn list_boundaries(
    State(state): State<AppState>,
    credential: Credential,
) -> ApiResult<Vec<Boundary>> {
    success(state.primary.boundaries(&credential).await?)
}
