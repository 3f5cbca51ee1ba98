//! Publish/unpublish API endpoints.

use axum::extract::{Path, State};

use super::{success, ApiResult};
use crate::auth::Credential;
use crate::workflow::{PublishOutcome, PublishStatus, Publisher};
use crate::AppState;

fn publisher(state: &AppState) -> Publisher<'_> {
    Publisher {
        primary: &state.primary,
        secondary: &state.secondary,
        tracker: &state.tracker,
    }
}

/// POST /api/jobs/:id/publish
pub async fn publish_job(
    State(state): State<AppState>,
    credential: Credential,
    Path(id): Path<i64>,
) -> ApiResult<PublishOutcome> {
    let job = state.primary.get_job(&credential, id).await?;
    success(publisher(&state).publish(&credential, &job).await?)
}

/// POST /api/jobs/:id/unpublish
pub async fn unpublish_job(
    State(state): State<AppState>,
    credential: Credential,
    Path(id): Path<i64>,
) -> ApiResult<PublishOutcome> {
    let job = state.primary.get_job(&credential, id).await?;
    success(publisher(&state).unpublish(&credential, &job).await?)
}

/// GET /api/jobs/:id/publish-status - Current label of the publish control.
pub async fn get_publish_status(
    State(state): State<AppState>,
    credential: Credential,
    Path(id): Path<i64>,
) -> ApiResult<PublishStatus> {
    let job = state.primary.get_job(&credential, id).await?;
    success(state.tracker.status(&job))
}
