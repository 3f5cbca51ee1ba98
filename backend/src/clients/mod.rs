//! Outbound HTTP clients.
//!
//! The Crosscut job service and the DHIS2 instance are the sources of truth for all
//! data; nothing is cached locally, so every call re-reads remote state.

mod primary;
mod secondary;

pub use primary::*;
pub use secondary::*;

use crate::errors::AppError;

/// Build the shared HTTP client used by both backends.
pub fn http_client() -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .user_agent(concat!("crosscut-admin/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppError::Internal(format!("HTTP client setup failed: {}", e)))
}

/// Turn a non-success response into an `Upstream` error carrying the body text.
async fn check(response: reqwest::Response) -> Result<reqwest::Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().clone();
    let body = response.text().await.unwrap_or_default();
    tracing::warn!("{} answered {}: {}", url.path(), status, body);

    Err(AppError::Upstream {
        status: status.as_u16(),
        message: format!("{} {} failed", url.path(), status),
    })
}

/// Like [`check`], but a 404 becomes `NotFound` with the given message.
async fn check_found(
    response: reqwest::Response,
    what: impl FnOnce() -> String,
) -> Result<reqwest::Response, AppError> {
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(AppError::NotFound(what()));
    }
    check(response).await
}
