//! Request authentication.
//!
//! Two independent concerns live here: the optional pre-shared key guarding the
//! admin API, and the caller's identity token that is forwarded to the job service.

use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request},
    http::{header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::errors::AppError;

/// Header name for the admin API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// PSK authentication layer function that takes the expected PSK as a parameter.
pub async fn psk_auth_layer(
    expected_psk: Option<String>,
    request: Request,
    next: Next,
) -> Response {
    // If no PSK is configured, allow all requests (dev mode)
    let Some(expected) = expected_psk else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(key) if constant_time_compare(key, &expected) => next.run(request).await,
        Some(_) => AppError::Unauthorized("Invalid API key".to_string()).into_response(),
        None => AppError::Unauthorized("Missing API key".to_string()).into_response(),
    }
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Identity token of the signed-in user, threaded through every job-service call.
///
/// The token is not validated here; a rejected token comes back from the job
/// service as an upstream error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credential {
    token: Option<String>,
}

impl Credential {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Attach the `authorization` header when a token is present.
    pub fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header(reqwest::header::AUTHORIZATION, token),
            None => request,
        }
    }
}

impl<S> FromRequestParts<S> for Credential
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        Ok(Self { token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    #[test]
    fn test_constant_time_compare_equal() {
        assert!(constant_time_compare("test-key-123", "test-key-123"));
    }

    #[test]
    fn test_constant_time_compare_not_equal() {
        assert!(!constant_time_compare("test-key-123", "test-key-124"));
    }

    #[test]
    fn test_constant_time_compare_different_lengths() {
        assert!(!constant_time_compare("short", "much-longer-key"));
    }

    #[tokio::test]
    async fn test_credential_from_header() {
        let (mut parts, _) = HttpRequest::builder()
            .header("authorization", "eyJraWQiOi")
            .body(())
            .unwrap()
            .into_parts();

        let credential = Credential::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(credential, Credential::bearer("eyJraWQiOi"));
    }

    #[tokio::test]
    async fn test_missing_header_is_anonymous() {
        let (mut parts, _) = HttpRequest::builder().body(()).unwrap().into_parts();

        let credential = Credential::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(credential, Credential::anonymous());
    }
}
