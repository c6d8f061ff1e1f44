//! Bearer token check for the `/api/*` routes.
//!
//! The hub and the notebook extension share one service token. Any caller
//! without it could plant launches or post grades signed with a consumer
//! secret, so every API route sits behind [`require_api_token`].

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use super::api::ApiError;

/// The configured service token. Never blank.
#[derive(Clone)]
pub struct ApiToken(Arc<str>);

impl ApiToken {
    /// `None` when `token` is empty or whitespace.
    pub fn new(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.is_empty() {
            None
        } else {
            Some(Self(Arc::from(token)))
        }
    }

    pub fn matches(&self, provided: &str) -> bool {
        !provided.is_empty() && timing_safe_equal(provided, &self.0)
    }
}

impl std::fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiToken(********)")
    }
}

/// The token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Constant-time string comparison.
pub fn timing_safe_equal(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}

pub async fn require_api_token(
    State(token): State<ApiToken>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = bearer_token(request.headers()).map(|provided| token.matches(provided));
    match authorized {
        Some(true) => next.run(request).await,
        Some(false) => {
            warn!(path = %request.uri().path(), "rejected API request with a wrong token");
            ApiError::Unauthorized("Invalid API token".to_string()).into_response()
        }
        None => {
            warn!(path = %request.uri().path(), "rejected API request without a token");
            ApiError::Unauthorized("Missing bearer token".to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_api_token_rejects_blank() {
        assert!(ApiToken::new("").is_none());
        assert!(ApiToken::new("   ").is_none());
        assert!(ApiToken::new("s3cret").is_some());
    }

    #[test]
    fn test_api_token_matches() {
        let token = ApiToken::new("s3cret").unwrap();
        assert!(token.matches("s3cret"));
        assert!(!token.matches("s3cre"));
        assert!(!token.matches("S3cret"));
        assert!(!token.matches(""));
    }

    #[test]
    fn test_api_token_debug_is_masked() {
        let token = ApiToken::new("s3cret").unwrap();
        assert!(!format!("{:?}", token).contains("s3cret"));
    }

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc "));
        assert_eq!(bearer_token(&headers), Some("abc"));
    }

    #[test]
    fn test_timing_safe_equal() {
        assert!(timing_safe_equal("abc", "abc"));
        assert!(!timing_safe_equal("abc", "abd"));
        assert!(!timing_safe_equal("abc", "abcd"));
        assert!(timing_safe_equal("", ""));
    }
}
