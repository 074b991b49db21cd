use crate::errors::ApiError;
use crate::metrics_defs::GATEWAY_AUTH_REJECTED;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use shared::counter;
use std::sync::Arc;
use subtle::{Choice, ConstantTimeEq};

pub const ACCESS_KEY_HEADER: &str = "x-access-key";
const AUTHORIZATION_HEADER: &str = "authorization";

/// Fixed set of shared-secret access keys.
#[derive(Debug, Clone, Default)]
pub struct AccessKeyValidator {
    keys: Vec<String>,
}

impl AccessKeyValidator {
    /// Keys are trimmed; blank entries are dropped.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut keys: Vec<String> = keys
            .into_iter()
            .map(|key| key.as_ref().trim().to_string())
            .filter(|key| !key.is_empty())
            .collect();
        keys.sort();
        keys.dedup();
        AccessKeyValidator { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Whether the trimmed candidate is one of the keys.
    ///
    /// Every key is compared in constant time, without stopping at a match.
    pub fn validate(&self, candidate: Option<&str>) -> bool {
        let Some(candidate) = candidate.map(str::trim).filter(|c| !c.is_empty()) else {
            return false;
        };

        let mut matched = Choice::from(0);
        for key in &self.keys {
            matched |= candidate.as_bytes().ct_eq(key.as_bytes());
        }
        matched.into()
    }
}

/// Reads the access key from `X-Access-Key`, falling back to
/// `Authorization: Bearer <key>` only when that header is absent or empty.
///
/// A non-empty `X-Access-Key` that trims to nothing yields no key.
pub fn extract_key(headers: &HeaderMap) -> Option<&str> {
    let header_value = |name: &'static str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
    };

    if let Some(key) = header_value(ACCESS_KEY_HEADER) {
        return Some(key.trim()).filter(|key| !key.is_empty());
    }

    header_value(AUTHORIZATION_HEADER)
        .and_then(|value| value.trim().strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|key| !key.is_empty())
}

/// Rejects requests without a valid access key before they reach the handler.
pub async fn require_access_key(
    State(validator): State<Arc<AccessKeyValidator>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !validator.validate(extract_key(request.headers())) {
        counter!(GATEWAY_AUTH_REJECTED).increment(1);
        tracing::debug!(path = request.uri().path(), "Rejected request without valid access key");
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(request).await)
}
