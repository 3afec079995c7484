//! Caller identity from a bearer header or the access-token cookie.

use super::cookies::{ACCESS_COOKIE_NAME, read};
use crate::{
    api::error::ApiError,
    auth::{AuthFlow, Identity},
};
use axum::http::{HeaderMap, header::AUTHORIZATION};

/// `Authorization: Bearer <t>` first, then the `token` cookie.
pub(crate) fn extract_access_token(headers: &HeaderMap) -> Option<String> {
    extract_bearer_token(headers).or_else(|| read(headers, ACCESS_COOKIE_NAME))
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Resolve the caller or answer 401.
pub(crate) fn require_identity(headers: &HeaderMap, flow: &AuthFlow) -> Result<Identity, ApiError> {
    let token = extract_access_token(headers).ok_or_else(|| ApiError::unauthorized("Missing token"))?;
    Ok(flow.authenticate(&token)?)
}

/// Anonymous when the token is missing or does not verify.
pub(crate) fn optional_identity(headers: &HeaderMap, flow: &AuthFlow) -> Option<Identity> {
    let token = extract_access_token(headers)?;
    flow.authenticate(&token).ok()
}
