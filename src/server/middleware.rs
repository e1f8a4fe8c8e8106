use axum::Json;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::config::AuthConfig;

fn unauthorized(message: &str) -> Box<Response> {
    Box::new((StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response())
}

/// Key presented via `x-api-key` or `Authorization: Bearer`.
pub fn presented_key(headers: &HeaderMap) -> Option<&str> {
    let value = headers
        .get("x-api-key")
        .or_else(|| headers.get("authorization"))?
        .to_str()
        .ok()?;
    Some(value.strip_prefix("Bearer ").unwrap_or(value))
}

/// Passes when no keys are configured.
pub fn check_api_key(headers: &HeaderMap, auth: Option<&AuthConfig>) -> Result<(), Box<Response>> {
    let Some(auth) = auth else {
        return Ok(());
    };
    if auth.api_keys.is_empty() {
        return Ok(());
    }

    if !headers.contains_key("x-api-key") && !headers.contains_key("authorization") {
        return Err(unauthorized("missing api key"));
    }
    match presented_key(headers) {
        Some(key) if auth.api_keys.iter().any(|allowed| allowed == key) => Ok(()),
        _ => Err(unauthorized("invalid api key")),
    }
}
