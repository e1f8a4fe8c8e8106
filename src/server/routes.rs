use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::dispatch::{BulkItem, DispatchError};
use crate::notifications::NotificationRequest;

use super::middleware::{check_api_key, presented_key};
use super::rate_limit::ANONYMOUS_CLIENT;
use super::state::AppState;

pub const SERVICE_NAME: &str = "notification-service";

fn authorize(headers: &HeaderMap, state: &AppState) -> Result<(), Response> {
    check_api_key(
        headers,
        state
            .server_config
            .as_ref()
            .and_then(|cfg| cfg.auth.as_ref()),
    )
    .map_err(|response| *response)
}

/// Charges `cost` notifications against the caller's quota. Callers are told
/// apart by API key only when keys are enforced.
fn admit(headers: &HeaderMap, state: &AppState, cost: usize) -> Result<(), Response> {
    let Some(limiter) = state.submission_limiter.as_ref() else {
        return Ok(());
    };
    let keys_enforced = state
        .server_config
        .as_ref()
        .and_then(|cfg| cfg.auth.as_ref())
        .is_some_and(|auth| !auth.api_keys.is_empty());
    let client = keys_enforced
        .then(|| presented_key(headers))
        .flatten()
        .unwrap_or(ANONYMOUS_CLIENT);
    let cost = u32::try_from(cost).unwrap_or(u32::MAX);
    limiter.acquire(client, cost).map_err(|throttled| {
        tracing::warn!(
            event = "submission_throttled",
            cost,
            retry_after_secs = throttled.retry_after.as_secs(),
            "submission quota exhausted"
        );
        let retry_after = throttled.retry_after.as_secs_f64().ceil() as u64;
        let mut response =
            error_response(StatusCode::TOO_MANY_REQUESTS, "submission quota exceeded");
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(retry_after.max(1)));
        response
    })
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn store_failure(err: DispatchError) -> Response {
    tracing::error!(event = "store_unavailable", error = %err, "request could not be persisted");
    error_response(StatusCode::SERVICE_UNAVAILABLE, &err.to_string())
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub notifications: Vec<BulkItem>,
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": SERVICE_NAME,
    }))
}

pub async fn send_notification(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<NotificationRequest>,
) -> Response {
    if let Err(response) = authorize(&headers, &state) {
        return response;
    }
    if let Err(response) = admit(&headers, &state, 1) {
        return response;
    }
    match state.engine.accept(request).await {
        Ok(accepted) => (StatusCode::OK, Json(accepted)).into_response(),
        Err(err) => store_failure(err),
    }
}

pub async fn get_notification(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(response) = authorize(&headers, &state) {
        return response;
    }
    match state.engine.get(&id).await {
        Ok(Some(record)) => (StatusCode::OK, Json(record)).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Notification not found"),
        Err(err) => store_failure(err),
    }
}

pub async fn send_bulk(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<BulkRequest>,
) -> Response {
    if let Err(response) = authorize(&headers, &state) {
        return response;
    }
    if let Err(response) = admit(&headers, &state, request.notifications.len()) {
        return response;
    }
    let summary = state.bulk.send_bulk(request.notifications).await;
    (StatusCode::OK, Json(summary)).into_response()
}
