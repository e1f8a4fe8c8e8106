use std::net::{AddrParseError, SocketAddr};

use axum::Router;
use axum::routing::{get, post};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::CorsConfig;
use crate::server::routes;
use crate::server::state::AppState;

pub const DEFAULT_BIND: &str = "127.0.0.1:3002";
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let max_body = state
        .server_config
        .as_ref()
        .and_then(|cfg| cfg.max_body_bytes)
        .unwrap_or(DEFAULT_MAX_BODY_BYTES);
    let cors_layer = build_cors_layer(
        state
            .server_config
            .as_ref()
            .and_then(|cfg| cfg.cors.as_ref()),
    );

    Router::new()
        .route("/health", get(routes::health))
        .route("/notifications", post(routes::send_notification))
        .route("/notifications/bulk", post(routes::send_bulk))
        .route("/notifications/{id}", get(routes::get_notification))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(RequestBodyLimitLayer::new(max_body))
                .layer(TraceLayer::new_for_http()),
        )
        .layer(cors_layer)
}

/// `server.bind`, or the default when unset. A configured value must parse.
pub fn bind_address(state: &AppState) -> Result<SocketAddr, AddrParseError> {
    state
        .server_config
        .as_ref()
        .and_then(|cfg| cfg.bind.as_deref())
        .unwrap_or(DEFAULT_BIND)
        .parse()
}

fn build_cors_layer(config: Option<&CorsConfig>) -> CorsLayer {
    let Some(config) = config else {
        return CorsLayer::new().allow_origin(Any);
    };
    if config.allowed_origins.is_empty() {
        return CorsLayer::new().allow_origin(Any);
    }
    let origins = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect::<Vec<_>>();
    CorsLayer::new().allow_origin(origins)
}
