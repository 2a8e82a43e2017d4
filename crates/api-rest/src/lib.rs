//! # API REST
//!
//! HTTP surface of the matchmaker node.
//!
//! Handles:
//! - `POST /match` for partner servers, handed to [`IncomingRequestProcessor`]
//! - health checks and the OpenAPI document
//! - REST-specific concerns (header extraction, status codes, CORS)
//!
//! All protocol decisions are made in `mme-core`; this crate only translates HTTP in and out.

#![warn(rust_2018_idioms)]

use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use mme_core::constants::AUTH_TOKEN_HEADER;
use mme_core::{IncomingHttpRequest, IncomingRequestProcessor};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::{OpenApi, ToSchema};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<IncomingRequestProcessor>,
}

#[derive(Serialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(OpenApi)]
#[openapi(paths(health, match_request), components(schemas(HealthRes)))]
struct ApiDoc;

/// Build the router with all routes and layers.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/match", post(match_request))
        .route("/api-docs/openapi.json", get(openapi))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Liveness probe.
async fn health() -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "matchmaker node is alive".into(),
    })
}

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[utoipa::path(
    post,
    path = "/match",
    request_body(content = String, description = "Matchmaker request", content_type = "application/vnd.ga4gh.matchmaker.v1.1+json"),
    params(
        ("X-Auth-Token" = String, Header, description = "Token issued to the calling server"),
        ("Accept" = Option<String>, Header, description = "Versioned matchmaker media type")
    ),
    responses(
        (status = 200, description = "Matching patients"),
        (status = 400, description = "Malformed JSON or protocol violation"),
        (status = 401, description = "Unknown server or bad token"),
        (status = 406, description = "Unsupported API version"),
        (status = 500, description = "Internal server error")
    )
)]
/// Answer a match request from a partner server.
///
/// The remote address is optional so the handler also works behind routers built without
/// connect info; servers limited to known addresses are then rejected.
async fn match_request(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let request = IncomingHttpRequest {
        body,
        remote_addr: connect_info.map(|ConnectInfo(addr)| addr.ip()),
        auth_token: header_value(&headers, AUTH_TOKEN_HEADER),
        accept: header_value(&headers, header::ACCEPT.as_str())
            .or_else(|| header_value(&headers, header::CONTENT_TYPE.as_str())),
    };

    let processor = state.processor.clone();
    let reply = match tokio::task::spawn_blocking(move || processor.process(request)).await {
        Ok(reply) => reply,
        Err(err) => {
            tracing::error!("match request task failed: {}", err);
            return (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response();
        }
    };

    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(header::CONTENT_TYPE, reply.media_type)],
        reply.body.to_string(),
    )
        .into_response()
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
