//! HTTP endpoint for the extraction pipeline
//!
//! Exposes `GET /api/fetch-jd?url=...` plus a no-op `OPTIONS` preflight.
//! Every response, including errors and unknown routes, carries the same
//! permissive CORS headers.

use crate::client::Pipeline;
use crate::error::ExtractError;
use crate::types::ErrorBody;
use axum::extract::{RawQuery, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Path of the extraction endpoint
pub const FETCH_PATH: &str = "/api/fetch-jd";

/// Outcome of the request gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision<'a> {
    /// CORS preflight: answer 200 with an empty body
    Preflight,
    /// Proceed with the given, non-empty target URL
    Fetch(&'a str),
}

/// Validate method and `url` parameter before any other work
pub fn gate<'a>(method: &Method, url: Option<&'a str>) -> Result<GateDecision<'a>, ExtractError> {
    if method == Method::OPTIONS {
        return Ok(GateDecision::Preflight);
    }
    if method != Method::GET {
        return Err(ExtractError::MethodNotAllowed);
    }
    match url {
        Some(url) if !url.is_empty() => Ok(GateDecision::Fetch(url)),
        _ => Err(ExtractError::MissingParameter),
    }
}

/// First `url` value of a raw query string, percent-decoded
pub fn url_param(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "url")
        .map(|(_, value)| value.into_owned())
}

impl IntoResponse for ExtractError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorBody::from(&self))).into_response()
    }
}

/// Build the router serving the extraction endpoint
pub fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route(FETCH_PATH, any(fetch_handler))
        .fallback(not_found)
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(pipeline)
}

/// Serve the endpoint on `listener` until Ctrl-C
pub async fn serve(listener: TcpListener, pipeline: Pipeline) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, path = FETCH_PATH, "jdfetch listening");
    }
    axum::serve(listener, router(Arc::new(pipeline)))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn fetch_handler(
    State(pipeline): State<Arc<Pipeline>>,
    method: Method,
    RawQuery(query): RawQuery,
) -> Response {
    let url = query.as_deref().and_then(url_param);

    let result = match gate(&method, url.as_deref()) {
        Ok(GateDecision::Preflight) => return StatusCode::OK.into_response(),
        Ok(GateDecision::Fetch(target)) => pipeline.run(target).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(payload) => (StatusCode::OK, Json(payload)).into_response(),
        Err(err) => {
            warn!(status = err.status_code(), error = %err, "Request failed");
            err.into_response()
        }
    }
}
