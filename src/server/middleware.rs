// src/server/middleware.rs

//! Interceptor chain for the RPC surface
//!
//! Three layers wrap every handler, outermost first: activity (stamps the
//! idle-shutdown clock before dispatch), logging (method, duration,
//! outcome), and the panic shield (recovers faults into an Internal
//! response so one bad call never takes the service down).

use super::ServiceState;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use std::time::Instant;
use tower_http::catch_panic::CatchPanicLayer;

/// Stamp `last_activity` before dispatching
pub async fn activity(
    State(state): State<Arc<ServiceState>>,
    request: Request,
    next: Next,
) -> Response {
    state.touch_activity();
    next.run(request).await
}

/// Log method, duration, and outcome of every call
pub async fn logging(request: Request, next: Next) -> Response {
    let method = request
        .uri()
        .path()
        .rsplit('/')
        .next()
        .unwrap_or("unknown")
        .to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let duration = start.elapsed();
    if response.status().is_success() {
        tracing::info!(%method, ?duration, "rpc call");
    } else {
        tracing::error!(%method, ?duration, status = %response.status(), "rpc call failed");
    }
    response
}

/// Convert recovered panics into an `Internal` response
pub fn panic_shield() -> CatchPanicLayer<fn(Box<dyn std::any::Any + Send + 'static>) -> Response<Body>> {
    CatchPanicLayer::custom(handle_panic as fn(Box<dyn std::any::Any + Send + 'static>) -> Response<Body>)
}

fn handle_panic(panic: Box<dyn std::any::Any + Send + 'static>) -> Response<Body> {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "unknown panic".to_string()
    };

    tracing::error!(panic = %detail, "panic recovered in rpc handler");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "application/json")],
        r#"{"error":"internal server error"}"#,
    )
        .into_response()
}
