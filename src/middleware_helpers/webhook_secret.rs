use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

/// Header carrying the shared secret on courier callbacks
pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

/// Rejects callbacks whose shared-secret header does not match.
/// Only layered when a secret is configured.
pub async fn webhook_secret_middleware(
    State(secret): State<Arc<String>>,
    request: Request,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !constant_time_eq(provided.trim(), secret.as_str()) {
        warn!(uri = %request.uri(), "webhook rejected: shared secret mismatch");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "message": "Invalid webhook secret" })),
        )
            .into_response();
    }

    next.run(request).await
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}
