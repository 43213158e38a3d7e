// src/auth.rs

//! Bearer-token gate for the mutating API routes.
//!
//! The key comes from `VMKEEPER_API_KEY`; `/health` stays open so load
//! balancers can probe without credentials.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::env;

pub async fn api_key_auth(req: Request<Body>, next: Next) -> Response {
    let expected = match env::var("VMKEEPER_API_KEY") {
        Ok(v) if !v.is_empty() => v,
        _ => {
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "API key not configured");
        }
    };

    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(token) if token == expected => next.run(req).await,
        _ => error_response(StatusCode::UNAUTHORIZED, "Unauthorized"),
    }
}

fn error_response(status: StatusCode, error: &str) -> Response {
    (
        status,
        Json(serde_json::json!({
            "ok": false,
            "error": error,
        })),
    )
        .into_response()
}
