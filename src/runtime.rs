// src/runtime.rs

//! HTTP API surface.
//!
//! Submission is asynchronous: `POST /operations/{kind}` fans the selected
//! FCOs into the worker pools and returns task descriptors immediately;
//! callers poll `GET /tasks/{id}` until the action is done. One shared
//! abort signal covers the whole server and is cleared explicitly after an
//! abort has been handled.

use crate::auth::api_key_auth;
use crate::abort::AbortSignal;
use crate::config::Config;
use crate::engine::run::{submit_async, Collaborators, CommandContext};
use crate::engine::{ActionId, OperationKind};
use crate::dispatch::ThreadsManager;
use crate::fco::TargetFilter;
use crate::ops::OperationOptions;
use crate::tasks::TaskRegistry;

use axum::extract::{Path, State};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::Span;

/* ---------------- server state ---------------- */

pub struct AppState {
    pub deps: Collaborators,
    pub threads: ThreadsManager,
    pub registry: TaskRegistry,
    pub abort: AbortSignal,
    pub default_keep: u32,
}

impl AppState {
    pub fn from_config(cfg: &Config, deps: Collaborators) -> Self {
        Self {
            deps,
            threads: ThreadsManager::new(cfg.pools.sizes()),
            registry: TaskRegistry::new(),
            abort: AbortSignal::new(),
            default_keep: cfg.options.keep_generations,
        }
    }
}

/* ---------------- server ---------------- */

const REGISTRY_SWEEP_PERIOD: Duration = Duration::from_secs(60);
const RETIRED_TASK_TTL_MINUTES: i64 = 10;

pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    let state = Arc::new(state);
    let app = router(state.clone());

    tokio::spawn(sweep_registry(state));

    let socket: SocketAddr = addr.parse()?;
    let listener = TcpListener::bind(socket).await?;

    tracing::info!("vmkeeper api listening on http://{}", socket);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Periodically drop finished tasks nobody polled; clients that abandon a
/// submission must not pin registry entries for the server's lifetime.
async fn sweep_registry(state: Arc<AppState>) {
    let mut tick = tokio::time::interval(REGISTRY_SWEEP_PERIOD);
    loop {
        tick.tick().await;
        let removed = state
            .registry
            .sweep_done(chrono::Duration::minutes(RETIRED_TASK_TTL_MINUTES));
        if removed > 0 {
            tracing::debug!(removed, "retired unpolled finished tasks");
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/operations/:kind", post(submit_operation))
        .route("/tasks/:id", get(poll_task))
        .route("/abort", post(trigger_abort).delete(clear_abort))
        .layer(middleware::from_fn(api_key_auth));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request<Body>| {
                    tracing::info_span!(
                        "http_request",
                        method = %req.method(),
                        path = %req.uri().path(),
                    )
                })
                .on_response(|res: &Response, latency: Duration, _span: &Span| {
                    tracing::info!(
                        status = res.status().as_u16(),
                        latency_ms = latency.as_millis(),
                        "request completed"
                    );
                }),
        )
        .with_state(state)
}

/* ---------------- request models ---------------- */

#[derive(Debug, Deserialize)]
struct SubmitRequest {
    filter: TargetFilter,
    #[serde(default)]
    options: OperationOptions,
}

/* ---------------- endpoints ---------------- */

async fn health() -> &'static str {
    "ok"
}

async fn submit_operation(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Json(req): Json<SubmitRequest>,
) -> Response {
    let kind: OperationKind = match kind.parse() {
        Ok(kind) => kind,
        Err(e) => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "ok": false, "error": e })),
            )
                .into_response();
        }
    };

    let mut options = req.options;
    if kind == OperationKind::ArchiveRemove && options.keep_generations.is_none() {
        options.keep_generations = Some(state.default_keep);
    }

    let ctx = CommandContext {
        kind,
        filter: req.filter,
        options,
        abort: state.abort.clone(),
    };
    let tasks = submit_async(ctx, &state.deps, &state.threads, &state.registry);

    (StatusCode::ACCEPTED, Json(tasks.descriptor())).into_response()
}

async fn poll_task(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.registry.poll(&ActionId(id)) {
        Some(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "ok": false, "error": "unknown or retired task" })),
        )
            .into_response(),
    }
}

async fn trigger_abort(State(state): State<Arc<AppState>>) -> Response {
    state.abort.trigger();
    tracing::warn!("abort requested via api");
    (StatusCode::ACCEPTED, Json(serde_json::json!({ "ok": true }))).into_response()
}

async fn clear_abort(State(state): State<Arc<AppState>>) -> Response {
    state.abort.clear();
    tracing::info!("abort signal cleared");
    (StatusCode::OK, Json(serde_json::json!({ "ok": true }))).into_response()
}
