use crate::{
    config::Config,
    errors::{into_response, AppError},
    logging::audit,
    mcp::{
        host::Host,
        rpc,
        types::{ServerInfo, ToolDescriptor},
    },
    security::{self, Throttle},
};
use anyhow::Context;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::{sync::Arc, time::Instant};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub host: Host,
    pub throttle: Throttle,
}

#[derive(Debug, Serialize)]
pub struct Capabilities<'a> {
    pub server: &'a ServerInfo,
    pub tools: Vec<ToolDescriptor>,
}

pub async fn serve(cfg: Arc<Config>, host: Host) -> anyhow::Result<()> {
    let shared = AppState { throttle: Throttle::new(&cfg.limits), cfg, host: host.clone() };
    let app = build_router(shared.clone());

    let addr: std::net::SocketAddr = format!("{}:{}", shared.cfg.transport.bind_addr, shared.cfg.transport.port)
        .parse()
        .context("parsing bind address")?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, base_path = %shared.cfg.transport.base_path, "http transport listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    host.shutdown();
    Ok(())
}

pub fn build_router(shared: AppState) -> Router {
    let base = shared.cfg.transport.base_path.clone();
    let limit_bytes = shared.cfg.limits.max_request_kb * 1024;
    Router::new()
        .route("/healthz", get(health))
        .route(&format!("{base}/capabilities"), get(capabilities))
        .route(&format!("{base}/rpc"), post(rpc_call).layer(RequestBodyLimitLayer::new(limit_bytes)))
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

async fn health(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match authorize(&state, &headers) {
        Ok(()) => (StatusCode::OK, Json(state.host.health())).into_response(),
        Err(e) => into_response(e).into_response(),
    }
}

async fn capabilities(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(e) = authorize(&state, &headers) {
        return into_response(e).into_response();
    }
    let caps = Capabilities { server: state.host.info(), tools: state.host.list_tools() };
    (StatusCode::OK, Json(caps)).into_response()
}

async fn rpc_call(State(state): State<AppState>, headers: HeaderMap, body: String) -> Response {
    let started = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string();
    let elapsed = || started.elapsed().as_millis() as u64;

    let guard = authorize(&state, &headers)
        .and_then(|_| security::content_length_ok(&headers, state.cfg.limits.max_request_kb))
        .and_then(|_| state.throttle.check());
    if let Err(e) = guard {
        audit(&request_id, "http", "", "", "deny", e.code(), elapsed());
        return into_response(e).into_response();
    }

    let req = match rpc::parse(&body) {
        Ok(req) => req,
        Err(resp) => {
            audit(&request_id, "http", "", "", "deny", "ParseError", elapsed());
            return (StatusCode::OK, Json(resp)).into_response();
        }
    };
    let method = req.method.clone();
    let target = rpc::target_of(&req);
    let resp = rpc::handle(&state.host, req).await;
    let (decision, code) = rpc::summarize(resp.as_ref());
    audit(&request_id, "http", &method, &target, decision, &code, elapsed());

    match resp {
        Some(resp) => (StatusCode::OK, Json(resp)).into_response(),
        None => (StatusCode::ACCEPTED, Json(json!({}))).into_response(),
    }
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(auth) = &state.cfg.auth else { return Ok(()) };
    security::require_bearer(headers, &auth.bearer_token)?;
    security::check_origin(headers, &auth.allowed_origins)?;
    Ok(())
}
