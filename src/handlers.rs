use crate::dispatcher::SourceDispatcher;
use crate::errors::AppError;
use crate::models::*;
use axum::{
    extract::{ConnectInfo, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Routes each lookup to its source and owns the per-caller rate windows.
    pub dispatcher: SourceDispatcher,
}

/// Builds the HTTP router with tracing and permissive CORS.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/consulta-cnpj", get(consulta_cnpj))
        .route("/api/consulta-externa", get(consulta_externa))
        .route("/api/consulta-crea", get(consulta_crea))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// Rate-limit key for a request: the first `X-Forwarded-For` hop, else the
/// peer address.
pub fn caller_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

async fn lookup(
    state: &AppState,
    source: LookupSource,
    raw_id: Option<String>,
    caller: String,
) -> Result<Json<serde_json::Value>, AppError> {
    let raw_id = raw_id.unwrap_or_default();
    let result = state
        .dispatcher
        .dispatch(source, &raw_id, &caller)
        .await
        .map_err(|e| AppError::new(source, e))?;
    Ok(Json(result.to_json()))
}

/// GET /api/consulta-cnpj?cnpj=
///
/// Company registry lookup.
pub async fn consulta_cnpj(
    State(state): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Query(params): Query<CnpjQueryParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let caller = caller_key(&headers, peer.map(|ConnectInfo(addr)| addr));
    lookup(&state, LookupSource::RegistryApi, params.cnpj, caller).await
}

/// GET /api/consulta-externa?cpf=
///
/// Third-party person API lookup.
pub async fn consulta_externa(
    State(state): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Query(params): Query<CpfQueryParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let caller = caller_key(&headers, peer.map(|ConnectInfo(addr)| addr));
    lookup(&state, LookupSource::ThirdPartyApi, params.cpf, caller).await
}

/// GET /api/consulta-crea?cpf=
///
/// CREA-MG professional registry lookup, scraped from the portal.
pub async fn consulta_crea(
    State(state): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Query(params): Query<CpfQueryParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let caller = caller_key(&headers, peer.map(|ConnectInfo(addr)| addr));
    lookup(&state, LookupSource::PortalScrape, params.cpf, caller).await
}
