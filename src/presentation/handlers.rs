// HTTP request handlers
use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;

use crate::application::board_service::BoardService;
use crate::application::query_service::QueryService;
use crate::error::ProxyError;
use crate::infrastructure::grafana::GrafanaClient;
use crate::presentation::app_state::AppState;

/// Required query parameter; empty counts as missing. Failing here means
/// no outbound call is ever attempted.
fn require<'p>(
    params: &'p HashMap<String, String>,
    key: &str,
    label: &'static str,
) -> Result<&'p str, ProxyError> {
    match params.get(key).map(String::as_str) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ProxyError::MissingParam(label)),
    }
}

/// `GET /grafana-ds` — every dashboard visible to the key, flattened.
pub async fn list_boards(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ProxyError> {
    let grafana_url = require(&params, "grafanaUrl", "Grafana url")?;
    let api_key = require(&params, "apiKey", "Grafana api key (userId:password)")?;
    let search = params
        .get("dashboardSearch")
        .map(String::as_str)
        .unwrap_or_default();

    let client = GrafanaClient::new(state.config.prometheus_mode)?;
    let boards = BoardService::new(&client)
        .list_boards(grafana_url, api_key, search)
        .await?;
    Ok(Json(boards))
}

/// `GET /grafana-ds/dashboard` — one dashboard by UID with its metadata.
pub async fn dashboard_by_uid(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ProxyError> {
    let grafana_url = require(&params, "grafanaUrl", "Grafana url")?;
    let api_key = require(&params, "apiKey", "Grafana api key (userId:password)")?;
    let uid = params.get("uid").map(String::as_str).unwrap_or_default();

    let client = GrafanaClient::new(state.config.prometheus_mode)?;
    let board = BoardService::new(&client)
        .board_by_uid(grafana_url, api_key, uid)
        .await?;
    Ok(Json(board))
}

/// `GET /grafana-ds-query` — templated query translation, raw bytes back.
pub async fn query(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ProxyError> {
    let grafana_url = require(&params, "grafanaUrl", "Grafana url")?;
    let api_key = require(&params, "apiKey", "Grafana api key (userId:password)")?;

    let client = GrafanaClient::new(state.config.prometheus_mode)?;
    let data = QueryService::new(&client)
        .query(grafana_url, api_key, &params)
        .await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], data))
}

/// `GET /grafana-ds/query-range` — Prometheus range query, raw bytes back.
pub async fn query_range(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ProxyError> {
    let url = require(&params, "url", "Grafana url")?;
    let api_key = require(&params, "api-key", "Grafana api key (userId:password)")?;

    let client = GrafanaClient::new(state.config.prometheus_mode)?;
    let data = QueryService::new(&client)
        .query_range(url, api_key, &params)
        .await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], data))
}

/// `POST /grafana-api` — raw tunnel; the body is forwarded verbatim with
/// the API key set as a custom header.
pub async fn api_tunnel(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<impl IntoResponse, ProxyError> {
    let grafana_url = require(&params, "grafanaUrl", "Grafana url")?;
    let api_key = require(&params, "apiKey", "Grafana api key (userId:password)")?;

    let client = GrafanaClient::new(state.config.prometheus_mode)?;
    let data = client.proxy_post(grafana_url, api_key, body).await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], data))
}
