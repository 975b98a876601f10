// Main entry point - configuration, router wiring, server setup
mod application;
mod domain;
mod error;
mod infrastructure;
mod presentation;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::infrastructure::config::load_server_config;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{api_tunnel, dashboard_by_uid, list_boards, query, query_range};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = load_server_config()?;

    // Credentials cannot be combined with a wildcard origin, so allow-all
    // mode drops them.
    let cors = if config.cors_allow_all {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(config.cors_allow_origin.parse::<HeaderValue>()?)
            .allow_credentials(true)
    };

    let state = Arc::new(AppState {
        config: config.clone(),
    });

    let mut router = Router::new()
        .route("/grafana-ds", get(list_boards))
        .route("/grafana-ds-query", get(query))
        .route("/grafana-ds/query-range", get(query_range))
        .route("/grafana-ds/dashboard", get(dashboard_by_uid))
        .route("/grafana-api", post(api_tunnel))
        .layer(cors)
        .with_state(state);
    if config.gzip_enabled {
        router = router.layer(CompressionLayer::new().gzip(true));
    }
    if config.audit_log {
        router = router.layer(TraceLayer::new_for_http());
    }

    let addr: SocketAddr = format!("{}:{}", config.address, config.port).parse()?;
    tracing::info!("starting grafana proxy on {addr}");

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
