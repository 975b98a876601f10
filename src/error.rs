// Error kinds shared across the proxy
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("{0} not provided")]
    MissingParam(&'static str),

    /// The upstream answered with a non-200 status; the body is discarded
    /// so upstream error payloads never reach the caller verbatim.
    #[error("unable to fetch data from url: {0}")]
    Upstream(String),

    /// Tunnelled POSTs keep the upstream status so the caller sees it.
    #[error("unable to fetch data from url: {url}")]
    UpstreamStatus { url: String, status: u16 },

    #[error("error communicating with grafana: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unable to get datasource name for template variable {0:?}")]
    MalformedTemplateVar(String),

    #[error("invalid json payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProxyError {
    fn status(&self) -> StatusCode {
        match self {
            ProxyError::MissingParam(_) => StatusCode::BAD_REQUEST,
            ProxyError::UpstreamStatus { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{self}");
        }
        (status, self.to_string()).into_response()
    }
}
