// Grafana HTTP client and the per-request API wrapper
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::application::datasource_resolver::DatasourceResolver;
use crate::domain::board::DataSourceRef;
use crate::domain::grafana::{DashboardByUid, Datasource, FoundBoard, Org};
use crate::error::ProxyError;

const USER_AGENT: &str = "grafana-proxy";

/// Outbound calls are bounded by a fixed timeout; there are no retries.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(25);

#[derive(Debug, Clone)]
pub struct GrafanaClient {
    http: reqwest::Client,
    prom_mode: bool,
}

impl GrafanaClient {
    /// Build a client. In Prometheus mode requests go straight to a
    /// Prometheus-compatible API, which does not take the Grafana API-key
    /// header.
    pub fn new(prom_mode: bool) -> Result<Self, ProxyError> {
        let http = reqwest::Client::builder().timeout(CLIENT_TIMEOUT).build()?;
        Ok(Self { http, prom_mode })
    }

    pub fn prom_mode(&self) -> bool {
        self.prom_mode
    }

    /// GET a Grafana or Prometheus URL, re-authenticating with the caller's
    /// key. Non-200 responses are logged and reported with a synthetic
    /// message; the upstream body is never forwarded.
    pub async fn make_request(&self, url: &str, api_key: &str) -> Result<Bytes, ProxyError> {
        let mut request = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .header("User-Agent", USER_AGENT);
        if !self.prom_mode {
            request = request.header("Authorization", api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            tracing::error!("unable to get data from URL: {url} due to status code: {status}");
            return Err(ProxyError::Upstream(url.to_string()));
        }
        Ok(response.bytes().await?)
    }

    /// POST a body verbatim to the given URL with the API key as a custom
    /// header. This is a raw tunnel: body bytes are preserved exactly and
    /// upstream error statuses propagate to the caller.
    pub async fn proxy_post(
        &self,
        url: &str,
        api_key: &str,
        body: Bytes,
    ) -> Result<Bytes, ProxyError> {
        let response = self
            .http
            .post(url)
            .header("api-key", api_key)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK && status != reqwest::StatusCode::CREATED {
            tracing::error!("unable to get data from URL: {url} due to status code: {status}");
            return Err(ProxyError::UpstreamStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?)
    }
}

/// Per-request wrapper over the Grafana REST API for one base URL and key.
pub struct GrafanaApi<'a> {
    client: &'a GrafanaClient,
    base_url: String,
    api_key: String,
}

impl<'a> GrafanaApi<'a> {
    pub fn new(client: &'a GrafanaClient, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ProxyError> {
        let data = self.client.make_request(url, &self.api_key).await?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Fetch the current organization. Doubles as the connectivity check:
    /// the endpoint answers for any key that can reach the server.
    pub async fn actual_org(&self) -> Result<Org, ProxyError> {
        self.get_json(&format!("{}/api/org", self.base_url)).await
    }

    pub async fn search_dashboards(&self, query: &str) -> Result<Vec<FoundBoard>, ProxyError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/api/search", self.base_url),
            &[("query", query), ("starred", "false")],
        )
        .map_err(|_| ProxyError::Upstream(self.base_url.clone()))?;
        self.get_json(url.as_str()).await
    }

    pub async fn dashboard_by_uid(&self, uid: &str) -> Result<DashboardByUid, ProxyError> {
        let url = format!(
            "{}/api/dashboards/uid/{}",
            self.base_url,
            urlencoding::encode(uid)
        );
        self.get_json(&url).await
    }

    pub async fn datasource_by_name(&self, name: &str) -> Result<Datasource, ProxyError> {
        let url = format!(
            "{}/api/datasources/name/{}",
            self.base_url,
            urlencoding::encode(name)
        );
        self.get_json(&url).await
    }
}

#[async_trait]
impl DatasourceResolver for GrafanaApi<'_> {
    async fn resolve(&self, name: &str) -> Result<DataSourceRef, ProxyError> {
        let ds = self.datasource_by_name(name).await?;
        Ok(DataSourceRef {
            id: ds.id,
            name: ds.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = GrafanaClient::new(false).unwrap();
        let api = GrafanaApi::new(&client, "http://grafana:3000/", "key");
        assert_eq!(api.base_url(), "http://grafana:3000");
    }
}
