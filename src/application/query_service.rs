// Templated query translation for Grafana / Prometheus datasources
use std::collections::HashMap;

use bytes::Bytes;

use crate::error::ProxyError;
use crate::infrastructure::grafana::{GrafanaApi, GrafanaClient};

/// Outcome of translating a query expression: either a concrete upstream
/// URL or a payload answered locally without any upstream call. Never both.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryTarget {
    Url(String),
    Inline(Vec<u8>),
}

pub struct QueryService<'a> {
    client: &'a GrafanaClient,
}

impl<'a> QueryService<'a> {
    pub fn new(client: &'a GrafanaClient) -> Self {
        Self { client }
    }

    /// Translate and execute a templated query against the Grafana
    /// datasource proxy (or Prometheus directly).
    pub async fn query(
        &self,
        base_url: &str,
        api_key: &str,
        params: &HashMap<String, String>,
    ) -> Result<Bytes, ProxyError> {
        let base_url = base_url.trim_end_matches('/');
        match build_query_target(base_url, params, self.client.prom_mode())? {
            QueryTarget::Inline(payload) => Ok(Bytes::from(payload)),
            QueryTarget::Url(url) => {
                tracing::debug!("derived query url: {url}");
                self.client.make_request(&url, api_key).await
            }
        }
    }

    /// Execute a range query, resolving the `ds` datasource name to its
    /// numeric id first.
    pub async fn query_range(
        &self,
        base_url: &str,
        api_key: &str,
        params: &HashMap<String, String>,
    ) -> Result<Bytes, ProxyError> {
        let api = GrafanaApi::new(self.client, base_url, api_key);
        let ds = api.datasource_by_name(param(params, "ds")).await?;

        let req_url = if self.client.prom_mode() {
            format!("{}/api/v1/query_range", api.base_url())
        } else {
            format!(
                "{}/api/datasources/proxy/{}/api/v1/query_range",
                api.base_url(),
                ds.id
            )
        };
        let url = reqwest::Url::parse_with_params(
            &req_url,
            &[
                ("query", param(params, "query")),
                ("start", param(params, "start")),
                ("end", param(params, "end")),
                ("step", param(params, "step")),
            ],
        )
        .map_err(|_| ProxyError::Upstream(req_url.clone()))?;

        tracing::debug!("derived query url: {url}");
        self.client.make_request(url.as_str(), api_key).await
    }
}

/// Translate the two templated query families (`label_values(...)`,
/// `query_result(...)`) into a concrete upstream URL. Anything else is
/// answered locally with a success envelope so unsupported expressions
/// never hit the upstream.
pub fn build_query_target(
    base_url: &str,
    params: &HashMap<String, String>,
    prom_mode: bool,
) -> Result<QueryTarget, ProxyError> {
    let query = param(params, "query").trim();
    let ds_id = param(params, "dsid");

    if let Some(inner) = query.strip_prefix("label_values(") {
        let mut val = inner.strip_suffix(')').unwrap_or(inner).trim().to_string();
        if val.contains(',') {
            // label_values(<metric expr>, <label>[, <duration>]):
            // search series matching the expression. The trailing label
            // (and optional duration) sits after the last ", ".
            let start = param(params, "start");
            let end = param(params, "end");
            if let Some(idx) = val.rfind(", ") {
                val.truncate(idx);
            }
            substitute_params(&mut val, params, &["query", "dsid", "start", "end"]);

            let req_url = if prom_mode {
                format!("{base_url}/api/v1/series")
            } else {
                format!("{base_url}/api/datasources/proxy/{ds_id}/api/v1/series")
            };
            let mut pairs = vec![("match[]", val.as_str())];
            if !start.is_empty() && !end.is_empty() {
                pairs.push(("start", start));
                pairs.push(("end", end));
            }
            let url = reqwest::Url::parse_with_params(&req_url, &pairs)
                .map_err(|_| ProxyError::Upstream(req_url.clone()))?;
            Ok(QueryTarget::Url(url.to_string()))
        } else {
            // label_values(<label>): enumerate values of one label.
            let url = if prom_mode {
                format!("{base_url}/api/v1/label/{val}/values")
            } else {
                format!("{base_url}/api/datasources/proxy/{ds_id}/api/v1/label/{val}/values")
            };
            Ok(QueryTarget::Url(url))
        }
    } else if let Some(inner) = query.strip_prefix("query_result(") {
        let mut val = inner.strip_suffix(')').unwrap_or(inner).trim().to_string();
        substitute_params(&mut val, params, &["query", "dsid"]);

        let req_url = if prom_mode {
            format!("{base_url}/api/v1/query")
        } else {
            format!("{base_url}/api/datasources/proxy/{ds_id}/api/v1/query")
        };
        let url = reqwest::Url::parse_with_params(&req_url, &[("query", val.as_str())])
            .map_err(|_| ProxyError::Upstream(req_url.clone()))?;
        Ok(QueryTarget::Url(url.to_string()))
    } else {
        // Fallback for expressions the builder does not understand. The
        // envelope mimics a Prometheus success response carrying the
        // original query; it must not be mistaken for real data.
        let payload = serde_json::to_vec(&serde_json::json!({
            "status": "success",
            "data": [query],
        }))?;
        Ok(QueryTarget::Inline(payload))
    }
}

/// Replace `$<key>` with each request parameter's value, excluding the
/// reserved keys.
fn substitute_params(val: &mut String, params: &HashMap<String, String>, exclude: &[&str]) {
    for (key, value) in params {
        if !exclude.contains(&key.as_str()) {
            *val = val.replace(&format!("${key}"), value);
        }
    }
}

fn param<'p>(params: &'p HashMap<String, String>, key: &str) -> &'p str {
    params.get(key).map(String::as_str).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn query_pairs(url: &str) -> Vec<(String, String)> {
        reqwest::Url::parse(url)
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn test_label_values_with_metric_substitutes_and_strips_duration() {
        let params = params(&[
            ("query", "label_values(metric{job=\"$job\"}, 1d)"),
            ("dsid", "3"),
            ("job", "api"),
        ]);
        let target = build_query_target("http://g", &params, false).unwrap();

        let QueryTarget::Url(url) = target else {
            panic!("expected a derived URL");
        };
        assert!(url.starts_with("http://g/api/datasources/proxy/3/api/v1/series?"));
        assert_eq!(
            query_pairs(&url),
            vec![("match[]".to_string(), "metric{job=\"api\"}".to_string())]
        );
    }

    #[test]
    fn test_label_values_copies_start_end_only_when_both_present() {
        let both = params(&[
            ("query", "label_values(up{job=\"node\"}, instance)"),
            ("dsid", "1"),
            ("start", "100"),
            ("end", "200"),
        ]);
        let QueryTarget::Url(url) = build_query_target("http://g", &both, false).unwrap() else {
            panic!("expected a derived URL");
        };
        let pairs = query_pairs(&url);
        assert!(pairs.contains(&("start".to_string(), "100".to_string())));
        assert!(pairs.contains(&("end".to_string(), "200".to_string())));

        let only_start = params(&[
            ("query", "label_values(up{job=\"node\"}, instance)"),
            ("dsid", "1"),
            ("start", "100"),
        ]);
        let QueryTarget::Url(url) = build_query_target("http://g", &only_start, false).unwrap()
        else {
            panic!("expected a derived URL");
        };
        let pairs = query_pairs(&url);
        assert!(!pairs.iter().any(|(k, _)| k == "start"));
    }

    #[test]
    fn test_bare_label_values_builds_label_url() {
        let params = params(&[("query", "label_values(instance)"), ("dsid", "2")]);
        let target = build_query_target("http://g", &params, false).unwrap();
        assert_eq!(
            target,
            QueryTarget::Url(
                "http://g/api/datasources/proxy/2/api/v1/label/instance/values".to_string()
            )
        );

        let prom = build_query_target("http://prom", &params, true).unwrap();
        assert_eq!(
            prom,
            QueryTarget::Url("http://prom/api/v1/label/instance/values".to_string())
        );
    }

    #[test]
    fn test_query_result_passes_expression_through() {
        let params = params(&[("query", "query_result(up)"), ("dsid", "4")]);
        let QueryTarget::Url(url) = build_query_target("http://g", &params, false).unwrap() else {
            panic!("expected a derived URL");
        };
        assert_eq!(
            query_pairs(&url),
            vec![("query".to_string(), "up".to_string())]
        );
    }

    #[test]
    fn test_query_result_substitutes_other_params() {
        let params = params(&[
            ("query", "query_result(sum(up{instance=\"$node\"}))"),
            ("node", "web-1"),
        ]);
        let QueryTarget::Url(url) = build_query_target("http://prom", &params, true).unwrap()
        else {
            panic!("expected a derived URL");
        };
        assert_eq!(
            query_pairs(&url),
            vec![(
                "query".to_string(),
                "sum(up{instance=\"web-1\"})".to_string()
            )]
        );
    }

    #[test]
    fn test_unrecognized_query_returns_inline_envelope() {
        let params = params(&[("query", "foo_bar")]);
        let target = build_query_target("http://g", &params, false).unwrap();
        assert_eq!(
            target,
            QueryTarget::Inline(br#"{"data":["foo_bar"],"status":"success"}"#.to_vec())
        );
    }
}
