// Board listing and flattening - the dashboard reshaping use case
use std::collections::HashMap;

use serde_json::Value;

use crate::application::datasource_resolver::DatasourceResolver;
use crate::domain::board::{slugify, title_case, DataSourceRef, SimplifiedBoard, TemplateVar};
use crate::domain::grafana::{DashboardByUid, FoundBoard, RawBoard, RawPanel};
use crate::error::ProxyError;
use crate::infrastructure::grafana::{GrafanaApi, GrafanaClient};

pub struct BoardService<'a> {
    client: &'a GrafanaClient,
}

impl<'a> BoardService<'a> {
    pub fn new(client: &'a GrafanaClient) -> Self {
        Self { client }
    }

    /// Fetch every dashboard the key can see and flatten each one. Any
    /// single upstream failure fails the whole request.
    pub async fn list_boards(
        &self,
        grafana_url: &str,
        api_key: &str,
        search: &str,
    ) -> Result<Vec<SimplifiedBoard>, ProxyError> {
        let api = GrafanaApi::new(self.client, grafana_url, api_key);
        // Connectivity check before the search.
        api.actual_org().await?;

        let links = api.search_dashboards(search).await?;
        let mut boards = Vec::with_capacity(links.len());
        for link in links {
            if link.kind != "dash-db" {
                continue;
            }
            let fetched = api
                .dashboard_by_uid(&link.uid)
                .await
                .inspect_err(|err| tracing::error!("error fetching dashboard {}: {err}", link.uid))?;

            let board = if self.client.prom_mode() {
                flatten_board(None, &fetched.dashboard, &link, 0).await?
            } else {
                let org = api.actual_org().await?;
                flatten_board(Some(&api), &fetched.dashboard, &link, org.id).await?
            };
            boards.push(board);
        }
        Ok(boards)
    }

    /// Fetch one dashboard by UID, unflattened, together with its metadata.
    pub async fn board_by_uid(
        &self,
        grafana_url: &str,
        api_key: &str,
        uid: &str,
    ) -> Result<DashboardByUid, ProxyError> {
        let api = GrafanaApi::new(self.client, grafana_url, api_key);
        api.dashboard_by_uid(uid).await
    }
}

/// Flatten one raw dashboard into the simplified shape.
///
/// `resolver` is `None` in Prometheus mode, where there is no Grafana API
/// to ask: the org id stays zero and datasource names are kept without a
/// numeric id.
pub async fn flatten_board(
    resolver: Option<&dyn DatasourceResolver>,
    board: &RawBoard,
    link: &FoundBoard,
    org_id: u64,
) -> Result<SimplifiedBoard, ProxyError> {
    let mut simplified = SimplifiedBoard {
        uri: link.uri.clone(),
        title: link.title.clone(),
        slug: slugify(&board.title),
        uid: board.uid.clone(),
        org_id,
        panels: Vec::new(),
        template_vars: Vec::new(),
    };

    // Datasource names are recorded in list order, so a later `$name`
    // reference only sees variables defined before it. Grafana relies on
    // the same ordering; do not reorder.
    let mut ds_names: HashMap<String, String> = HashMap::new();
    for var in &board.templating.list {
        let ds_name = match (var.kind.as_str(), &var.datasource) {
            ("datasource", _) => {
                // The datasource name lives in the query field.
                let name = title_case(&stringify(&var.query));
                ds_names.insert(var.name.clone(), name.clone());
                name
            }
            ("query", Some(ds)) => {
                let raw = stringify(ds);
                match raw.strip_prefix('$') {
                    None => raw,
                    // A missing lookup yields an empty name, not an error.
                    Some(referenced) => ds_names.get(referenced).cloned().unwrap_or_default(),
                }
            }
            _ => return Err(ProxyError::MalformedTemplateVar(var.name.clone())),
        };

        let datasource = match resolver {
            Some(resolver) => resolver.resolve(&ds_name).await?,
            None => DataSourceRef {
                id: 0,
                name: ds_name,
            },
        };

        simplified.template_vars.push(TemplateVar {
            name: var.name.clone(),
            query: stringify(&var.query),
            datasource: Some(datasource),
            hide: var.hide,
            value: var.current.text.clone(),
        });
    }

    // Panels take precedence over the legacy rows list. Text, table and
    // row panels are dropped; row containers contribute their sub-panels
    // one level deep.
    if !board.panels.is_empty() {
        for panel in &board.panels {
            if !panel.is_text() && !panel.is_table() && !panel.is_row() {
                simplified.panels.push(resolve_panel_datasource(panel, &ds_names));
            } else if panel.is_row() {
                for nested in &panel.panels {
                    if !nested.is_text() && !nested.is_table() && !nested.is_row() {
                        simplified
                            .panels
                            .push(resolve_panel_datasource(nested, &ds_names));
                    }
                }
            }
        }
    } else if !board.rows.is_empty() {
        for row in &board.rows {
            for panel in &row.panels {
                if !panel.is_text() && !panel.is_table() && !panel.is_row() {
                    simplified.panels.push(resolve_panel_datasource(panel, &ds_names));
                }
            }
        }
    }

    Ok(simplified)
}

/// Deep-copy a panel, rewriting a `$name` datasource reference to the
/// concrete name recorded for that template variable. The copy is
/// independent of the parent board.
fn resolve_panel_datasource(panel: &RawPanel, ds_names: &HashMap<String, String>) -> RawPanel {
    let mut copy = panel.clone();
    if let Some(ds) = &copy.datasource {
        let raw = stringify(ds);
        if let Some(referenced) = raw.strip_prefix('$') {
            let name = ds_names.get(referenced).cloned().unwrap_or_default();
            copy.datasource = Some(serde_json::json!({ "name": name }));
        }
    }
    copy
}

/// Bare strings render without quotes, everything else as its JSON text.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct StubResolver;

    #[async_trait]
    impl DatasourceResolver for StubResolver {
        async fn resolve(&self, name: &str) -> Result<DataSourceRef, ProxyError> {
            Ok(DataSourceRef {
                id: 7,
                name: name.to_string(),
            })
        }
    }

    fn board_from(value: Value) -> RawBoard {
        serde_json::from_value(value).unwrap()
    }

    fn link() -> FoundBoard {
        serde_json::from_value(json!({
            "uid": "abc",
            "title": "Node Exporter",
            "uri": "db/node-exporter"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_datasource_variable_indirection_resolves_in_order() {
        let board = board_from(json!({
            "uid": "abc",
            "title": "Node Exporter",
            "templating": { "list": [
                { "name": "ds0", "type": "datasource", "query": "prometheus" },
                {
                    "name": "node",
                    "type": "query",
                    "query": "label_values(up, instance)",
                    "datasource": "$ds0",
                    "hide": 2,
                    "current": { "text": "localhost:9100" }
                }
            ]}
        }));

        let out = flatten_board(Some(&StubResolver), &board, &link(), 1)
            .await
            .unwrap();

        assert_eq!(out.slug, "node-exporter");
        assert_eq!(out.org_id, 1);
        assert_eq!(out.template_vars.len(), 2);

        let node = &out.template_vars[1];
        let ds = node.datasource.as_ref().unwrap();
        assert_eq!(ds.name, "Prometheus");
        assert_eq!(ds.id, 7);
        assert_eq!(node.hide, 2);
        assert_eq!(node.value, json!("localhost:9100"));
    }

    #[tokio::test]
    async fn test_literal_datasource_and_missing_reference() {
        let board = board_from(json!({
            "templating": { "list": [
                { "name": "a", "type": "query", "query": "up", "datasource": "Loki" },
                { "name": "b", "type": "query", "query": "up", "datasource": "$missing" }
            ]}
        }));

        let out = flatten_board(None, &board, &link(), 0).await.unwrap();
        assert_eq!(out.template_vars[0].datasource.as_ref().unwrap().name, "Loki");
        // Unresolvable reference yields an empty name, not an error.
        assert_eq!(out.template_vars[1].datasource.as_ref().unwrap().name, "");
    }

    #[tokio::test]
    async fn test_query_variable_without_datasource_is_an_error() {
        let board = board_from(json!({
            "templating": { "list": [
                { "name": "broken", "type": "query", "query": "up" }
            ]}
        }));

        let err = flatten_board(None, &board, &link(), 0).await.unwrap_err();
        assert!(matches!(err, ProxyError::MalformedTemplateVar(name) if name == "broken"));
    }

    #[tokio::test]
    async fn test_row_panels_flatten_once_and_are_independent() {
        let board = board_from(json!({
            "templating": { "list": [
                { "name": "ds0", "type": "datasource", "query": "prometheus" }
            ]},
            "panels": [
                { "id": 1, "type": "graph", "datasource": "$ds0" },
                { "id": 2, "type": "text" },
                { "id": 3, "type": "table" },
                { "id": 4, "type": "row", "panels": [
                    { "id": 5, "type": "timeseries", "datasource": "Prometheus" },
                    { "id": 6, "type": "text" }
                ]}
            ]
        }));

        let out = flatten_board(None, &board, &link(), 0).await.unwrap();

        // Panel 1 kept, 2/3 dropped, 5 lifted out of the row, 6 dropped.
        let ids: Vec<i64> = out
            .panels
            .iter()
            .map(|p| p.rest.get("id").and_then(Value::as_i64).unwrap())
            .collect();
        assert_eq!(ids, vec![1, 5]);

        // The `$ds0` reference resolved against the variable table.
        assert_eq!(out.panels[0].datasource, Some(json!({ "name": "Prometheus" })));

        // Output copies are detached from the board.
        let mut mutated = out.panels[1].clone();
        mutated.rest.insert("id".to_string(), json!(99));
        assert_eq!(
            board.panels[3].panels[0].rest.get("id"),
            Some(&json!(5))
        );
    }

    #[tokio::test]
    async fn test_legacy_rows_flatten_when_panels_absent() {
        let board = board_from(json!({
            "rows": [
                { "panels": [
                    { "id": 10, "type": "graph" },
                    { "id": 11, "type": "table" }
                ]},
                { "panels": [ { "id": 12, "type": "singlestat" } ]}
            ]
        }));

        let out = flatten_board(None, &board, &link(), 0).await.unwrap();
        let ids: Vec<i64> = out
            .panels
            .iter()
            .map(|p| p.rest.get("id").and_then(Value::as_i64).unwrap())
            .collect();
        assert_eq!(ids, vec![10, 12]);
    }

    #[tokio::test]
    async fn test_panels_take_precedence_over_rows() {
        let board = board_from(json!({
            "panels": [ { "id": 1, "type": "graph" } ],
            "rows": [ { "panels": [ { "id": 2, "type": "graph" } ]} ]
        }));

        let out = flatten_board(None, &board, &link(), 0).await.unwrap();
        assert_eq!(out.panels.len(), 1);
        assert_eq!(out.panels[0].rest.get("id"), Some(&json!(1)));
    }
}
