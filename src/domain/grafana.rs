// Raw Grafana wire shapes, unknown fields preserved
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One entry of an `/api/search` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FoundBoard {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, rename = "isStarred")]
    pub is_starred: bool,
    #[serde(default, rename = "folderId")]
    pub folder_id: i64,
    #[serde(default, rename = "folderUid")]
    pub folder_uid: String,
    #[serde(default, rename = "folderTitle")]
    pub folder_title: String,
    #[serde(default, rename = "folderUrl")]
    pub folder_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Org {
    pub id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Datasource {
    pub id: u64,
    pub name: String,
}

/// `/api/dashboards/uid/{uid}` response: the dashboard plus its metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardByUid {
    pub dashboard: RawBoard,
    #[serde(default)]
    pub meta: Value,
}

/// A dashboard as Grafana returns it. Only the fields the flattener walks
/// are typed; everything else rides in `rest` so the board round-trips.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawBoard {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub panels: Vec<RawPanel>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<RawRow>,
    #[serde(default)]
    pub templating: Templating,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Templating {
    #[serde(default)]
    pub list: Vec<TemplateVariable>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateVariable {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub query: Value,
    /// Either a literal datasource name or a `$name` reference to another
    /// template variable. Newer Grafana emits an object here, so this
    /// stays an untyped value.
    #[serde(default)]
    pub datasource: Option<Value>,
    #[serde(default)]
    pub hide: u8,
    #[serde(default)]
    pub current: CurrentValue,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurrentValue {
    #[serde(default)]
    pub text: Value,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, Value>,
}

/// Legacy dashboard row, the pre-5.0 alternative to top-level panels.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRow {
    #[serde(default)]
    pub panels: Vec<RawPanel>,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPanel {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasource: Option<Value>,
    /// Sub-panels, populated when this panel is a `row` container.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub panels: Vec<RawPanel>,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, Value>,
}

impl RawPanel {
    pub fn is_text(&self) -> bool {
        self.kind == "text"
    }

    pub fn is_table(&self) -> bool {
        self.kind == "table"
    }

    pub fn is_row(&self) -> bool {
        self.kind == "row"
    }
}
