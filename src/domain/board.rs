// Simplified board model served to the UI
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::grafana::RawPanel;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimplifiedBoard {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uri: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub slug: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub org_id: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub panels: Vec<RawPanel>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub template_vars: Vec<TemplateVar>,
}

/// A template variable with its datasource reference resolved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateVar {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasource: Option<DataSourceRef>,
    #[serde(default, skip_serializing_if = "is_zero_u8")]
    pub hide: u8,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub value: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataSourceRef {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub id: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}

fn is_zero_u8(v: &u8) -> bool {
    *v == 0
}

/// URL-safe slug: lower-case, non-alphanumeric runs collapsed to single
/// hyphens, no leading or trailing hyphen.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

/// Lower-case the input, then upper-case the first letter of each word.
/// Grafana stores datasource names title-cased while dashboards reference
/// them in arbitrary case.
pub fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut at_word_start = true;
    for c in value.to_lowercase().chars() {
        if c.is_alphanumeric() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.push(c);
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}
