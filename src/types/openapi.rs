//! OpenAPI type definitions
//!
//! The spec tree is kept deliberately shallow: paths and operations are
//! typed, everything below the schema boundary stays `serde_json::Value`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// HTTP methods the mapper understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn parse(method: &str) -> Option<Self> {
        match method.to_lowercase().as_str() {
            "get" => Some(Self::Get),
            "post" => Some(Self::Post),
            "put" => Some(Self::Put),
            "patch" => Some(Self::Patch),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
            Self::Patch => write!(f, "PATCH"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// Parameter location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParameterLocation {
    pub fn parse(location: &str) -> Option<Self> {
        match location {
            "path" => Some(Self::Path),
            "query" => Some(Self::Query),
            "header" => Some(Self::Header),
            "cookie" => Some(Self::Cookie),
            _ => None,
        }
    }
}

/// Declared operation parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub description: Option<String>,
}

/// A single operation under a path template
#[derive(Debug, Clone, Default)]
pub struct Operation {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub parameters: Vec<ParameterSpec>,
    /// Raw `requestBody` value, possibly a `$ref` stub
    pub request_body: Option<Value>,
    /// Operation-level security requirements, raw
    pub security: Option<Vec<Value>>,
}

/// Per-template operation bag keyed by method
#[derive(Debug, Clone, Default)]
pub struct PathItem {
    pub operations: HashMap<HttpMethod, Operation>,
}

/// Reusable components of the spec, kept raw
#[derive(Debug, Clone, Default)]
pub struct Components {
    pub schemas: serde_json::Map<String, Value>,
    pub request_bodies: serde_json::Map<String, Value>,
    pub security_schemes: serde_json::Map<String, Value>,
}

/// Parsed OpenAPI 3.0 document
#[derive(Debug, Clone, Default)]
pub struct Spec {
    pub openapi: String,
    pub title: String,
    pub version: String,
    pub paths: HashMap<String, PathItem>,
    pub components: Components,
    /// Global security requirements, raw
    pub security: Vec<Value>,
}

impl Spec {
    /// Look up a path item by exact template, then by pattern where any
    /// `{name}` segment matches any concrete value.
    pub fn find_path_item(&self, path: &str) -> Option<&PathItem> {
        if let Some(item) = self.paths.get(path) {
            return Some(item);
        }
        self.paths
            .iter()
            .find(|(template, _)| template_matches(template, path))
            .map(|(_, item)| item)
    }
}

/// Whether a path template matches a concrete (or templated) path,
/// treating `{name}` segments as wildcards on both sides.
pub fn template_matches(template: &str, path: &str) -> bool {
    let t: Vec<&str> = template.split('/').filter(|s| !s.is_empty()).collect();
    let p: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if t.len() != p.len() {
        return false;
    }
    t.iter().zip(p.iter()).all(|(ts, ps)| {
        ts == ps || ts.starts_with('{') || ps.starts_with('{')
    })
}

/// One-hop-resolved schema in the generic map shape used downstream
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaShape {
    #[serde(rename = "type")]
    pub schema_type: Option<String>,
    #[serde(default)]
    pub properties: serde_json::Map<String, Value>,
    #[serde(default)]
    pub required: Vec<String>,
    pub items: Option<Value>,
}

impl SchemaShape {
    /// Coerce a raw schema value into the generic map shape. Unknown keys
    /// are dropped; leaves stay `Value`.
    pub fn from_value(value: &Value) -> Self {
        let schema_type = value
            .get("type")
            .and_then(|v| v.as_str())
            .map(String::from);

        let properties = value
            .get("properties")
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();

        let required = value
            .get("required")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        let items = value.get("items").cloned();

        Self {
            schema_type,
            properties,
            required,
            items,
        }
    }

    /// Property definition by name, if declared
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Whether a declared property is an array type
    pub fn property_is_array(&self, name: &str) -> bool {
        self.property(name)
            .and_then(|p| p.get("type"))
            .and_then(|t| t.as_str())
            .map(|t| t == "array")
            .unwrap_or(false)
    }
}

/// Extract `{name}` parameter names from a path template, in order
pub fn path_template_params(pattern: &str) -> Vec<String> {
    pattern
        .split('/')
        .filter(|seg| seg.starts_with('{') && seg.ends_with('}'))
        .map(|seg| seg[1..seg.len() - 1].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_template_params_roundtrip() {
        let pattern = "/kafka/v3/clusters/{cluster_id}/topics/{topic_name}";
        assert_eq!(
            path_template_params(pattern),
            vec!["cluster_id".to_string(), "topic_name".to_string()]
        );
    }

    #[test]
    fn test_template_matches_wildcards() {
        assert!(template_matches(
            "/iam/v2/environments/{id}",
            "/iam/v2/environments/env-123"
        ));
        assert!(!template_matches(
            "/iam/v2/environments/{id}",
            "/iam/v2/environments"
        ));
        assert!(template_matches(
            "/kafka/v3/clusters/{cluster_id}/topics",
            "/kafka/v3/clusters/{cluster_id}/topics"
        ));
    }

    #[test]
    fn test_schema_shape_coercion() {
        let raw = serde_json::json!({
            "type": "object",
            "properties": {
                "topic_name": {"type": "string"},
                "configs": {"type": "array", "items": {"type": "object"}}
            },
            "required": ["topic_name"]
        });
        let shape = SchemaShape::from_value(&raw);
        assert_eq!(shape.schema_type.as_deref(), Some("object"));
        assert_eq!(shape.required, vec!["topic_name".to_string()]);
        assert!(shape.property_is_array("configs"));
        assert!(!shape.property_is_array("topic_name"));
    }
}
