//! Semantic action and endpoint mapping types

use crate::types::openapi::{HttpMethod, SchemaShape};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Semantic verb exposed to MCP clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticAction {
    Create,
    List,
    Get,
    Update,
    Delete,
    GetTelemetry,
}

impl SemanticAction {
    /// The five CRUD actions, in tool-listing order
    pub const CRUD: [SemanticAction; 5] = [
        Self::Create,
        Self::List,
        Self::Get,
        Self::Update,
        Self::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::List => "list",
            Self::Get => "get",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::GetTelemetry => "get_telemetry",
        }
    }

    pub fn from_tool_name(name: &str) -> Option<Self> {
        match name {
            "create" => Some(Self::Create),
            "list" => Some(Self::List),
            "get" => Some(Self::Get),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            "get_telemetry" => Some(Self::GetTelemetry),
            _ => None,
        }
    }

    fn verb_phrase(&self) -> &'static str {
        match self {
            Self::Create => "Create a new instance of",
            Self::List => "List instances of",
            Self::Get => "Get a single instance of",
            Self::Update => "Update an instance of",
            Self::Delete => "Delete an instance of",
            Self::GetTelemetry => "Query telemetry metrics for",
        }
    }
}

impl std::fmt::Display for SemanticAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved request-body schema plus its content type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodySchema {
    pub schema: SchemaShape,
    pub content_type: String,
}

/// Concrete endpoint bound to an (action, resource) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointMapping {
    pub method: HttpMethod,
    pub path_pattern: String,
    pub required_params: Vec<String>,
    pub optional_params: Vec<String>,
    pub body: Option<BodySchema>,
}

impl EndpointMapping {
    /// `METHOD PATH` form used for security-type lookup and logging
    pub fn endpoint_string(&self) -> String {
        format!("{} {}", self.method, self.path_pattern)
    }
}

/// Tool advertised over MCP
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolDescriptor {
    /// Build the descriptor for a semantic action over its resources.
    /// Resource-specific schemas are not advertised; callers discover
    /// required parameters through the missing-params result.
    pub fn for_action(action: SemanticAction, mut resources: Vec<String>) -> Self {
        resources.sort();
        let description = format!(
            "{} one of the supported resources: {}",
            action.verb_phrase(),
            resources.join(", ")
        );

        let mut required = vec!["resource"];
        let mut properties = json!({
            "resource": {
                "type": "string",
                "enum": resources,
                "description": "Resource to operate on"
            },
            "parameters": {
                "type": "object",
                "description": "Resource-specific parameters",
                "additionalProperties": true
            }
        });

        if action == SemanticAction::GetTelemetry {
            properties["dataset"] = json!({
                "type": "string",
                "description": "Telemetry dataset, e.g. cloud"
            });
            required.push("dataset");
        }

        Self {
            name: action.as_str().to_string(),
            description,
            input_schema: json!({
                "type": "object",
                "properties": properties,
                "required": required
            }),
        }
    }

    pub fn to_mcp_value(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_action_round_trip() {
        for action in SemanticAction::CRUD {
            assert_eq!(
                SemanticAction::from_tool_name(action.as_str()),
                Some(action)
            );
        }
        assert_eq!(
            SemanticAction::from_tool_name("get_telemetry"),
            Some(SemanticAction::GetTelemetry)
        );
        assert_eq!(SemanticAction::from_tool_name("drop"), None);
    }

    #[test]
    fn test_tool_descriptor_shape() {
        let tool = ToolDescriptor::for_action(
            SemanticAction::List,
            vec!["topics".to_string(), "environments".to_string()],
        );
        assert_eq!(tool.name, "list");
        let schema = &tool.input_schema;
        let resources: Vec<&str> = schema["properties"]["resource"]["enum"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        // enum is sorted for stable tool listings
        assert_eq!(resources, vec!["environments", "topics"]);
        assert_eq!(schema["required"], json!(["resource"]));
    }

    #[test]
    fn test_telemetry_tool_requires_dataset() {
        let tool = ToolDescriptor::for_action(
            SemanticAction::GetTelemetry,
            vec!["metrics".to_string()],
        );
        assert_eq!(tool.input_schema["required"], json!(["resource", "dataset"]));
    }
}
