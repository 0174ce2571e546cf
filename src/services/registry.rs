//! Endpoint mapper and the (action × resource) semantic registry

use crate::services::classify::{classify_action, extract_resource};
use crate::services::loader::{resolve_request_body, resolve_schema};
use crate::types::*;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, warn};

/// Preferred request-body media types, in order
const MEDIA_PREFERENCE: [&str; 2] = ["application/json", "application/vnd.confluent+json"];

/// Registry of endpoint mappings keyed by action, then resource.
/// Written once per spec load; read concurrently afterwards.
pub struct SemanticRegistry {
    inner: RwLock<HashMap<SemanticAction, HashMap<String, EndpointMapping>>>,
}

impl Default for SemanticRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SemanticRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Populate CRUD actions from the main spec. Later entries for the same
    /// (action, resource) overwrite earlier ones.
    pub fn load_spec(&self, spec: &Spec) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        for (path, item) in &spec.paths {
            let Some(resource) = extract_resource(path) else {
                debug!(path = %path, "no resource name, skipping path");
                continue;
            };
            for (method, op) in &item.operations {
                let Some(action) = classify_action(*method, path) else {
                    continue;
                };
                let mapping = map_endpoint(spec, *method, path, op);
                inner
                    .entry(action)
                    .or_default()
                    .insert(resource.clone(), mapping);
            }
        }
    }

    /// Populate `get_telemetry` from the telemetry spec. Only GET and POST
    /// are mapped (POST arms are read-flavored queries); every mapping
    /// requires `dataset`.
    pub fn load_telemetry_spec(&self, spec: &Spec) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        for (path, item) in &spec.paths {
            let Some(resource) = extract_resource(path) else {
                continue;
            };
            for (method, op) in &item.operations {
                if !matches!(method, HttpMethod::Get | HttpMethod::Post) {
                    continue;
                }
                let mut mapping = map_endpoint(spec, *method, path, op);
                if !mapping.required_params.iter().any(|p| p == "dataset") {
                    mapping.required_params.push("dataset".to_string());
                }
                inner
                    .entry(SemanticAction::GetTelemetry)
                    .or_default()
                    .insert(resource.clone(), mapping);
            }
        }
    }

    pub fn lookup(&self, action: SemanticAction, resource: &str) -> Option<EndpointMapping> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .get(&action)
            .and_then(|by_resource| by_resource.get(resource))
            .cloned()
    }

    pub fn resources_for(&self, action: SemanticAction) -> Vec<String> {
        let mut resources: Vec<String> = self
            .inner
            .read()
            .expect("registry lock poisoned")
            .get(&action)
            .map(|by_resource| by_resource.keys().cloned().collect())
            .unwrap_or_default();
        resources.sort();
        resources
    }

    /// One tool per action that has at least one resource mapped
    pub fn tool_descriptors(&self) -> Vec<ToolDescriptor> {
        let mut tools = Vec::new();
        for action in SemanticAction::CRUD
            .into_iter()
            .chain([SemanticAction::GetTelemetry])
        {
            let resources = self.resources_for(action);
            if !resources.is_empty() {
                tools.push(ToolDescriptor::for_action(action, resources));
            }
        }
        tools
    }
}

/// Build an endpoint mapping from an operation.
///
/// Required parameters are the union of declared-required parameters, the
/// path-template parameters, and the top-level `required` names of the
/// request-body schema.
fn map_endpoint(
    spec: &Spec,
    method: HttpMethod,
    path: &str,
    op: &Operation,
) -> EndpointMapping {
    let mut required_params: Vec<String> = Vec::new();
    let mut optional_params: Vec<String> = Vec::new();

    for param in &op.parameters {
        if param.required {
            push_unique(&mut required_params, &param.name);
        } else {
            push_unique(&mut optional_params, &param.name);
        }
    }

    for template_param in path_template_params(path) {
        push_unique(&mut required_params, &template_param);
    }

    let body = op.request_body.as_ref().and_then(|raw| {
        match resolve_body_schema(spec, raw) {
            Ok(body) => body,
            Err(e) => {
                warn!(%method, path, error = %e, "request body schema not mapped");
                None
            }
        }
    });

    if let Some(body) = &body {
        for name in &body.schema.required {
            push_unique(&mut required_params, name);
        }
    }

    EndpointMapping {
        method,
        path_pattern: path.to_string(),
        required_params,
        optional_params,
        body,
    }
}

fn push_unique(params: &mut Vec<String>, name: &str) {
    if !params.iter().any(|p| p == name) {
        params.push(name.to_string());
    }
}

/// Resolve a raw `requestBody` into a typed body schema: one `$ref` hop,
/// preferred media entry, one schema `$ref` hop.
fn resolve_body_schema(spec: &Spec, raw: &Value) -> ServerResult<Option<BodySchema>> {
    let resolved = resolve_request_body(spec, raw)?;
    let Some(content) = resolved.get("content").and_then(|v| v.as_object()) else {
        return Ok(None);
    };

    let Some((content_type, media)) = MEDIA_PREFERENCE
        .iter()
        .find_map(|ct| content.get(*ct).map(|m| (ct.to_string(), m)))
        .or_else(|| content.iter().next().map(|(ct, m)| (ct.clone(), m)))
    else {
        return Ok(None);
    };

    let schema = match media.get("schema") {
        Some(raw_schema) => resolve_schema(spec, raw_schema)?,
        None => SchemaShape::default(),
    };

    Ok(Some(BodySchema {
        schema,
        content_type,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::loader::SpecLoader;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample_spec() -> Spec {
        let doc = json!({
            "openapi": "3.0.0",
            "info": {"title": "CCloud", "version": "1"},
            "paths": {
                "/iam/v2/environments": {
                    "get": {},
                    "post": {
                        "requestBody": {
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/EnvSpec"}
                                }
                            }
                        }
                    }
                },
                "/iam/v2/environments/{id}": {
                    "get": {},
                    "patch": {},
                    "delete": {}
                },
                "/kafka/v3/clusters/{cluster_id}/topics": {
                    "get": {},
                    "post": {
                        "requestBody": {"$ref": "#/components/requestBodies/CreateTopic"},
                        "parameters": [
                            {"name": "validate_only", "in": "query", "required": false}
                        ]
                    }
                },
                "/kafka/v3/clusters/{cluster_id}/topics/{topic_name}": {
                    "get": {},
                    "delete": {}
                }
            },
            "components": {
                "requestBodies": {
                    "CreateTopic": {
                        "content": {
                            "application/vnd.confluent+json": {
                                "schema": {
                                    "type": "object",
                                    "properties": {
                                        "topic_name": {"type": "string"},
                                        "partitions_count": {"type": "integer"},
                                        "configs": {"type": "array", "items": {"type": "object"}}
                                    },
                                    "required": ["topic_name"]
                                }
                            }
                        }
                    }
                },
                "schemas": {
                    "EnvSpec": {
                        "type": "object",
                        "properties": {"display_name": {"type": "string"}},
                        "required": ["display_name"]
                    }
                }
            }
        });
        SpecLoader::parse_value(doc).unwrap()
    }

    fn build_registry() -> SemanticRegistry {
        let registry = SemanticRegistry::new();
        registry.load_spec(&sample_spec());
        registry
    }

    #[test]
    fn test_mappings_exist_per_action() {
        let registry = build_registry();
        assert!(registry.lookup(SemanticAction::List, "topics").is_some());
        assert!(registry.lookup(SemanticAction::Create, "topics").is_some());
        assert!(registry.lookup(SemanticAction::Get, "environments").is_some());
        assert!(registry.lookup(SemanticAction::Delete, "topics").is_some());
        assert!(registry.lookup(SemanticAction::Update, "environments").is_some());
        assert!(registry.lookup(SemanticAction::List, "nope").is_none());
    }

    #[test]
    fn test_path_params_subset_of_required() {
        let registry = build_registry();
        for action in SemanticAction::CRUD {
            for resource in registry.resources_for(action) {
                let mapping = registry.lookup(action, &resource).unwrap();
                for param in path_template_params(&mapping.path_pattern) {
                    assert!(
                        mapping.required_params.contains(&param),
                        "{action} {resource}: path param {param} not required"
                    );
                }
            }
        }
    }

    #[test]
    fn test_body_schema_required_unioned() {
        let registry = build_registry();
        let create = registry.lookup(SemanticAction::Create, "topics").unwrap();
        assert!(create.required_params.contains(&"topic_name".to_string()));
        assert!(create.required_params.contains(&"cluster_id".to_string()));
        assert!(create.optional_params.contains(&"validate_only".to_string()));
        let body = create.body.unwrap();
        assert_eq!(body.content_type, "application/vnd.confluent+json");
        assert!(body.schema.property_is_array("configs"));
    }

    #[test]
    fn test_media_preference_json_first() {
        let registry = build_registry();
        let create = registry.lookup(SemanticAction::Create, "environments").unwrap();
        let body = create.body.unwrap();
        assert_eq!(body.content_type, "application/json");
        assert_eq!(body.schema.required, vec!["display_name".to_string()]);
    }

    #[test]
    fn test_tool_generation_is_deterministic() {
        let spec = sample_spec();
        let first = {
            let registry = SemanticRegistry::new();
            registry.load_spec(&spec);
            registry.tool_descriptors()
        };
        let second = {
            let registry = SemanticRegistry::new();
            registry.load_spec(&spec);
            registry.tool_descriptors()
        };
        let names = |tools: &[ToolDescriptor]| -> Vec<String> {
            tools.iter().map(|t| t.name.clone()).collect()
        };
        assert_eq!(names(&first), names(&second));
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.input_schema, b.input_schema);
            assert_eq!(a.description, b.description);
        }
    }

    #[test]
    fn test_telemetry_mappings_require_dataset() {
        let doc = json!({
            "openapi": "3.0.0",
            "info": {"title": "Telemetry", "version": "1"},
            "paths": {
                "/v2/metrics/{dataset}/descriptors/metrics": {"get": {}},
                "/v2/metrics/{dataset}/query": {"post": {}},
                "/v2/metrics/{dataset}/export": {"delete": {}}
            }
        });
        let spec = SpecLoader::parse_value(doc).unwrap();
        let registry = SemanticRegistry::new();
        registry.load_telemetry_spec(&spec);

        let resources = registry.resources_for(SemanticAction::GetTelemetry);
        assert!(resources.contains(&"metrics".to_string()));
        for resource in &resources {
            let mapping = registry
                .lookup(SemanticAction::GetTelemetry, resource)
                .unwrap();
            assert!(mapping.required_params.contains(&"dataset".to_string()));
            assert!(matches!(mapping.method, HttpMethod::Get | HttpMethod::Post));
        }
        // DELETE arm is never mapped for telemetry
        assert!(registry
            .lookup(SemanticAction::GetTelemetry, "export")
            .is_none());
    }

    #[test]
    fn test_unknown_method_arm_yields_no_entry() {
        let doc = json!({
            "openapi": "3.0.0",
            "info": {"title": "CCloud", "version": "1"},
            "paths": {
                "/iam/v2/certificates": {"head": {}, "options": {}}
            }
        });
        let spec = SpecLoader::parse_value(doc).unwrap();
        let registry = SemanticRegistry::new();
        registry.load_spec(&spec);
        for action in SemanticAction::CRUD {
            assert!(registry.resources_for(action).is_empty());
        }
    }

    #[test]
    fn test_registry_reads_do_not_mutate() {
        let registry = build_registry();
        let before = registry.resources_for(SemanticAction::List);
        let _ = registry.lookup(SemanticAction::List, "topics");
        let _ = registry.tool_descriptors();
        assert_eq!(before, registry.resources_for(SemanticAction::List));
    }
}
