//! OpenAPI spec loader and shallow reference resolver

use crate::types::*;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Spec loader service
pub struct SpecLoader;

impl SpecLoader {
    /// Load a spec from a file path or HTTP(S) URL
    pub async fn load(source: &str) -> ServerResult<Spec> {
        let content = Self::fetch_content(source).await?;
        let value = Self::decode(&content, source)?;
        Self::parse_value(value)
    }

    async fn fetch_content(source: &str) -> ServerResult<String> {
        if source.starts_with("http://") || source.starts_with("https://") {
            Self::fetch_remote(source).await
        } else {
            Self::read_local(source)
        }
    }

    async fn fetch_remote(url: &str) -> ServerResult<String> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ServerError::ConnectionFailed(e.to_string()))?;

        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| ServerError::ConnectionFailed(e.to_string()))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(ServerError::SpecFetchStatus(response.status().as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| ServerError::ConnectionFailed(e.to_string()))
    }

    fn read_local(path: &str) -> ServerResult<String> {
        let path = Path::new(path);
        std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ServerError::FileNotFound(path.display().to_string()),
            _ => ServerError::ReadError(e.to_string()),
        })
    }

    /// Decode as JSON or YAML by extension, with content sniffing as the
    /// fallback for extensionless sources.
    fn decode(content: &str, source: &str) -> ServerResult<Value> {
        let lower = source.to_lowercase();
        if lower.ends_with(".json") {
            return serde_json::from_str(content)
                .map_err(|e| ServerError::InvalidJson(e.to_string()));
        }
        if lower.ends_with(".yaml") || lower.ends_with(".yml") {
            return serde_yaml::from_str(content)
                .map_err(|e| ServerError::InvalidYaml(e.to_string()));
        }
        if content.trim_start().starts_with('{') {
            serde_json::from_str(content).map_err(|e| ServerError::InvalidJson(e.to_string()))
        } else {
            serde_yaml::from_str(content).map_err(|e| ServerError::InvalidYaml(e.to_string()))
        }
    }

    /// Build the typed spec tree from the decoded document
    pub(crate) fn parse_value(value: Value) -> ServerResult<Spec> {
        if value.get("swagger").is_some() {
            return Err(ServerError::InvalidSpec(
                "Swagger 2.0 documents are not supported".to_string(),
            ));
        }

        let openapi = value
            .get("openapi")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ServerError::InvalidSpec("Missing 'openapi' field".to_string()))?
            .to_string();

        if !openapi.starts_with("3.0") {
            return Err(ServerError::InvalidSpec(format!(
                "Unsupported OpenAPI version: {openapi}"
            )));
        }

        let info = value.get("info");
        let title = info
            .and_then(|i| i.get("title"))
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown API")
            .to_string();
        let version = info
            .and_then(|i| i.get("version"))
            .and_then(|v| v.as_str())
            .unwrap_or("0.0.0")
            .to_string();

        let mut paths: HashMap<String, PathItem> = HashMap::new();
        if let Some(path_obj) = value.get("paths").and_then(|v| v.as_object()) {
            for (template, item) in path_obj {
                let Some(item_obj) = item.as_object() else {
                    continue;
                };
                let mut operations = HashMap::new();
                for (method_str, op_value) in item_obj {
                    if let Some(method) = HttpMethod::parse(method_str) {
                        operations.insert(method, Self::parse_operation(op_value));
                    }
                }
                paths.insert(template.clone(), PathItem { operations });
            }
        }

        let components = value
            .get("components")
            .map(|c| Components {
                schemas: c
                    .get("schemas")
                    .and_then(|v| v.as_object())
                    .cloned()
                    .unwrap_or_default(),
                request_bodies: c
                    .get("requestBodies")
                    .and_then(|v| v.as_object())
                    .cloned()
                    .unwrap_or_default(),
                security_schemes: c
                    .get("securitySchemes")
                    .and_then(|v| v.as_object())
                    .cloned()
                    .unwrap_or_default(),
            })
            .unwrap_or_default();

        let security = value
            .get("security")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        Ok(Spec {
            openapi,
            title,
            version,
            paths,
            components,
            security,
        })
    }

    fn parse_operation(op: &Value) -> Operation {
        let summary = op.get("summary").and_then(|v| v.as_str()).map(String::from);
        let description = op
            .get("description")
            .and_then(|v| v.as_str())
            .map(String::from);

        let mut parameters = Vec::new();
        if let Some(params) = op.get("parameters").and_then(|v| v.as_array()) {
            for param in params {
                let Some(location) = param
                    .get("in")
                    .and_then(|v| v.as_str())
                    .and_then(ParameterLocation::parse)
                else {
                    continue;
                };
                parameters.push(ParameterSpec {
                    name: param
                        .get("name")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string(),
                    location,
                    // Path parameters are required even when undeclared
                    required: param
                        .get("required")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(location == ParameterLocation::Path),
                    description: param
                        .get("description")
                        .and_then(|v| v.as_str())
                        .map(String::from),
                });
            }
        }

        let request_body = op.get("requestBody").cloned();
        let security = op
            .get("security")
            .and_then(|v| v.as_array())
            .map(|arr| arr.to_vec());

        Operation {
            summary,
            description,
            parameters,
            request_body,
            security,
        }
    }
}

/// Resolve a `requestBody` value one hop through
/// `#/components/requestBodies/<name>`. An unresolvable name returns the
/// original stub; a target that is itself a `$ref` is refused.
pub fn resolve_request_body(spec: &Spec, body: &Value) -> ServerResult<Value> {
    let Some(reference) = body.get("$ref").and_then(|v| v.as_str()) else {
        return Ok(body.clone());
    };
    let Some(name) = reference.strip_prefix("#/components/requestBodies/") else {
        return Ok(body.clone());
    };
    match spec.components.request_bodies.get(name) {
        Some(resolved) => {
            if resolved.get("$ref").is_some() {
                return Err(ServerError::MultiHopRef(reference.to_string()));
            }
            Ok(resolved.clone())
        }
        None => Ok(body.clone()),
    }
}

/// Resolve a schema value one hop through `#/components/schemas/<name>`,
/// then coerce to the generic map shape.
pub fn resolve_schema(spec: &Spec, schema: &Value) -> ServerResult<SchemaShape> {
    let Some(reference) = schema.get("$ref").and_then(|v| v.as_str()) else {
        return Ok(SchemaShape::from_value(schema));
    };
    let Some(name) = reference.strip_prefix("#/components/schemas/") else {
        return Ok(SchemaShape::from_value(schema));
    };
    match spec.components.schemas.get(name) {
        Some(resolved) => {
            if resolved.get("$ref").is_some() {
                return Err(ServerError::MultiHopRef(reference.to_string()));
            }
            Ok(SchemaShape::from_value(resolved))
        }
        None => Ok(SchemaShape::from_value(schema)),
    }
}

/// Security type for an endpoint: operation-level requirement first, then
/// the first global requirement, defaulting to `cloud-api-key`.
pub fn security_type_for(spec: &Spec, method: HttpMethod, path: &str) -> String {
    const DEFAULT: &str = "cloud-api-key";

    let first_key = |requirements: &[Value]| -> Option<String> {
        requirements
            .first()
            .and_then(|req| req.as_object())
            .and_then(|obj| obj.keys().next().cloned())
    };

    if let Some(item) = spec.find_path_item(path) {
        if let Some(op) = item.operations.get(&method) {
            if let Some(security) = &op.security {
                if let Some(key) = first_key(security) {
                    return key;
                }
            }
        }
    }

    first_key(&spec.security).unwrap_or_else(|| DEFAULT.to_string())
}
