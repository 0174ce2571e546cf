//! The invocation pipeline: from (tool, arguments) to an upstream HTTP call
//!
//! The pipeline is split into a pure preparation phase and an execution
//! phase so request construction stays testable without a network.

use crate::guardrails::{Guardrails, GuardrailVerdict};
use crate::services::loader::security_type_for;
use crate::services::registry::SemanticRegistry;
use crate::services::routing::{base_url_for, credentials_for, Credentials};
use crate::types::*;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Resources whose updates always get the sensitive-operation wrap
const CRITICAL_RESOURCES: [&str; 6] = [
    "clusters",
    "environments",
    "service-accounts",
    "api-keys",
    "role-bindings",
    "acls",
];

/// Caller-key to schema-property aliases, matched case-sensitively against
/// the schema's actual property names
const ARG_PROPERTY_ALIASES: [(&str, &[&str]); 3] = [
    ("name", &["topic_name", "display_name", "name"]),
    ("partitions", &["partitions_count", "partition_count"]),
    ("replication", &["replication_factor"]),
];

/// Upstream call fully prepared but not yet executed
#[derive(Debug)]
pub struct PreparedRequest {
    pub action: SemanticAction,
    pub resource: String,
    pub method: HttpMethod,
    pub url: String,
    pub security_type: String,
    pub credentials: Credentials,
    pub body: Option<Value>,
    pub content_type: Option<String>,
    pub query: Vec<(String, String)>,
    pub translations: Vec<String>,
    /// Original argument values, used by the sensitive-create classifier
    pub argument_values: Vec<String>,
}

/// Outcome of the preparation phase
#[derive(Debug)]
pub enum Prepared {
    /// Short-circuit result returned to the client as a success
    Immediate(Value),
    /// A request ready for execution
    Call(Box<PreparedRequest>),
}

pub struct InvocationPipeline {
    config: AppConfig,
    registry: Arc<SemanticRegistry>,
    main_spec: Arc<Spec>,
    telemetry_spec: Arc<Spec>,
    guardrails: Arc<Guardrails>,
    client: reqwest::Client,
}

impl InvocationPipeline {
    pub fn new(
        config: AppConfig,
        registry: Arc<SemanticRegistry>,
        main_spec: Arc<Spec>,
        telemetry_spec: Arc<Spec>,
        guardrails: Arc<Guardrails>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            config,
            registry,
            main_spec,
            telemetry_spec,
            guardrails,
            client,
        }
    }

    /// Run the full pipeline for one tool call
    pub async fn invoke(&self, tool_name: &str, arguments: Value) -> ServerResult<Value> {
        // Unknown tools fail before they reach guardrail state
        if SemanticAction::from_tool_name(tool_name).is_none() {
            return Err(ServerError::ToolNotFound(tool_name.to_string()));
        }

        let verdict = self
            .guardrails
            .validate_tool_input(tool_name, &arguments)
            .await;
        if let GuardrailVerdict::Blocked(reason) = verdict {
            info!(tool = tool_name, %reason, "call blocked by guardrails");
            return Err(ServerError::Blocked(reason));
        }

        match self.prepare(tool_name, arguments)? {
            Prepared::Immediate(result) => Ok(result),
            Prepared::Call(request) => self.execute(*request).await,
        }
    }

    /// Steps 1 and 3-12: everything up to the wire
    pub fn prepare(&self, tool_name: &str, arguments: Value) -> ServerResult<Prepared> {
        let action = SemanticAction::from_tool_name(tool_name)
            .ok_or_else(|| ServerError::ToolNotFound(tool_name.to_string()))?;

        let mut args = match arguments {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(ServerError::InvalidJson(format!(
                    "arguments must be an object, got {other}"
                )))
            }
        };

        let resource = args
            .get("resource")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| ServerError::MissingResource(tool_name.to_string()))?;

        let mapping = self.registry.lookup(action, &resource).ok_or_else(|| {
            if action == SemanticAction::GetTelemetry {
                ServerError::UnknownTelemetryResource(resource.clone())
            } else {
                ServerError::UnknownResource {
                    action: action.to_string(),
                    resource: resource.clone(),
                }
            }
        })?;
        debug!(endpoint = %mapping.endpoint_string(), resource = %resource, "resolved endpoint mapping");

        // Defaults for explicitly empty arguments and missing requireds
        let pattern = mapping.path_pattern.clone();
        for (key, value) in args.iter_mut() {
            if is_empty_value(value) {
                if let Some(default) = self.config.default_for_param(key, &pattern) {
                    *value = Value::String(default);
                }
            }
        }
        for required in &mapping.required_params {
            if !args.contains_key(required) {
                if let Some(default) = self.config.default_for_param(required, &pattern) {
                    args.insert(required.clone(), Value::String(default));
                }
            }
        }

        // Nested `parameters` entries override top-level ones for validation
        let mut working = args.clone();
        if let Some(nested) = args.get("parameters").and_then(|v| v.as_object()) {
            for (key, value) in nested {
                working.insert(key.clone(), value.clone());
            }
        }

        let mut missing: Vec<String> = Vec::new();
        let mut translations: Vec<String> = Vec::new();
        for required in &mapping.required_params {
            if working.get(required).map_or(false, |v| !is_empty_value(v)) {
                continue;
            }
            if let Some(default) = self.config.default_for_param(required, &pattern) {
                working.insert(required.clone(), Value::String(default));
                continue;
            }
            if required.contains("name") {
                if let Some(name) = working.get("name").filter(|v| !is_empty_value(v)).cloned() {
                    translations.push(format!("'{required}' was taken from 'name'"));
                    working.insert(required.clone(), name);
                    continue;
                }
            }
            missing.push(required.clone());
        }

        if !missing.is_empty() {
            debug!(tool = tool_name, resource = %resource, ?missing, "missing required parameters");
            return Ok(Prepared::Immediate(json!({
                "status": "missing_required_params",
                "requiredParams": missing,
                "message": format!(
                    "Missing required parameters for {} {}: {}",
                    action, resource, missing.join(", ")
                ),
            })));
        }

        // Request body only for create/update with a known schema
        let body = if matches!(action, SemanticAction::Create | SemanticAction::Update) {
            mapping
                .body
                .as_ref()
                .map(|schema| build_request_body(schema, &args, &working))
        } else {
            None
        };

        // Path materialization: arguments first, then configuration defaults
        let mut consumed: Vec<String> = Vec::new();
        let mut path = pattern.clone();
        for key in path_template_params(&pattern) {
            let placeholder = format!("{{{key}}}");
            if let Some(value) = working.get(&key).filter(|v| !is_empty_value(v)) {
                path = path.replace(&placeholder, &scalar_string(value));
                consumed.push(key);
            } else if let Some(default) = self.config.default_for_param(&key, &pattern) {
                path = path.replace(&placeholder, &default);
                consumed.push(key);
            }
            // Unresolved placeholders stay; the upstream 4xx surfaces it
        }

        let spec = if action == SemanticAction::GetTelemetry {
            &self.telemetry_spec
        } else {
            &self.main_spec
        };
        let security_type = security_type_for(spec, mapping.method, &mapping.path_pattern);
        let base_url = base_url_for(&self.config, &path);
        let credentials = credentials_for(&self.config, &security_type, &path)?;

        // Residual arguments ride as query parameters on GET
        let query = if mapping.method == HttpMethod::Get {
            working
                .iter()
                .filter(|(key, _)| {
                    key.as_str() != "resource"
                        && key.as_str() != "parameters"
                        && !consumed.contains(key)
                })
                .filter_map(|(key, value)| match value {
                    Value::String(s) if !s.is_empty() => Some((key.clone(), s.clone())),
                    Value::Number(n) => Some((key.clone(), n.to_string())),
                    Value::Bool(b) => Some((key.clone(), b.to_string())),
                    _ => None,
                })
                .collect()
        } else {
            Vec::new()
        };

        let argument_values = working
            .values()
            .filter_map(|v| v.as_str().map(String::from))
            .collect();

        Ok(Prepared::Call(Box::new(PreparedRequest {
            action,
            resource,
            method: mapping.method,
            url: format!("{base_url}{path}"),
            security_type,
            credentials,
            body,
            content_type: mapping.body.as_ref().map(|b| b.content_type.clone()),
            query,
            translations,
            argument_values,
        })))
    }

    /// Steps 13-15: execute and shape the response
    async fn execute(&self, request: PreparedRequest) -> ServerResult<Value> {
        info!(
            method = %request.method,
            url = %request.url,
            resource = %request.resource,
            security_type = %request.security_type,
            "upstream call"
        );

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
            HttpMethod::Put => self.client.put(&request.url),
            HttpMethod::Patch => self.client.patch(&request.url),
            HttpMethod::Delete => self.client.delete(&request.url),
        };

        // Bodies carry the endpoint's declared media type
        let content_type = request
            .content_type
            .as_deref()
            .unwrap_or("application/json");
        builder = builder
            .header("Content-Type", content_type)
            .header("Accept", "application/json")
            .basic_auth(&request.credentials.key, Some(&request.credentials.secret));

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ServerError::ConnectionFailed(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ServerError::ConnectionFailed(e.to_string()))?;

        if status >= 400 {
            return Err(ServerError::UpstreamStatus { status, body: text });
        }

        let mut result = match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(mut map)) => {
                map.insert("status_code".to_string(), json!(status));
                Value::Object(map)
            }
            Ok(other) => json!({"data": other, "status_code": status}),
            Err(_) => json!({"raw_response": text, "status_code": status}),
        };

        if !request.translations.is_empty() {
            if let Some(map) = result.as_object_mut() {
                map.insert("parameter_info".to_string(), json!(request.translations));
            }
        }

        Ok(wrap_if_sensitive(
            request.action,
            &request.resource,
            &request.argument_values,
            result,
        ))
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Intersect the schema's properties with caller-supplied data.
///
/// The nested `parameters` object is the preferred data source; with
/// top-level arguments the caller-key aliases apply. The `configs`
/// property, when declared as an array, is canonicalized.
fn build_request_body(
    body: &BodySchema,
    top_level: &Map<String, Value>,
    working: &Map<String, Value>,
) -> Value {
    let (source, use_aliases) = match top_level.get("parameters").and_then(|v| v.as_object()) {
        Some(nested) => (nested, false),
        None => (top_level, true),
    };

    let mut out = Map::new();
    for property in body.schema.properties.keys() {
        if property == "resource" {
            continue;
        }

        let mut value = source.get(property).cloned();
        if value.is_none() && use_aliases {
            for (caller_key, acceptable) in ARG_PROPERTY_ALIASES {
                if acceptable.contains(&property.as_str()) {
                    if let Some(aliased) = source.get(caller_key) {
                        value = Some(aliased.clone());
                        break;
                    }
                }
            }
        }
        // Values promoted during validation (defaults, name translation)
        if value.is_none() {
            value = working.get(property).cloned();
        }

        let Some(mut value) = value else { continue };
        if is_empty_value(&value) {
            continue;
        }
        if property == "configs" && body.schema.property_is_array("configs") {
            value = transform_configs(value);
        }
        out.insert(property.clone(), value);
    }

    Value::Object(out)
}

/// Canonicalize `configs` into an array of `{name, value}` entries from any
/// of: an already-canonical array, a name→value map, or a JSON string of
/// either. Idempotent on canonical input; anything unrecognized passes
/// through unchanged.
pub fn transform_configs(value: Value) -> Value {
    match value {
        Value::Array(_) => value,
        Value::Object(map) => Value::Array(
            map.into_iter()
                .map(|(name, value)| json!({"name": name, "value": value}))
                .collect(),
        ),
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(parsed @ (Value::Array(_) | Value::Object(_))) => transform_configs(parsed),
            _ => Value::String(s),
        },
        other => other,
    }
}

/// Patterns marking a create call as admin-flavored
fn admin_value_pattern() -> Regex {
    Regex::new(r"(?i)\b(admin\w*|superuser|root|all[-_ ]access|organizationadmin|environmentadmin|cloudclusteradmin)\b")
        .expect("admin pattern must compile")
}

fn is_sensitive(action: SemanticAction, resource: &str, argument_values: &[String]) -> bool {
    match action {
        SemanticAction::Delete => true,
        SemanticAction::Update => CRITICAL_RESOURCES.contains(&resource),
        SemanticAction::Create => {
            let pattern = admin_value_pattern();
            argument_values.iter().any(|v| pattern.is_match(v))
        }
        _ => false,
    }
}

/// Wrap sensitive results so clients surface a warning to the operator
fn wrap_if_sensitive(
    action: SemanticAction,
    resource: &str,
    argument_values: &[String],
    result: Value,
) -> Value {
    if !is_sensitive(action, resource, argument_values) {
        return result;
    }
    let warning = match action {
        SemanticAction::Delete => format!(
            "DESTRUCTIVE operation executed on '{resource}'. The resource has been deleted and cannot be recovered through this API."
        ),
        SemanticAction::Update => format!(
            "Sensitive update executed on critical resource '{resource}'. Review the change before continuing."
        ),
        _ => format!(
            "Privileged creation on '{resource}'. Review the granted access before continuing."
        ),
    };
    json!({
        "data": result,
        "warning": warning,
        "operation_type": "sensitive",
    })
}
