//! ccloud-mcp - Semantic OpenAPI MCP Server
//!
//! Derives a compact semantic tool surface (create, list, get, update,
//! delete, get_telemetry) from Confluent Cloud OpenAPI specs and brokers
//! tool invocations as authenticated HTTP calls.
//!
//! Implements MCP directly via JSON-RPC 2.0 over stdio, plus a streamable
//! HTTP ingress on /mcp.

mod guardrails;
mod http;
mod services;
mod tools;
mod types;
mod utils;

use anyhow::Context;
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::guardrails::Guardrails;
use crate::services::{InvocationPipeline, SemanticRegistry, SpecLoader};
use crate::tools::{invoke_tool, InvokeInput, InvokeOutput, PromptService};
use crate::types::{AppConfig, SemanticAction, Spec};

// ===== JSON-RPC Types =====

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub(crate) struct JsonRpcRequest {
    jsonrpc: String, // Required by JSON-RPC spec, validated by serde
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonRpcResponse {
    jsonrpc: String,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonRpcError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl JsonRpcResponse {
    pub(crate) fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub(crate) fn error(id: Value, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: None,
            }),
        }
    }
}

// ===== MCP Protocol Handler =====

pub(crate) struct McpServer {
    pipeline: Arc<InvocationPipeline>,
    registry: Arc<SemanticRegistry>,
    prompts: Arc<PromptService>,
    discovery_enabled: bool,
    directives: String,
}

impl McpServer {
    fn new(
        pipeline: Arc<InvocationPipeline>,
        registry: Arc<SemanticRegistry>,
        prompts: Arc<PromptService>,
        discovery_enabled: bool,
        directives: String,
    ) -> Self {
        Self {
            pipeline,
            registry,
            prompts,
            discovery_enabled,
            directives,
        }
    }

    pub(crate) async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = request.id.clone().unwrap_or(Value::Null);

        // Notifications (no id) don't get responses
        if request.id.is_none() {
            debug!("Received notification: {}", request.method);
            return None;
        }

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(&request.params),
            "initialized" => return None, // Notification
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(&request.params).await,
            "prompts/list" => self.handle_prompts_list(),
            "prompts/get" => self.handle_prompts_get(&request.params),
            "resources/list" => self.handle_resources_list(),
            "ping" => Ok(json!({})),
            _ => Err((-32601, format!("Method not found: {}", request.method))),
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err((code, message)) => JsonRpcResponse::error(id, code, message),
        })
    }

    fn handle_initialize(&self, _params: &Value) -> Result<Value, (i32, String)> {
        let mut instructions = "Semantic tools over Confluent Cloud APIs. Pick an action tool (create, list, get, update, delete, get_telemetry), choose a resource from its enum, and supply resource-specific parameters. Missing required parameters are reported back so they can be supplied incrementally.".to_string();
        if !self.directives.is_empty() {
            instructions.push_str("\n\n");
            instructions.push_str(&self.directives);
        }
        Ok(json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {
                "tools": {},
                "prompts": {},
                "resources": {}
            },
            "serverInfo": {
                "name": "ccloud-mcp",
                "version": env!("CARGO_PKG_VERSION")
            },
            "instructions": instructions
        }))
    }

    fn handle_tools_list(&self) -> Result<Value, (i32, String)> {
        let mut tools: Vec<Value> = self
            .registry
            .tool_descriptors()
            .iter()
            .map(|t| t.to_mcp_value())
            .collect();
        tools.extend(prompt_tool_descriptors());
        Ok(json!({ "tools": tools }))
    }

    async fn handle_tools_call(&self, params: &Value) -> Result<Value, (i32, String)> {
        let name = params
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or((-32602, "Missing tool name".to_string()))?
            .to_string();

        let args = params.get("arguments").cloned().unwrap_or(json!({}));

        let output = match name.as_str() {
            "prompts" => {
                let prompts = self.prompts.list();
                InvokeOutput::Result(json!({ "prompts": prompts }))
            }
            "get_prompt" => {
                let prompt_name = args.get("name").and_then(|v| v.as_str()).unwrap_or("");
                match self.prompts.get(prompt_name, &args) {
                    Ok(content) => InvokeOutput::Result(json!({ "prompt": content })),
                    Err(message) => InvokeOutput::Error(message),
                }
            }
            _ => {
                // Spawned so a panicking invocation becomes a structured
                // error for this call instead of taking the server down
                let pipeline = Arc::clone(&self.pipeline);
                let input = InvokeInput {
                    tool: name.clone(),
                    arguments: args,
                };
                match tokio::spawn(async move { invoke_tool(&pipeline, input).await }).await {
                    Ok(output) => output,
                    Err(join_error) => {
                        error!(tool = %name, %join_error, "tool invocation panicked");
                        InvokeOutput::Error(format!("Internal error invoking tool '{name}'"))
                    }
                }
            }
        };

        match output {
            InvokeOutput::Result(result) => {
                let text =
                    serde_json::to_string_pretty(&result).unwrap_or_else(|_| result.to_string());
                Ok(json!({
                    "content": [{
                        "type": "text",
                        "text": text
                    }]
                }))
            }
            InvokeOutput::Error(message) => Ok(json!({
                "content": [{
                    "type": "text",
                    "text": message
                }],
                "isError": true
            })),
        }
    }

    fn handle_prompts_list(&self) -> Result<Value, (i32, String)> {
        let prompts: Vec<Value> = self
            .prompts
            .list()
            .into_iter()
            .map(|p| json!({"name": p.name, "description": p.summary}))
            .collect();
        Ok(json!({ "prompts": prompts }))
    }

    fn handle_prompts_get(&self, params: &Value) -> Result<Value, (i32, String)> {
        let name = params
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or((-32602, "Missing prompt name".to_string()))?;
        let args = params.get("arguments").cloned().unwrap_or(json!({}));

        match self.prompts.get(name, &args) {
            Ok(content) => Ok(json!({
                "description": name,
                "messages": [{
                    "role": "user",
                    "content": {"type": "text", "text": content}
                }]
            })),
            Err(message) => Err((-32602, message)),
        }
    }

    fn handle_resources_list(&self) -> Result<Value, (i32, String)> {
        if !self.discovery_enabled {
            return Ok(json!({ "resources": [] }));
        }
        let resources: Vec<Value> = self
            .registry
            .resources_for(SemanticAction::List)
            .into_iter()
            .map(|name| {
                json!({
                    "uri": format!("ccloud://{name}"),
                    "name": name,
                    "description": format!("Confluent Cloud {name}, listable via the 'list' tool"),
                    "mimeType": "application/json"
                })
            })
            .collect();
        Ok(json!({ "resources": resources }))
    }
}

/// Descriptors for the two prompt-management tools
fn prompt_tool_descriptors() -> Vec<Value> {
    vec![
        json!({
            "name": "prompts",
            "description": "List available prompt templates",
            "inputSchema": {
                "type": "object",
                "properties": {}
            }
        }),
        json!({
            "name": "get_prompt",
            "description": "Fetch a prompt template by name, substituting {{variable}} placeholders from the arguments",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Prompt name"}
                },
                "required": ["name"],
                "additionalProperties": true
            }
        }),
    ]
}

// ===== Main =====

#[derive(Parser)]
#[command(
    name = "ccloud-mcp",
    version,
    about = "MCP server exposing semantic CRUD tools over Confluent Cloud OpenAPI specs"
)]
struct Cli {
    /// Bind address for the streamable HTTP ingress (overrides MCP_HTTP_ADDR)
    #[arg(long)]
    http_addr: Option<String>,

    /// Serve stdio only, without the HTTP ingress
    #[arg(long)]
    stdio_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging goes to stderr; stdout is the MCP transport
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
            EnvFilter::try_new(level)
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = AppConfig::from_env().context("invalid configuration")?;
    if let Some(addr) = cli.http_addr {
        config.http_addr = addr;
    }

    info!("Starting ccloud-mcp v{}", env!("CARGO_PKG_VERSION"));

    let main_spec = Arc::new(
        SpecLoader::load(&config.specs.main)
            .await
            .with_context(|| format!("failed to load OpenAPI spec from {}", config.specs.main))?,
    );
    info!(
        title = %main_spec.title,
        paths = main_spec.paths.len(),
        "loaded main spec"
    );

    // A telemetry spec that cannot be fetched disables get_telemetry only
    let telemetry_spec = match SpecLoader::load(&config.specs.telemetry).await {
        Ok(spec) => {
            info!(title = %spec.title, paths = spec.paths.len(), "loaded telemetry spec");
            Arc::new(spec)
        }
        Err(e) => {
            warn!(error = %e, "telemetry spec unavailable, get_telemetry disabled");
            Arc::new(Spec::default())
        }
    };

    let registry = Arc::new(SemanticRegistry::new());
    registry.load_spec(&main_spec);
    registry.load_telemetry_spec(&telemetry_spec);
    let tool_count = registry.tool_descriptors().len();
    info!(tools = tool_count, "semantic registry initialized");

    info!(bootstrap_servers = %config.kafka.bootstrap_servers, "kafka scope");

    let guardrails = Arc::new(Guardrails::new(
        config.llm_detection.clone(),
        config.loop_detection.clone(),
    ));
    let prompts = Arc::new(PromptService::new(config.prompts_folder.clone()));
    let directives = load_directives(config.directives_folder.as_deref());
    let discovery_enabled = !config.disable_resource_discovery;
    let http_addr = config.http_addr.clone();

    let pipeline = Arc::new(InvocationPipeline::new(
        config,
        Arc::clone(&registry),
        Arc::clone(&main_spec),
        Arc::clone(&telemetry_spec),
        guardrails,
    ));

    let server = Arc::new(McpServer::new(
        pipeline,
        registry,
        prompts,
        discovery_enabled,
        directives,
    ));

    if !cli.stdio_only {
        let http_server = Arc::clone(&server);
        tokio::spawn(async move {
            if let Err(e) = http::serve(http_addr, http_server).await {
                error!(error = %e, "http ingress failed");
            }
        });
    }

    run_stdio(server).await
}

/// Concatenate directive files, appended to the initialize instructions
fn load_directives(folder: Option<&str>) -> String {
    let Some(folder) = folder else {
        return String::new();
    };
    let Ok(entries) = std::fs::read_dir(folder) else {
        warn!(folder, "directives folder not readable");
        return String::new();
    };
    let mut paths: Vec<_> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("md") | Some("txt")
            )
        })
        .collect();
    paths.sort();
    paths
        .iter()
        .filter_map(|p| std::fs::read_to_string(p).ok())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Line-delimited JSON-RPC loop over stdin/stdout
async fn run_stdio(server: Arc<McpServer>) -> anyhow::Result<()> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to read line: {}", e);
                continue;
            }
        };

        if line.is_empty() {
            continue;
        }

        debug!("Received: {}", line);

        let request: JsonRpcRequest = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                let response =
                    JsonRpcResponse::error(Value::Null, -32700, format!("Parse error: {e}"));
                let output = serde_json::to_string(&response)?;
                writeln!(stdout, "{output}")?;
                stdout.flush()?;
                continue;
            }
        };

        if let Some(response) = server.handle_request(request).await {
            let output = serde_json::to_string(&response)?;
            debug!("Sending: {}", output);
            writeln!(stdout, "{output}")?;
            stdout.flush()?;
        }
    }

    Ok(())
}
