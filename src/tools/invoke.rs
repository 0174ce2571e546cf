//! Semantic tool invocation: MCP-facing input and output shapes

use crate::services::InvocationPipeline;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct InvokeInput {
    /// Tool name: one of the semantic actions or `get_telemetry`
    pub tool: String,
    /// Free-form argument map; `resource` selects the endpoint
    #[serde(default)]
    pub arguments: Value,
}

/// Exactly one of result/error is set on the MCP response
#[derive(Debug)]
pub enum InvokeOutput {
    Result(Value),
    Error(String),
}

/// Run one tool call through the invocation pipeline
pub async fn invoke_tool(pipeline: &InvocationPipeline, input: InvokeInput) -> InvokeOutput {
    match pipeline.invoke(&input.tool, input.arguments).await {
        Ok(result) => InvokeOutput::Result(result),
        Err(e) => InvokeOutput::Error(e.to_string()),
    }
}
