//! Error types for the ccloud MCP server

use thiserror::Error;

#[derive(Error, Debug)]
#[allow(dead_code)]
pub enum ServerError {
    // Network errors (E1xx)
    #[error("E101: Connection failed - {0}")]
    ConnectionFailed(String),

    #[error("E102: Request timeout after {0}s")]
    Timeout(u64),

    #[error("API request failed with status {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("E104: Spec fetch failed with status {0}")]
    SpecFetchStatus(u16),

    // Spec parse errors (E2xx)
    #[error("E201: Invalid JSON - {0}")]
    InvalidJson(String),

    #[error("E202: Invalid YAML - {0}")]
    InvalidYaml(String),

    #[error("E203: Invalid OpenAPI spec - {0}")]
    InvalidSpec(String),

    #[error("E204: Multi-hop $ref chain refused: {0}")]
    MultiHopRef(String),

    // File system errors (E3xx)
    #[error("E301: File not found: {0}")]
    FileNotFound(String),

    #[error("E302: Failed to read file: {0}")]
    ReadError(String),

    // Configuration errors (E4xx)
    #[error("E401: Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("E402: {var} must begin with '{prefix}', got '{value}'")]
    InvalidIdPrefix {
        var: String,
        prefix: String,
        value: String,
    },

    #[error("E403: {var} must be a valid URL, got '{value}'")]
    InvalidUrl { var: String, value: String },

    #[error("E404: Missing credentials for security type '{0}'")]
    MissingCredentials(String),

    // Registry / invocation errors (E5xx)
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("E502: Unknown resource '{resource}' for action '{action}'")]
    UnknownResource { action: String, resource: String },

    #[error("E503: Unknown telemetry resource '{0}'")]
    UnknownTelemetryResource(String),

    #[error("E504: Missing 'resource' argument for tool '{0}'")]
    MissingResource(String),

    // Guardrail blocks (E6xx)
    #[error("{0}")]
    Blocked(String),
}

#[allow(dead_code)]
impl ServerError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConnectionFailed(_) => "E101",
            Self::Timeout(_) => "E102",
            Self::UpstreamStatus { .. } => "E103",
            Self::SpecFetchStatus(_) => "E104",
            Self::InvalidJson(_) => "E201",
            Self::InvalidYaml(_) => "E202",
            Self::InvalidSpec(_) => "E203",
            Self::MultiHopRef(_) => "E204",
            Self::FileNotFound(_) => "E301",
            Self::ReadError(_) => "E302",
            Self::MissingEnv(_) => "E401",
            Self::InvalidIdPrefix { .. } => "E402",
            Self::InvalidUrl { .. } => "E403",
            Self::MissingCredentials(_) => "E404",
            Self::ToolNotFound(_) => "E501",
            Self::UnknownResource { .. } => "E502",
            Self::UnknownTelemetryResource(_) => "E503",
            Self::MissingResource(_) => "E504",
            Self::Blocked(_) => "E601",
        }
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
