//! Server configuration loaded from environment variables
//!
//! Follows a simple hierarchy: safe defaults, environment overrides,
//! startup validation. Validation failures are fatal.

use crate::types::error::{ServerError, ServerResult};

/// Cloud control-plane base URL
pub const DEFAULT_CLOUD_BASE_URL: &str = "https://api.confluent.cloud";
/// Telemetry API base URL
pub const DEFAULT_TELEMETRY_BASE_URL: &str = "https://api.telemetry.confluent.cloud";
/// Main OpenAPI document source
pub const DEFAULT_SPEC_SOURCE: &str = "https://api.confluent.cloud/docs/api.json";
/// Telemetry OpenAPI document source (YAML)
pub const DEFAULT_TELEMETRY_SPEC_SOURCE: &str =
    "https://api.telemetry.confluent.cloud/docs/api.yaml";

const DEFAULT_LOOP_MAX_CONSECUTIVE_CALLS: u32 = 3;
const DEFAULT_LOOP_TIME_WINDOW_SECONDS: u64 = 60;
const DEFAULT_LOOP_COOLDOWN_SECONDS: u64 = 30;
const DEFAULT_LLM_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:8080";

/// Cloud control-plane credentials and scope
#[derive(Debug, Clone)]
pub struct CloudConfig {
    pub env_id: String,
    pub api_key: String,
    pub api_secret: String,
}

/// Kafka REST credentials and scope
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub bootstrap_servers: String,
    pub api_key: String,
    pub api_secret: String,
    pub rest_endpoint: String,
    pub cluster_id: String,
}

/// Flink credentials and scope
#[derive(Debug, Clone)]
pub struct FlinkConfig {
    pub org_id: String,
    pub rest_endpoint: String,
    pub env_name: String,
    pub database_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub compute_pool_id: String,
}

/// Schema Registry credentials and endpoint
#[derive(Debug, Clone)]
pub struct SchemaRegistryConfig {
    pub api_key: String,
    pub api_secret: String,
    pub endpoint: String,
}

/// TableFlow credentials
#[derive(Debug, Clone)]
pub struct TableflowConfig {
    pub api_key: String,
    pub api_secret: String,
}

/// OpenAPI document sources (file paths or URLs)
#[derive(Debug, Clone)]
pub struct SpecSources {
    pub main: String,
    pub telemetry: String,
}

/// Optional LLM-backed injection detection
#[derive(Debug, Clone)]
pub struct LlmDetectionConfig {
    pub enabled: bool,
    pub url: String,
    pub model: String,
    pub timeout_seconds: u64,
    pub api_key: Option<String>,
}

/// Loop-detection tunables
#[derive(Debug, Clone)]
pub struct LoopDetectionConfig {
    pub enabled: bool,
    pub max_consecutive_calls: u32,
    pub time_window_seconds: u64,
    pub cooldown_seconds: u64,
}

impl Default for LoopDetectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_consecutive_calls: DEFAULT_LOOP_MAX_CONSECUTIVE_CALLS,
            time_window_seconds: DEFAULT_LOOP_TIME_WINDOW_SECONDS,
            cooldown_seconds: DEFAULT_LOOP_COOLDOWN_SECONDS,
        }
    }
}

/// Complete server configuration, immutable after load
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub cloud: CloudConfig,
    pub kafka: KafkaConfig,
    pub flink: FlinkConfig,
    pub schema_registry: SchemaRegistryConfig,
    pub tableflow: TableflowConfig,
    pub specs: SpecSources,
    pub prompts_folder: Option<String>,
    pub directives_folder: Option<String>,
    pub llm_detection: LlmDetectionConfig,
    pub loop_detection: LoopDetectionConfig,
    pub disable_resource_discovery: bool,
    pub http_addr: String,
}

impl AppConfig {
    /// Load from process environment. Fails fast on missing or invalid
    /// required variables.
    pub fn from_env() -> ServerResult<Self> {
        Self::from_lookup(&|var| std::env::var(var).ok())
    }

    /// Load from an arbitrary variable lookup (injectable for tests)
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> ServerResult<Self> {
        let require = |var: &str| -> ServerResult<String> {
            lookup(var)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ServerError::MissingEnv(var.to_string()))
        };

        let require_prefixed = |var: &str, prefix: &str| -> ServerResult<String> {
            let value = require(var)?;
            if !value.starts_with(prefix) {
                return Err(ServerError::InvalidIdPrefix {
                    var: var.to_string(),
                    prefix: prefix.to_string(),
                    value,
                });
            }
            Ok(value)
        };

        let require_url = |var: &str| -> ServerResult<String> {
            let value = require(var)?;
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(ServerError::InvalidUrl {
                    var: var.to_string(),
                    value,
                });
            }
            Ok(value)
        };

        let truthy = |var: &str, default: bool| -> bool {
            lookup(var)
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(default)
        };

        let numeric = |var: &str, default: u64| -> u64 {
            lookup(var)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };

        let cloud = CloudConfig {
            env_id: require_prefixed("CONFLUENT_ENV_ID", "env-")?,
            api_key: require("CONFLUENT_CLOUD_API_KEY")?,
            api_secret: require("CONFLUENT_CLOUD_API_SECRET")?,
        };

        let kafka = KafkaConfig {
            bootstrap_servers: require("BOOTSTRAP_SERVERS")?,
            api_key: require("KAFKA_API_KEY")?,
            api_secret: require("KAFKA_API_SECRET")?,
            rest_endpoint: require_url("KAFKA_REST_ENDPOINT")?,
            cluster_id: require_prefixed("KAFKA_CLUSTER_ID", "lkc-")?,
        };

        let flink = FlinkConfig {
            org_id: require("FLINK_ORG_ID")?,
            rest_endpoint: require_url("FLINK_REST_ENDPOINT")?,
            env_name: require("FLINK_ENV_NAME")?,
            database_name: require("FLINK_DATABASE_NAME")?,
            api_key: require("FLINK_API_KEY")?,
            api_secret: require("FLINK_API_SECRET")?,
            compute_pool_id: require_prefixed("FLINK_COMPUTE_POOL_ID", "lfcp-")?,
        };

        let schema_registry = SchemaRegistryConfig {
            api_key: require("SCHEMA_REGISTRY_API_KEY")?,
            api_secret: require("SCHEMA_REGISTRY_API_SECRET")?,
            endpoint: require_url("SCHEMA_REGISTRY_ENDPOINT")?,
        };

        let tableflow = TableflowConfig {
            api_key: require("TABLEFLOW_API_KEY")?,
            api_secret: require("TABLEFLOW_API_SECRET")?,
        };

        let specs = SpecSources {
            main: lookup("OPENAPI_SPEC_URL").unwrap_or_else(|| DEFAULT_SPEC_SOURCE.to_string()),
            telemetry: lookup("TELEMETRY_OPENAPI_SPEC_URL")
                .unwrap_or_else(|| DEFAULT_TELEMETRY_SPEC_SOURCE.to_string()),
        };

        let llm_detection = LlmDetectionConfig {
            enabled: truthy("LLM_DETECTION_ENABLED", false),
            url: lookup("LLM_DETECTION_URL").unwrap_or_default(),
            model: lookup("LLM_DETECTION_MODEL").unwrap_or_default(),
            timeout_seconds: numeric("LLM_DETECTION_TIMEOUT_SECONDS", DEFAULT_LLM_TIMEOUT_SECONDS),
            api_key: lookup("LLM_DETECTION_API_KEY"),
        };

        let loop_detection = LoopDetectionConfig {
            enabled: truthy("LOOP_DETECTION_ENABLED", true),
            max_consecutive_calls: numeric(
                "LOOP_MAX_CONSECUTIVE_CALLS",
                u64::from(DEFAULT_LOOP_MAX_CONSECUTIVE_CALLS),
            ) as u32,
            time_window_seconds: numeric(
                "LOOP_TIME_WINDOW_SECONDS",
                DEFAULT_LOOP_TIME_WINDOW_SECONDS,
            ),
            cooldown_seconds: numeric("LOOP_COOLDOWN_SECONDS", DEFAULT_LOOP_COOLDOWN_SECONDS),
        };

        Ok(Self {
            cloud,
            kafka,
            flink,
            schema_registry,
            tableflow,
            specs,
            prompts_folder: lookup("PROMPTS_FOLDER"),
            directives_folder: lookup("DIRECTIVES_FOLDER"),
            llm_detection,
            loop_detection,
            disable_resource_discovery: truthy("DISABLE_RESOURCE_DISCOVERY", false),
            http_addr: lookup("MCP_HTTP_ADDR").unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string()),
        })
    }

    /// Resolve a default value for a path or required parameter.
    ///
    /// Parameter-name matching (case-insensitive substring) outranks the
    /// endpoint-pattern fallback.
    pub fn default_for_param(&self, key: &str, path: &str) -> Option<String> {
        let name = key.to_lowercase();

        if name.contains("environment_name") {
            return Some(self.flink.env_name.clone());
        }
        if name.contains("environment") {
            return Some(self.cloud.env_id.clone());
        }
        if name.contains("database") {
            return Some(self.flink.database_name.clone());
        }
        if name.contains("cluster_id") {
            return Some(self.kafka.cluster_id.clone());
        }
        if name.contains("pool_id") {
            return Some(self.flink.compute_pool_id.clone());
        }
        if name.contains("org") {
            return Some(self.flink.org_id.clone());
        }
        if name.contains("schema_registry") {
            return Some(self.schema_registry.endpoint.clone());
        }

        // Endpoint-pattern fallback for generically-named parameters
        let path = path.to_lowercase();
        if name == "id" {
            if path.contains("/kafka/") || path.contains("/clusters") {
                return Some(self.kafka.cluster_id.clone());
            }
            if path.contains("/compute-pools") {
                return Some(self.flink.compute_pool_id.clone());
            }
            if path.contains("/environments") {
                return Some(self.cloud.env_id.clone());
            }
        }

        None
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::collections::HashMap;

    /// Minimal complete variable set for tests
    pub fn full_env() -> HashMap<String, String> {
        let pairs = [
            ("CONFLUENT_ENV_ID", "env-abc123"),
            ("CONFLUENT_CLOUD_API_KEY", "cloud-key"),
            ("CONFLUENT_CLOUD_API_SECRET", "cloud-secret"),
            ("BOOTSTRAP_SERVERS", "pkc-1.us-west-2.aws.confluent.cloud:9092"),
            ("KAFKA_API_KEY", "kafka-key"),
            ("KAFKA_API_SECRET", "kafka-secret"),
            ("KAFKA_REST_ENDPOINT", "https://pkc-1.us-west-2.aws.confluent.cloud"),
            ("KAFKA_CLUSTER_ID", "lkc-xy123"),
            ("FLINK_ORG_ID", "7e2f11a0-1c2d-4b6e-9f2a-000000000000"),
            ("FLINK_REST_ENDPOINT", "https://flink.us-west-2.aws.confluent.cloud"),
            ("FLINK_ENV_NAME", "dev"),
            ("FLINK_DATABASE_NAME", "analytics"),
            ("FLINK_API_KEY", "flink-key"),
            ("FLINK_API_SECRET", "flink-secret"),
            ("FLINK_COMPUTE_POOL_ID", "lfcp-9z8y7"),
            ("SCHEMA_REGISTRY_API_KEY", "sr-key"),
            ("SCHEMA_REGISTRY_API_SECRET", "sr-secret"),
            ("SCHEMA_REGISTRY_ENDPOINT", "https://psrc-1.us-west-2.aws.confluent.cloud"),
            ("TABLEFLOW_API_KEY", "tf-key"),
            ("TABLEFLOW_API_SECRET", "tf-secret"),
        ];
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    pub fn config_from(env: &HashMap<String, String>) -> ServerResult<AppConfig> {
        AppConfig::from_lookup(&|var| env.get(var).cloned())
    }

    /// A fully-loaded config for pipeline tests
    pub fn test_config() -> AppConfig {
        config_from(&full_env()).expect("test env is complete")
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_full_env_loads() {
        let config = test_config();
        assert_eq!(config.cloud.env_id, "env-abc123");
        assert_eq!(config.kafka.cluster_id, "lkc-xy123");
        assert_eq!(config.loop_detection.max_consecutive_calls, 3);
        assert_eq!(config.llm_detection.timeout_seconds, 10);
        assert!(!config.llm_detection.enabled);
    }

    #[test]
    fn test_missing_required_var_fails() {
        let mut env = full_env();
        env.remove("CONFLUENT_CLOUD_API_KEY");
        let err = config_from(&env).unwrap_err();
        assert_eq!(err.code(), "E401");
    }

    #[test]
    fn test_invalid_env_prefix_fails() {
        let mut env = full_env();
        env.insert("KAFKA_CLUSTER_ID".to_string(), "abc-123".to_string());
        let err = config_from(&env).unwrap_err();
        assert_eq!(err.code(), "E402");
    }

    #[test]
    fn test_invalid_endpoint_url_fails() {
        let mut env = full_env();
        env.insert(
            "SCHEMA_REGISTRY_ENDPOINT".to_string(),
            "not-a-url".to_string(),
        );
        let err = config_from(&env).unwrap_err();
        assert_eq!(err.code(), "E403");
    }

    #[test]
    fn test_loop_tunables_override() {
        let mut env = full_env();
        env.insert("LOOP_MAX_CONSECUTIVE_CALLS".to_string(), "5".to_string());
        env.insert("LOOP_DETECTION_ENABLED".to_string(), "false".to_string());
        let config = config_from(&env).unwrap();
        assert_eq!(config.loop_detection.max_consecutive_calls, 5);
        assert!(!config.loop_detection.enabled);
    }

    #[test]
    fn test_param_defaults_by_name() {
        let config = test_config();
        assert_eq!(
            config.default_for_param("environment_id", "/iam/v2/environments"),
            Some("env-abc123".to_string())
        );
        assert_eq!(
            config.default_for_param("kafka_cluster_id", "/kafka/v3/clusters/{cluster_id}"),
            Some("lkc-xy123".to_string())
        );
        assert_eq!(
            config.default_for_param("compute_pool_id", "/fcpm/v2/compute-pools"),
            Some("lfcp-9z8y7".to_string())
        );
        assert_eq!(config.default_for_param("topic_name", "/topics"), None);
    }

    #[test]
    fn test_flink_statement_defaults() {
        let config = test_config();
        assert_eq!(
            config.default_for_param("environment_name", "/flink/v1/statements"),
            Some("dev".to_string())
        );
        assert_eq!(
            config.default_for_param("database_name", "/flink/v1/statements"),
            Some("analytics".to_string())
        );
    }

    #[test]
    fn test_param_default_name_outranks_path() {
        let config = test_config();
        // Name says environment even though the path is a Kafka path
        assert_eq!(
            config.default_for_param("environment", "/kafka/v3/clusters"),
            Some("env-abc123".to_string())
        );
    }

    #[test]
    fn test_param_default_path_fallback() {
        let config = test_config();
        assert_eq!(
            config.default_for_param("id", "/iam/v2/environments/{id}"),
            Some("env-abc123".to_string())
        );
    }
}
