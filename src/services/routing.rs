//! Base-URL and credential routing tables
//!
//! Both tables are ordered lists of (fragment set, producer) pairs over the
//! lower-cased request path; first match wins. New families are added by
//! extending a table, not by editing pipeline code.

use crate::types::*;

/// Telemetry path fragments (also used for credential routing)
const TELEMETRY_FRAGMENTS: &[&str] = &["/v2/metrics/", "/v2/descriptors/", "/telemetry/"];
const KAFKA_FRAGMENTS: &[&str] = &["/kafka/", "/topics/", "/consumer-groups/", "/acls"];
const FLINK_FRAGMENTS: &[&str] = &["/flink/", "/compute-pools/", "/statements/"];
const SCHEMA_REGISTRY_FRAGMENTS: &[&str] = &[
    "/schemas/",
    "/subjects/",
    "/mode",
    "/config",
    "/catalog/",
    "/exporters",
    "/contexts",
    "/dek-registry/",
];
const TABLEFLOW_FRAGMENTS: &[&str] = &["/tableflow/"];

type UrlProducer = fn(&AppConfig) -> String;

fn url_table() -> Vec<(&'static [&'static str], UrlProducer)> {
    vec![
        (TELEMETRY_FRAGMENTS, |_| {
            DEFAULT_TELEMETRY_BASE_URL.to_string()
        }),
        (KAFKA_FRAGMENTS, |c| c.kafka.rest_endpoint.clone()),
        (FLINK_FRAGMENTS, |c| c.flink.rest_endpoint.clone()),
        (SCHEMA_REGISTRY_FRAGMENTS, |c| {
            c.schema_registry.endpoint.clone()
        }),
        // TableFlow rides the control plane
        (TABLEFLOW_FRAGMENTS, |_| DEFAULT_CLOUD_BASE_URL.to_string()),
    ]
}

fn matches_any(path: &str, fragments: &[&str]) -> bool {
    fragments.iter().any(|f| path.contains(f))
}

/// Select the upstream base URL for a path. Defaults to the cloud
/// control plane.
pub fn base_url_for(config: &AppConfig, path: &str) -> String {
    let lower = path.to_lowercase();
    for (fragments, producer) in url_table() {
        if matches_any(&lower, fragments) {
            return producer(config);
        }
    }
    DEFAULT_CLOUD_BASE_URL.to_string()
}

/// A resolved credential pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub key: String,
    pub secret: String,
}

impl Credentials {
    fn checked(security_type: &str, key: &str, secret: &str) -> ServerResult<Self> {
        if key.is_empty() || secret.is_empty() {
            return Err(ServerError::MissingCredentials(security_type.to_string()));
        }
        Ok(Self {
            key: key.to_string(),
            secret: secret.to_string(),
        })
    }
}

type CredentialProducer = fn(&AppConfig) -> (String, String);

fn resource_credential_table() -> Vec<(&'static [&'static str], CredentialProducer)> {
    vec![
        (KAFKA_FRAGMENTS, |c| {
            (c.kafka.api_key.clone(), c.kafka.api_secret.clone())
        }),
        (FLINK_FRAGMENTS, |c| {
            (c.flink.api_key.clone(), c.flink.api_secret.clone())
        }),
        (SCHEMA_REGISTRY_FRAGMENTS, |c| {
            (
                c.schema_registry.api_key.clone(),
                c.schema_registry.api_secret.clone(),
            )
        }),
        (TABLEFLOW_FRAGMENTS, |c| {
            (c.tableflow.api_key.clone(), c.tableflow.api_secret.clone())
        }),
    ]
}

/// Select the credential pair for a security type and path.
///
/// `api-key` is a legacy alias for the cloud pair; unknown types fall back
/// to cloud as well. `resource-api-key` routes by path family, with
/// telemetry paths using the cloud pair.
pub fn credentials_for(
    config: &AppConfig,
    security_type: &str,
    path: &str,
) -> ServerResult<Credentials> {
    let cloud = || {
        Credentials::checked(
            security_type,
            &config.cloud.api_key,
            &config.cloud.api_secret,
        )
    };

    match security_type {
        "cloud-api-key" | "api-key" => cloud(),
        "resource-api-key" => {
            let lower = path.to_lowercase();
            if matches_any(&lower, TELEMETRY_FRAGMENTS) {
                return cloud();
            }
            for (fragments, producer) in resource_credential_table() {
                if matches_any(&lower, fragments) {
                    let (key, secret) = producer(config);
                    return Credentials::checked(security_type, &key, &secret);
                }
            }
            cloud()
        }
        _ => cloud(),
    }
}
