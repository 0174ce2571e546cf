//! Path heuristics: resource extraction and semantic action inference

use crate::types::{HttpMethod, SemanticAction};

/// Plural noun endings accepted by the resource heuristic
const PLURAL_ENDINGS: [&str; 7] = ["ies", "es", "ings", "ers", "ors", "ants", "ents"];

/// Shortest segment accepted as a plain trailing-`s` plural
const MIN_PLURAL_LEN: usize = 4;

/// Trailing segments that mark a GET as a collection listing
const COLLECTION_SUFFIXES: [&str; 12] = [
    "topics",
    "subjects",
    "clusters",
    "partitions",
    "consumer-groups",
    "brokers",
    "connectors",
    "compute-pools",
    "statements",
    "environments",
    "service-accounts",
    "acls",
];

/// Sub-resource suffixes that force a GET to be a single-item read
const SPECIFIC_SUFFIXES: [&str; 3] = ["offsets", "status", "versions"];

/// Version segment: `v` prefix, at most three characters (`v1`, `v2`, `v10`)
fn is_version_segment(segment: &str) -> bool {
    segment.starts_with('v') && segment.len() <= 3
}

fn is_parameter(segment: &str) -> bool {
    segment.starts_with('{')
}

/// Whether a path segment reads as a plural resource noun
fn looks_plural(segment: &str) -> bool {
    if segment.len() > 3 && PLURAL_ENDINGS.iter().any(|e| segment.ends_with(e)) {
        return true;
    }
    if let Some(tail) = segment.rsplit('-').next() {
        if segment.contains('-') && tail.ends_with('s') {
            return true;
        }
    }
    segment.ends_with('s') && segment.len() >= MIN_PLURAL_LEN
}

/// Extract at most one resource name from a path template.
///
/// `configs` alone is always a sub-resource and never a resource name;
/// hyphenated forms such as `broker-configs` are legitimate.
pub fn extract_resource(path: &str) -> Option<String> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let candidates: Vec<&str> = segments
        .iter()
        .filter(|seg| !is_parameter(seg) && !is_version_segment(seg))
        .filter(|seg| **seg != "configs" && looks_plural(seg))
        .copied()
        .collect();

    if let Some(last) = candidates.last() {
        return Some(last.to_lowercase());
    }

    // No plural candidate: first usable segment from the right
    segments
        .iter()
        .rev()
        .find(|seg| !is_parameter(seg) && !is_version_segment(seg) && **seg != "configs")
        .map(|seg| seg.to_lowercase())
}

/// Trailing segment of a path, if any
fn last_segment(path: &str) -> Option<&str> {
    path.split('/').filter(|s| !s.is_empty()).next_back()
}

/// Collection-endpoint predicate, permissive form: the trailing segment
/// equals a known collection token, or the path ends with `/<token>`.
fn is_collection_endpoint(path: &str) -> bool {
    COLLECTION_SUFFIXES.iter().any(|token| {
        last_segment(path) == Some(*token) || path.ends_with(&format!("/{token}"))
    })
}

fn has_specific_suffix(path: &str) -> bool {
    SPECIFIC_SUFFIXES
        .iter()
        .any(|token| last_segment(path) == Some(*token))
}

/// Catalog entity-tag paths get their own verb mapping
fn classify_catalog(method: HttpMethod, path: &str) -> Option<SemanticAction> {
    if !path.contains("/catalog/") || !path.contains("tags") {
        return None;
    }
    let has_params = path.contains('{');
    match method {
        HttpMethod::Post if !has_params => Some(SemanticAction::Create),
        HttpMethod::Put if !has_params => Some(SemanticAction::Update),
        HttpMethod::Get => {
            if path.ends_with('}') {
                Some(SemanticAction::Get)
            } else {
                Some(SemanticAction::List)
            }
        }
        HttpMethod::Delete => Some(SemanticAction::Delete),
        _ => None,
    }
}

/// Map (method, path) to a semantic action; unclassifiable arms are skipped
pub fn classify_action(method: HttpMethod, path: &str) -> Option<SemanticAction> {
    if let Some(action) = classify_catalog(method, path) {
        return Some(action);
    }

    match method {
        HttpMethod::Get => {
            if !path.contains('{') {
                return Some(SemanticAction::List);
            }
            if is_collection_endpoint(path) {
                return Some(SemanticAction::List);
            }
            if has_specific_suffix(path) {
                return Some(SemanticAction::Get);
            }
            Some(SemanticAction::Get)
        }
        HttpMethod::Post => {
            let is_mutating_suffix = path.contains(":batch")
                || path.contains(":alter")
                || path.ends_with("/request")
                || path.ends_with("/undelete");
            if is_mutating_suffix {
                Some(SemanticAction::Update)
            } else {
                Some(SemanticAction::Create)
            }
        }
        HttpMethod::Put | HttpMethod::Patch => Some(SemanticAction::Update),
        HttpMethod::Delete => Some(SemanticAction::Delete),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_resource_from_nested_kafka_path() {
        assert_eq!(
            extract_resource("/kafka/v3/clusters/{cluster_id}/topics/{topic_name}/configs"),
            Some("topics".to_string())
        );
    }

    #[test]
    fn test_resource_hyphenated() {
        assert_eq!(
            extract_resource("/kafka/v3/clusters/{cluster_id}/broker-configs/{name}"),
            Some("broker-configs".to_string())
        );
    }

    #[test]
    fn test_resource_prefers_last_candidate() {
        assert_eq!(
            extract_resource("/connect/v1/environments/{env}/clusters/{cluster}/connectors"),
            Some("connectors".to_string())
        );
    }

    #[test]
    fn test_resource_skips_versions_and_params() {
        assert_eq!(
            extract_resource("/iam/v2/service-accounts"),
            Some("service-accounts".to_string())
        );
        // Only version and parameter segments: nothing to name
        assert_eq!(extract_resource("/v2/{id}"), None);
    }

    #[test]
    fn test_resource_fallback_singular() {
        // No plural segment: right-to-left first usable one
        assert_eq!(extract_resource("/mode/{subject}"), Some("mode".to_string()));
    }

    #[test]
    fn test_resource_never_bare_configs() {
        assert_eq!(
            extract_resource("/configs/{name}"),
            None,
            "bare configs is a sub-resource, not a resource"
        );
    }

    #[test]
    fn test_resource_acls_short_plural() {
        assert_eq!(
            extract_resource("/kafka/v3/clusters/{cluster_id}/acls"),
            Some("acls".to_string())
        );
    }

    #[test]
    fn test_resource_names_contain_no_braces() {
        for path in [
            "/kafka/v3/clusters/{cluster_id}/topics/{topic_name}",
            "/iam/v2/environments/{id}",
            "/{only_param}",
        ] {
            if let Some(name) = extract_resource(path) {
                assert!(!name.contains('{'), "{name} leaked a parameter");
            }
        }
    }

    #[test]
    fn test_action_get_instance_vs_collection() {
        assert_eq!(
            classify_action(
                HttpMethod::Get,
                "/kafka/v3/clusters/{cluster_id}/topics/{topic_name}"
            ),
            Some(SemanticAction::Get)
        );
        assert_eq!(
            classify_action(HttpMethod::Get, "/kafka/v3/clusters/{cluster_id}/topics"),
            Some(SemanticAction::List)
        );
        assert_eq!(
            classify_action(HttpMethod::Get, "/iam/v2/environments"),
            Some(SemanticAction::List)
        );
    }

    #[test]
    fn test_action_get_specific_suffix() {
        assert_eq!(
            classify_action(
                HttpMethod::Get,
                "/kafka/v3/clusters/{cluster_id}/topics/{topic}/partitions/{p}/offsets"
            ),
            Some(SemanticAction::Get)
        );
        assert_eq!(
            classify_action(HttpMethod::Get, "/connect/v1/connectors/{name}/status"),
            Some(SemanticAction::Get)
        );
    }

    #[test]
    fn test_action_post_special_suffixes() {
        assert_eq!(
            classify_action(HttpMethod::Post, "/iam/v2/service-accounts:batch"),
            Some(SemanticAction::Update)
        );
        assert_eq!(
            classify_action(HttpMethod::Post, "/kafka/v3/clusters/{id}/topics/{t}:alter"),
            Some(SemanticAction::Update)
        );
        assert_eq!(
            classify_action(HttpMethod::Post, "/flink/v1/statements/{name}/undelete"),
            Some(SemanticAction::Update)
        );
        assert_eq!(
            classify_action(HttpMethod::Post, "/iam/v2/service-accounts"),
            Some(SemanticAction::Create)
        );
    }

    #[test]
    fn test_action_put_patch_delete() {
        assert_eq!(
            classify_action(HttpMethod::Put, "/subjects/{subject}/versions/{v}"),
            Some(SemanticAction::Update)
        );
        assert_eq!(
            classify_action(HttpMethod::Patch, "/iam/v2/environments/{id}"),
            Some(SemanticAction::Update)
        );
        assert_eq!(
            classify_action(HttpMethod::Delete, "/iam/v2/service-accounts/{id}"),
            Some(SemanticAction::Delete)
        );
    }

    #[test]
    fn test_action_catalog_tags() {
        assert_eq!(
            classify_action(HttpMethod::Post, "/catalog/v1/entity/tags"),
            Some(SemanticAction::Create)
        );
        assert_eq!(
            classify_action(HttpMethod::Put, "/catalog/v1/entity/tags"),
            Some(SemanticAction::Update)
        );
        assert_eq!(
            classify_action(
                HttpMethod::Get,
                "/catalog/v1/entity/type/{typeName}/name/{qualifiedName}/tags/{tagName}"
            ),
            Some(SemanticAction::Get)
        );
        assert_eq!(
            classify_action(
                HttpMethod::Get,
                "/catalog/v1/entity/type/{typeName}/name/{qualifiedName}/tags"
            ),
            Some(SemanticAction::List)
        );
        assert_eq!(
            classify_action(
                HttpMethod::Delete,
                "/catalog/v1/entity/type/{typeName}/name/{qualifiedName}/tags/{tagName}"
            ),
            Some(SemanticAction::Delete)
        );
    }
}
