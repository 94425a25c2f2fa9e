/// Save-time checks for workflow definitions and API parameters

use crate::error::{DefinitionError, EdgeSide, EngineError};
use crate::tools::ConfigMap;
use crate::workflow::types::{ApiParam, NodeKind, WorkflowDefinition, WorkflowEdge, WorkflowNode};
use serde_json::Value;
use std::collections::HashSet;

/// Structural validation: non-empty, unique non-empty node ids, known edge endpoints
///
/// Cycles are not checked here; the DAG resolver rejects them at run time.
pub fn validate_definition(definition: &WorkflowDefinition) -> Result<(), DefinitionError> {
    if definition.nodes.is_empty() {
        return Err(DefinitionError::Empty);
    }

    let mut ids = HashSet::with_capacity(definition.nodes.len());
    for node in &definition.nodes {
        if node.id.is_empty() {
            return Err(DefinitionError::EmptyNodeId);
        }
        if !ids.insert(node.id.as_str()) {
            return Err(DefinitionError::DuplicateNodeId(node.id.clone()));
        }
    }

    for edge in &definition.edges {
        if !ids.contains(edge.source.as_str()) {
            return Err(DefinitionError::UnknownNodeReference {
                node_id: edge.source.clone(),
                side: EdgeSide::Source,
            });
        }
        if !ids.contains(edge.target.as_str()) {
            return Err(DefinitionError::UnknownNodeReference {
                node_id: edge.target.clone(),
                side: EdgeSide::Target,
            });
        }
    }

    Ok(())
}

/// Caller parameters declared on the workflow's external trigger
///
/// Only an `external_trigger` node without incoming edges counts; the first one in
/// authoring order wins. Entries of its `config.params` that are not objects are
/// ignored. Returns an empty list when there is no such node.
pub fn extract_external_trigger_params(
    nodes: &[WorkflowNode],
    edges: &[WorkflowEdge],
) -> Vec<ApiParam> {
    let targets: HashSet<&str> = edges.iter().map(|edge| edge.target.as_str()).collect();

    let Some(trigger) = nodes
        .iter()
        .filter(|node| !targets.contains(node.id.as_str()))
        .find(|node| node.kind == NodeKind::ExternalTrigger)
    else {
        return Vec::new();
    };

    let Some(Value::Array(entries)) = trigger.config.get("params") else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(Value::as_object)
        .map(|entry| {
            let text = |key: &str| {
                entry
                    .get(key)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            ApiParam {
                key: text("key"),
                param_type: text("type"),
                required: entry.get("required").and_then(Value::as_bool).unwrap_or(false),
                default_value: entry
                    .get("defaultValue")
                    .or_else(|| entry.get("default_value"))
                    .cloned(),
                description: text("description"),
            }
        })
        .collect()
}

/// Check caller parameters against the workflow's declared API params
///
/// Returns the parameters with defaults filled in for absent optional params.
/// Undeclared parameters are passed through.
pub fn apply_api_params(
    declared: &[ApiParam],
    supplied: &ConfigMap,
) -> Result<ConfigMap, EngineError> {
    let mut params = supplied.clone();

    for param in declared {
        match supplied.get(&param.key) {
            Some(value) => check_param_type(&param.key, value, &param.param_type)?,
            None if param.required => {
                return Err(EngineError::InvalidParam {
                    key: param.key.clone(),
                    message: "required parameter missing".to_string(),
                });
            }
            None => {
                if let Some(default) = &param.default_value {
                    params.insert(param.key.clone(), default.clone());
                }
            }
        }
    }

    Ok(params)
}

fn check_param_type(key: &str, value: &Value, expected: &str) -> Result<(), EngineError> {
    let matches = match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        _ => true,
    };

    if matches {
        Ok(())
    } else {
        Err(EngineError::InvalidParam {
            key: key.to_string(),
            message: format!("expected {}, got {}", expected, json_type_name(value)),
        })
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extracts_params_from_external_trigger() {
        let def = definition(json!({
            "id": "wf", "name": "wf",
            "nodes": [
                {"id": "api", "type": "external_trigger", "config": {"params": [
                    {"key": "city", "type": "string", "required": true, "description": "Target city"},
                    {"key": "days", "type": "number", "defaultValue": 3},
                    "not-an-object"
                ]}},
                {"id": "fetch", "type": "tool", "toolCode": "weather", "config": {"q": "{{external.city}}"}}
            ],
            "edges": [{"source": "api", "target": "fetch"}]
        }));

        let params = extract_external_trigger_params(&def.nodes, &def.edges);
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].key, "city");
        assert_eq!(params[0].param_type, "string");
        assert!(params[0].required);
        assert_eq!(params[0].description, "Target city");
        assert_eq!(params[1].key, "days");
        assert!(!params[1].required);
        assert_eq!(params[1].default_value, Some(json!(3)));

        let mut supplied = ConfigMap::new();
        supplied.insert("city".into(), json!("Oslo"));
        let applied = apply_api_params(&params, &supplied).unwrap();
        assert_eq!(applied["days"], json!(3));
        assert!(apply_api_params(&params, &ConfigMap::new()).is_err());
    }

    #[test]
    fn test_external_trigger_must_be_a_start_node() {
        let def = definition(json!({
            "id": "wf", "name": "wf",
            "nodes": [
                {"id": "start", "type": "trigger"},
                {"id": "late", "type": "external_trigger", "config": {"params": [{"key": "x", "type": "string"}]}}
            ],
            "edges": [{"source": "start", "target": "late"}]
        }));
        assert!(extract_external_trigger_params(&def.nodes, &def.edges).is_empty());

        let plain = definition(json!({"id": "wf", "name": "wf", "nodes": [{"id": "a", "type": "trigger"}]}));
        assert!(extract_external_trigger_params(&plain.nodes, &plain.edges).is_empty());
    }

    fn definition(value: serde_json::Value) -> WorkflowDefinition {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_valid_definition() {
        let def = definition(json!({
            "id": "wf", "name": "wf",
            "nodes": [{"id": "a", "type": "trigger"}, {"id": "b", "type": "delay"}],
            "edges": [{"source": "a", "target": "b"}]
        }));
        assert!(validate_definition(&def).is_ok());
    }

    #[test]
    fn test_empty_definition() {
        let def = definition(json!({"id": "wf", "name": "wf", "nodes": []}));
        assert_eq!(validate_definition(&def), Err(DefinitionError::Empty));
    }

    #[test]
    fn test_duplicate_and_empty_ids() {
        let dup = definition(json!({
            "id": "wf", "name": "wf",
            "nodes": [{"id": "a", "type": "trigger"}, {"id": "a", "type": "delay"}]
        }));
        assert_eq!(
            validate_definition(&dup),
            Err(DefinitionError::DuplicateNodeId("a".into()))
        );

        let empty = definition(json!({
            "id": "wf", "name": "wf", "nodes": [{"id": "", "type": "trigger"}]
        }));
        assert_eq!(validate_definition(&empty), Err(DefinitionError::EmptyNodeId));
    }

    #[test]
    fn test_unknown_edge_endpoints() {
        let def = definition(json!({
            "id": "wf", "name": "wf",
            "nodes": [{"id": "a", "type": "trigger"}],
            "edges": [{"source": "a", "target": "ghost"}]
        }));
        assert_eq!(
            validate_definition(&def),
            Err(DefinitionError::UnknownNodeReference {
                node_id: "ghost".into(),
                side: EdgeSide::Target
            })
        );
    }

    fn declared() -> Vec<ApiParam> {
        serde_json::from_value(json!([
            {"key": "city", "type": "string", "required": true},
            {"key": "days", "type": "number", "default_value": 3},
            {"key": "verbose", "type": "boolean"}
        ]))
        .unwrap()
    }

    #[test]
    fn test_api_params_fill_defaults() {
        let supplied = json!({"city": "Oslo", "extra": true});
        let params = apply_api_params(&declared(), supplied.as_object().unwrap()).unwrap();
        assert_eq!(params["city"], "Oslo");
        assert_eq!(params["days"], 3);
        assert_eq!(params["extra"], true);
        assert!(!params.contains_key("verbose"));
    }

    #[test]
    fn test_api_params_reject_missing_and_mistyped() {
        let missing = apply_api_params(&declared(), &ConfigMap::new()).unwrap_err();
        assert_eq!(missing.code(), "INVALID_PARAM");

        let supplied = json!({"city": "Oslo", "days": "three"});
        let err = apply_api_params(&declared(), supplied.as_object().unwrap()).unwrap_err();
        assert_eq!(err.to_string(), "invalid parameter 'days': expected number, got string");
    }
}
