/// Condition node evaluation

use crate::runtime::variables::{stringify, NodeOutputs};
use crate::tools::ConfigMap;
use serde_json::{json, Value};
use std::cmp::Ordering;

/// Compare two values with a named operator
///
/// Numeric when both sides read as numbers (JSON numbers or numeric strings),
/// otherwise on their display strings. Unknown operators are false.
pub fn compare(actual: &Value, operator: &str, expected: &Value) -> bool {
    let actual_text = stringify(actual);
    let expected_text = stringify(expected);

    let ordering = match (as_number(actual), as_number(expected)) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ => Some(actual_text.cmp(&expected_text)),
    };

    match operator {
        "equals" | "==" | "=" => ordering == Some(Ordering::Equal),
        "not_equals" | "!=" | "<>" => ordering != Some(Ordering::Equal),
        "greater_than" | ">" => ordering == Some(Ordering::Greater),
        "greater_than_or_equal" | ">=" => {
            matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
        }
        "less_than" | "<" => ordering == Some(Ordering::Less),
        "less_than_or_equal" | "<=" => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        "contains" => actual_text.contains(&expected_text),
        "not_contains" => !actual_text.contains(&expected_text),
        "starts_with" => actual_text.starts_with(&expected_text),
        "ends_with" => actual_text.ends_with(&expected_text),
        _ => false,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Evaluate a `conditionType: "simple"` configuration against prior outputs
///
/// `field` is either `nodeId.path` or a bare path searched in every output, where
/// the most recently executed match wins.
pub fn evaluate_simple(config: &ConfigMap, outputs: &NodeOutputs) -> Result<ConfigMap, String> {
    let field = config.get("field").and_then(Value::as_str).unwrap_or_default();
    let operator = config
        .get("operator")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let expected = config.get("value").cloned().unwrap_or(Value::Null);

    if field.is_empty() || operator.is_empty() {
        return Err("condition requires both 'field' and 'operator'".to_string());
    }

    let (source_node, actual) = match field.split_once('.') {
        Some((node_id, path)) => {
            let output = outputs
                .get(node_id)
                .ok_or_else(|| format!("no output from node '{}'", node_id))?;
            let actual = nested_field(output, path).cloned().unwrap_or(Value::Null);
            (node_id.to_string(), actual)
        }
        None => outputs
            .iter()
            .filter_map(|(node_id, output)| {
                nested_field(output, field).map(|value| (node_id.to_string(), value.clone()))
            })
            .last()
            .ok_or_else(|| format!("field '{}' not found in any node output", field))?,
    };

    let result = compare(&actual, operator, &expected);
    let message = format!(
        "{} {} {} = {}",
        stringify(&actual),
        operator,
        stringify(&expected),
        result
    );

    let mut output = ConfigMap::new();
    output.insert("result".into(), json!(result));
    output.insert("source_node".into(), json!(source_node));
    output.insert("field".into(), json!(field));
    output.insert("operator".into(), json!(operator));
    output.insert("actual_value".into(), actual);
    output.insert("expected_value".into(), expected);
    output.insert("message".into(), json!(message));
    Ok(output)
}

/// Object-only dotted lookup; null counts as absent
fn nested_field<'v>(output: &'v ConfigMap, path: &str) -> Option<&'v Value> {
    let mut segments = path.split('.');
    let mut current = output.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    (!current.is_null()).then_some(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_comparison_coerces_strings() {
        assert!(compare(&json!(10), ">", &json!("9")));
        assert!(compare(&json!("10"), "greater_than", &json!(9)));
        assert!(compare(&json!(1), "equals", &json!(1.0)));
        assert!(compare(&json!("3.5"), "<=", &json!(3.5)));
        assert!(!compare(&json!(2), "!=", &json!("2")));
    }

    #[test]
    fn test_string_comparison_is_lexicographic() {
        // "10" vs "9x" is not numeric on both sides
        assert!(compare(&json!("10"), "<", &json!("9x")));
        assert!(compare(&json!("apple"), "<", &json!("banana")));
        assert!(compare(&json!("ok"), "==", &json!("ok")));
        assert!(compare(&json!(true), "=", &json!("true")));
    }

    #[test]
    fn test_substring_operators() {
        assert!(compare(&json!("hello world"), "contains", &json!("lo w")));
        assert!(compare(&json!("hello"), "not_contains", &json!("xyz")));
        assert!(compare(&json!("hello"), "starts_with", &json!("he")));
        assert!(compare(&json!("hello"), "ends_with", &json!("llo")));
        assert!(compare(&json!([1, 2]), "contains", &json!("1,2")));
    }

    #[test]
    fn test_unknown_operator_is_false() {
        assert!(!compare(&json!(1), "roughly", &json!(1)));
    }

    fn outputs() -> NodeOutputs {
        let mut outputs = NodeOutputs::new();
        outputs.insert("a", json!({"status": 500, "body": {"ok": false}}).as_object().cloned().unwrap());
        outputs.insert("b", json!({"status": 200}).as_object().cloned().unwrap());
        outputs
    }

    fn config(value: Value) -> ConfigMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_qualified_field() {
        let result = evaluate_simple(
            &config(json!({"field": "a.status", "operator": ">=", "value": 400})),
            &outputs(),
        )
        .unwrap();
        assert_eq!(result["result"], true);
        assert_eq!(result["source_node"], "a");
        assert_eq!(result["actual_value"], 500);
        assert_eq!(result["message"], "500 >= 400 = true");
    }

    #[test]
    fn test_unqualified_field_last_match_wins() {
        let result = evaluate_simple(
            &config(json!({"field": "status", "operator": "==", "value": 200})),
            &outputs(),
        )
        .unwrap();
        assert_eq!(result["result"], true);
        assert_eq!(result["source_node"], "b");
    }

    #[test]
    fn test_missing_pieces_are_errors() {
        let outputs = outputs();
        assert!(evaluate_simple(&config(json!({"field": "status"})), &outputs).is_err());
        assert!(evaluate_simple(
            &config(json!({"field": "ghost.status", "operator": "=="})),
            &outputs
        )
        .is_err());
        assert!(evaluate_simple(
            &config(json!({"field": "latency", "operator": "=="})),
            &outputs
        )
        .is_err());
    }
}
