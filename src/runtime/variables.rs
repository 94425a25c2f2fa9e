/// Placeholder substitution for node configuration
///
/// String leaves may reference `{{env.KEY}}`, `{{external.PATH}}` and
/// `{{nodes.ID.PATH}}`. Substitution is textual and best-effort: anything that does
/// not resolve stays in the string exactly as written.

use crate::tools::ConfigMap;
use serde_json::Value;
use std::collections::HashMap;

/// Outputs of the nodes that have run so far, in execution order
#[derive(Debug, Clone, Default)]
pub struct NodeOutputs {
    entries: Vec<(String, ConfigMap)>,
}

impl NodeOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a node's output, replacing any earlier entry for the same node
    pub fn insert(&mut self, node_id: &str, output: ConfigMap) {
        match self.entries.iter_mut().find(|(id, _)| id == node_id) {
            Some(entry) => entry.1 = output,
            None => self.entries.push((node_id.to_string(), output)),
        }
    }

    pub fn get(&self, node_id: &str) -> Option<&ConfigMap> {
        self.entries
            .iter()
            .find(|(id, _)| id == node_id)
            .map(|(_, output)| output)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigMap)> {
        self.entries.iter().map(|(id, output)| (id.as_str(), output))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `{nodeId: output}` view handed to tools as `variables.nodes`
    pub fn to_map(&self) -> ConfigMap {
        self.entries
            .iter()
            .map(|(id, output)| (id.clone(), Value::Object(output.clone())))
            .collect()
    }
}

/// Everything a placeholder can refer to during one run
#[derive(Debug, Clone, Copy)]
pub struct VariableScope<'a> {
    pub env: &'a HashMap<String, String>,
    pub nodes: &'a NodeOutputs,
    pub external: &'a ConfigMap,
}

impl<'a> VariableScope<'a> {
    pub fn new(
        env: &'a HashMap<String, String>,
        nodes: &'a NodeOutputs,
        external: &'a ConfigMap,
    ) -> Self {
        Self {
            env,
            nodes,
            external,
        }
    }

    /// Resolve every string leaf of a configuration map
    pub fn resolve_config(&self, config: &ConfigMap) -> ConfigMap {
        config
            .iter()
            .map(|(key, value)| (key.clone(), self.resolve_value(value)))
            .collect()
    }

    /// Strings are templated and objects recursed; everything else is returned as is
    pub fn resolve_value(&self, value: &Value) -> Value {
        match value {
            Value::String(text) => Value::String(self.resolve_str(text)),
            Value::Object(map) => Value::Object(self.resolve_config(map)),
            other => other.clone(),
        }
    }

    /// Replace each `{{...}}` that resolves; substituted text is not scanned again
    ///
    /// An opening pair that does not resolve is kept as text and scanning resumes
    /// one byte later, so `{{{env.X}}}` still finds `{{env.X}}`.
    pub fn resolve_str(&self, input: &str) -> String {
        let mut resolved = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(open) = rest.find("{{") {
            resolved.push_str(&rest[..open]);
            let after_open = &rest[open + 2..];
            let Some(close) = after_open.find("}}") else {
                rest = &rest[open..];
                break;
            };

            match self.lookup(&after_open[..close]) {
                Some(text) => {
                    resolved.push_str(&text);
                    rest = &after_open[close + 2..];
                }
                None => {
                    resolved.push('{');
                    rest = &rest[open + 1..];
                }
            }
        }

        resolved.push_str(rest);
        resolved
    }

    fn lookup(&self, expression: &str) -> Option<String> {
        if let Some(key) = expression.strip_prefix("env.") {
            return self.env.get(key).cloned();
        }

        if let Some(path) = expression.strip_prefix("external.") {
            return lookup_path(self.external, path).map(stringify);
        }

        if let Some(reference) = expression.strip_prefix("nodes.") {
            let (node_id, path) = reference.split_once('.')?;
            let output = self.nodes.get(node_id)?;
            return lookup_path(output, path).map(stringify);
        }

        None
    }
}

/// Walk a dotted path; numeric segments index into arrays
pub fn lookup_path<'v>(root: &'v ConfigMap, path: &str) -> Option<&'v Value> {
    let mut segments = path.split('.');
    let mut current = root.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Strings verbatim, everything else as compact JSON
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Definition env vars overridden by run-time values; each external param is also
/// reachable as `env["external.KEY"]`
pub fn build_env_map(
    definition_env: &[crate::workflow::EnvVar],
    overrides: &HashMap<String, String>,
    external: &ConfigMap,
) -> HashMap<String, String> {
    let mut env: HashMap<String, String> = definition_env
        .iter()
        .map(|var| (var.key.clone(), var.value.clone()))
        .collect();

    env.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));

    for (key, value) in external {
        env.insert(format!("external.{}", key), stringify(value));
    }
    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> ConfigMap {
        value.as_object().cloned().unwrap()
    }

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_env_substitution() {
        let env = env(&[("X", "hello")]);
        let nodes = NodeOutputs::new();
        let external = ConfigMap::new();
        let scope = VariableScope::new(&env, &nodes, &external);

        let resolved = scope.resolve_config(&map(json!({
            "msg": "{{env.X}} world",
            "missing": "{{env.MISSING}}"
        })));
        assert_eq!(resolved["msg"], "hello world");
        assert_eq!(resolved["missing"], "{{env.MISSING}}");
    }

    #[test]
    fn test_unresolved_braces_do_not_hide_placeholders() {
        let env = env(&[("X", "hello")]);
        let nodes = NodeOutputs::new();
        let external = ConfigMap::new();
        let scope = VariableScope::new(&env, &nodes, &external);

        assert_eq!(scope.resolve_str("{{{env.X}}}"), "{hello}");
        assert_eq!(scope.resolve_str("a {{ b {{env.X}}"), "a {{ b hello");
        assert_eq!(scope.resolve_str("{{env.NOPE}} {{env.X}}"), "{{env.NOPE}} hello");
        assert_eq!(scope.resolve_str("tail {{env.X"), "tail {{env.X");
    }

    #[test]
    fn test_env_value_is_not_reparsed() {
        let env = env(&[("A", "{{env.B}}"), ("B", "nope")]);
        let nodes = NodeOutputs::new();
        let external = ConfigMap::new();
        let scope = VariableScope::new(&env, &nodes, &external);
        assert_eq!(scope.resolve_str("{{env.A}}"), "{{env.B}}");
    }

    #[test]
    fn test_node_output_substitution() {
        let env = HashMap::new();
        let mut nodes = NodeOutputs::new();
        nodes.insert("n1", map(json!({"result": 42, "items": [{"name": "first"}]})));
        nodes.insert("n2", map(json!({"output": {"status": "ok"}})));
        let external = ConfigMap::new();
        let scope = VariableScope::new(&env, &nodes, &external);

        assert_eq!(scope.resolve_str("{{nodes.n1.result}}"), "42");
        assert_eq!(scope.resolve_str("{{nodes.n1.items.0.name}}"), "first");
        assert_eq!(scope.resolve_str("{{nodes.n2.output.status}}"), "ok");
        assert_eq!(scope.resolve_str("{{nodes.n1.items}}"), r#"[{"name":"first"}]"#);
        assert_eq!(scope.resolve_str("{{nodes.n9.result}}"), "{{nodes.n9.result}}");
        assert_eq!(scope.resolve_str("{{nodes.n1.nope}}"), "{{nodes.n1.nope}}");
        // `output.` only walks a real nested object
        assert_eq!(scope.resolve_str("{{nodes.n1.output.result}}"), "{{nodes.n1.output.result}}");
    }

    #[test]
    fn test_external_paths() {
        let env = HashMap::new();
        let nodes = NodeOutputs::new();
        let external = map(json!({"user": {"name": "ada", "tags": ["x", "y"]}, "n": 7}));
        let scope = VariableScope::new(&env, &nodes, &external);

        assert_eq!(
            scope.resolve_str("hi {{external.user.name}} #{{external.n}} {{external.user.tags.1}}"),
            "hi ada #7 y"
        );
    }

    #[test]
    fn test_non_string_leaves_pass_through() {
        let env = env(&[("X", "hello")]);
        let nodes = NodeOutputs::new();
        let external = ConfigMap::new();
        let scope = VariableScope::new(&env, &nodes, &external);

        let config = map(json!({
            "count": 3,
            "flag": true,
            "none": null,
            "list": ["{{env.X}}"],
            "nested": {"deep": {"v": "{{env.X}}"}}
        }));
        let resolved = scope.resolve_config(&config);
        assert_eq!(resolved["count"], 3);
        assert_eq!(resolved["flag"], true);
        assert!(resolved["none"].is_null());
        assert_eq!(resolved["list"], json!(["{{env.X}}"]));
        assert_eq!(resolved["nested"]["deep"]["v"], "hello");
    }

    #[test]
    fn test_unterminated_placeholder() {
        let env = env(&[("X", "hello")]);
        let nodes = NodeOutputs::new();
        let external = ConfigMap::new();
        let scope = VariableScope::new(&env, &nodes, &external);
        assert_eq!(scope.resolve_str("{{env.X}} and {{env.X"), "hello and {{env.X");
    }

    #[test]
    fn test_build_env_map() {
        let definition: Vec<crate::workflow::EnvVar> = serde_json::from_value(json!([
            {"key": "REGION", "value": "eu"},
            {"key": "TOKEN", "value": "default"}
        ]))
        .unwrap();
        let overrides = env(&[("TOKEN", "override")]);
        let external = map(json!({"city": "Oslo", "days": 3}));

        let env = build_env_map(&definition, &overrides, &external);
        assert_eq!(env["REGION"], "eu");
        assert_eq!(env["TOKEN"], "override");
        assert_eq!(env["external.city"], "Oslo");
        assert_eq!(env["external.days"], "3");
    }

    #[test]
    fn test_outputs_keep_insertion_order() {
        let mut outputs = NodeOutputs::new();
        outputs.insert("b", map(json!({"v": 1})));
        outputs.insert("a", map(json!({"v": 2})));
        outputs.insert("b", map(json!({"v": 3})));

        let order: Vec<&str> = outputs.iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec!["b", "a"]);
        assert_eq!(outputs.get("b").unwrap()["v"], 3);
        assert_eq!(outputs.len(), 2);
    }
}
