//! Tool-name and tool-argument normalization.
//!
//! The model calls tools under a variety of historical/alias names and
//! wraps arguments in nested `input`/`arguments`/`args` envelopes. This
//! module reduces both to the runtime's canonical shape before a
//! [`crate::registry::ToolRegistry`] ever sees them. Normalization is
//! idempotent: `normalize(normalize(x)) == normalize(x)`.

use serde_json::{Map, Value};

/// Map a historical/alias tool name to its canonical registered name.
pub fn normalize_name(name: &str) -> String {
    match name {
        "view_file_lines" => "view".to_string(),
        "exec_command" => "shell".to_string(),
        other => other.to_lowercase(),
    }
}

/// Recursively unwrap `input`/`arguments`/`args` envelopes, wrap a single
/// object as `{items: [obj]}`, and apply field aliases.
///
/// Idempotent: once a value has been unwrapped and wrapped into
/// `{items: [...]}` with aliased field names, running it through again is
/// a no-op because there is no further envelope to unwrap and the aliased
/// field names are not themselves alias sources.
pub fn normalize_args(raw: &Value) -> Value {
    let unwrapped = unwrap_envelope(raw);
    let items = match unwrapped {
        Value::Object(ref obj) if obj.contains_key("items") => unwrapped.clone(),
        Value::Object(obj) => {
            let mut wrapper = Map::new();
            wrapper.insert("items".to_string(), Value::Array(vec![Value::Object(obj)]));
            Value::Object(wrapper)
        }
        Value::Array(arr) => {
            let mut wrapper = Map::new();
            wrapper.insert("items".to_string(), Value::Array(arr));
            Value::Object(wrapper)
        }
        other => {
            let mut wrapper = Map::new();
            wrapper.insert("items".to_string(), Value::Array(vec![other]));
            Value::Object(wrapper)
        }
    };

    apply_item_aliases(items)
}

/// Recursively descend through `input`/`arguments`/`args` keys until none
/// remain, returning the innermost payload.
fn unwrap_envelope(value: &Value) -> Value {
    let mut current = value.clone();
    loop {
        let next = match &current {
            Value::Object(obj) if obj.len() == 1 => {
                obj.get("input")
                    .or_else(|| obj.get("arguments"))
                    .or_else(|| obj.get("args"))
                    .cloned()
            }
            _ => None,
        };
        match next {
            Some(inner) => current = inner,
            None => break,
        }
    }
    current
}

/// Apply field aliases to every object inside `items`.
fn apply_item_aliases(value: Value) -> Value {
    match value {
        Value::Object(mut obj) => {
            if let Some(Value::Array(items)) = obj.remove("items") {
                let aliased: Vec<Value> = items.into_iter().map(alias_item).collect();
                obj.insert("items".to_string(), Value::Array(aliased));
            }
            Value::Object(obj)
        }
        other => other,
    }
}

fn alias_item(item: Value) -> Value {
    let Value::Object(mut obj) = item else {
        return item;
    };

    if let Some(v) = obj.remove("start_line") {
        obj.entry("start").or_insert(v);
    }
    if let Some(v) = obj.remove("workdir") {
        obj.entry("cwd").or_insert(v);
    }
    if let Some(v) = obj.remove("yield_time_ms") {
        if let Some(ms) = v.as_u64() {
            let seconds = ms.div_ceil(1000);
            obj.entry("yield_seconds")
                .or_insert(Value::Number(seconds.into()));
        }
    }

    Value::Object(obj)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_name_applies_known_aliases() {
        assert_eq!(normalize_name("view_file_lines"), "view");
        assert_eq!(normalize_name("exec_command"), "shell");
        assert_eq!(normalize_name("Shell"), "shell");
    }

    #[test]
    fn normalize_args_wraps_single_object_as_items() {
        let raw = serde_json::json!({"path": "a.txt"});
        let normalized = normalize_args(&raw);
        assert_eq!(normalized["items"][0]["path"], "a.txt");
    }

    #[test]
    fn normalize_args_unwraps_nested_envelopes() {
        let raw = serde_json::json!({"input": {"arguments": {"command": "echo hi"}}});
        let normalized = normalize_args(&raw);
        assert_eq!(normalized["items"][0]["command"], "echo hi");
    }

    #[test]
    fn normalize_args_applies_field_aliases() {
        let raw = serde_json::json!({"start_line": 3, "workdir": "/tmp", "yield_time_ms": 2500});
        let normalized = normalize_args(&raw);
        let item = &normalized["items"][0];
        assert_eq!(item["start"], 3);
        assert_eq!(item["cwd"], "/tmp");
        assert_eq!(item["yield_seconds"], 3);
    }

    #[test]
    fn normalize_args_is_idempotent() {
        let raw = serde_json::json!({"arguments": {"start_line": 1, "workdir": "x"}});
        let once = normalize_args(&raw);
        let twice = normalize_args(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn normalize_args_is_idempotent_for_batch_input() {
        let raw = serde_json::json!({"items": [{"command": "ls"}, {"command": "pwd"}]});
        let once = normalize_args(&raw);
        let twice = normalize_args(&once);
        assert_eq!(once, twice);
    }
}
