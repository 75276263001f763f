//! Order-independent serialization of file trees.

use crate::WatchResult;
use serde::Serialize;
use serde_json::{Map, Value};

/// Serialize a tree so that equivalent trees produce identical strings.
///
/// Every array is sorted by the `path` string of its elements (stable;
/// elements without a string `path` come first, in their original order)
/// and object keys are emitted in sorted order, at every level.
pub fn canonicalize_tree(value: &Value) -> String {
    canonical_value(value).to_string()
}

/// Serialize any tree-shaped value into its canonical string.
pub fn canonical_snapshot<T: Serialize>(tree: &T) -> WatchResult<String> {
    Ok(canonicalize_tree(&serde_json::to_value(tree)?))
}

fn canonical_value(value: &Value) -> Value {
    match value {
        Value::Array(items) => {
            let mut items: Vec<Value> = items.iter().map(canonical_value).collect();
            items.sort_by(|a, b| path_key(a).cmp(&path_key(b)));
            Value::Array(items)
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::new();
            for (key, child) in entries {
                sorted.insert(key.clone(), canonical_value(child));
            }
            Value::Object(sorted)
        }
        other => other.clone(),
    }
}

fn path_key(value: &Value) -> Option<&str> {
    value.get("path")?.as_str()
}
