use serde_json::{Map, Value};

/// Recursively merges `source` into `destination` and returns the merged destination.
///
/// Nested objects are merged key by key; every other value in `source` overwrites the value at
/// the same key in `destination`.
pub fn deep_merge_dict(
    source: &Map<String, Value>,
    mut destination: Map<String, Value>,
) -> Map<String, Value> {
    merge_into(source, &mut destination);
    destination
}

fn merge_into(source: &Map<String, Value>, destination: &mut Map<String, Value>) {
    for (key, value) in source {
        match value {
            Value::Object(child) => {
                let node = destination
                    .entry(key.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !node.is_object() {
                    *node = Value::Object(Map::new());
                }
                if let Value::Object(node) = node {
                    merge_into(child, node);
                }
            }
            other => {
                destination.insert(key.clone(), other.clone());
            }
        }
    }
}
