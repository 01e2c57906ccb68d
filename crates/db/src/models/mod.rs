pub mod assignment;
pub mod batch;
pub mod project;
pub mod task;
pub mod user;

use std::collections::HashMap;

/// Flatten a JSONB object column into a string map.
///
/// Input fields are always written as string maps; answers may carry
/// multi-valued form keys, which serialize to JSON arrays and are
/// stringified here so exports always see flat cells.
pub fn string_map(value: &serde_json::Value) -> HashMap<String, String> {
    match value.as_object() {
        Some(object) => object
            .iter()
            .map(|(k, v)| {
                let v = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), v)
            })
            .collect(),
        None => HashMap::new(),
    }
}
