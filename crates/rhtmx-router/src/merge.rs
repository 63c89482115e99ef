//! JSON deep merge used for parent route inheritance

use serde_json::{Map, Value};

/// Merge `child` over `parent`
///
/// Objects merge key by key, recursively. Anything else in the child
/// (arrays, strings, numbers, booleans, null) replaces the parent's value.
/// Keys present only in the parent are kept.
///
/// ```
/// use rhtmx_router::merge::deep_merge_prefer_child;
/// use serde_json::json;
///
/// let parent = json!({ "requiresAuth": true, "dependencies": { "onboardingRequired": true } });
/// let child = json!({ "dependencies": { "roles": {} } });
///
/// let merged = deep_merge_prefer_child(&parent, &child);
/// assert_eq!(merged["requiresAuth"], json!(true));
/// assert_eq!(merged["dependencies"]["onboardingRequired"], json!(true));
/// ```
pub fn deep_merge_prefer_child(parent: &Value, child: &Value) -> Value {
    match (parent, child) {
        (Value::Object(parent_map), Value::Object(child_map)) => {
            let mut merged: Map<String, Value> = parent_map.clone();
            for (key, child_value) in child_map {
                let value = match parent_map.get(key) {
                    Some(parent_value) => deep_merge_prefer_child(parent_value, child_value),
                    None => child_value.clone(),
                };
                merged.insert(key.clone(), value);
            }
            Value::Object(merged)
        }
        (_, child) => child.clone(),
    }
}
