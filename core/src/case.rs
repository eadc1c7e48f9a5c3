//! snake_case to camelCase key normalization for decoded responses.
//!
//! The API speaks snake_case; the client hands callers camelCase. Only object
//! keys are rewritten. String values are left alone, even when they look like
//! identifiers.

use serde_json::{Map, Value};

/// Rewrites every object key in `value`, at any depth, with [`snake_to_camel`].
///
/// Arrays keep their order. Scalars are returned as-is.
pub fn camelize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (snake_to_camel(&k), camelize_keys(v)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(camelize_keys).collect()),
        scalar => scalar,
    }
}

/// `owner_id` becomes `ownerId`. Keys without `_` come back unchanged.
///
/// Empty segments from leading, trailing or doubled underscores are dropped.
/// A key made only of underscores is returned unchanged.
pub fn snake_to_camel(key: &str) -> String {
    if !key.contains('_') {
        return key.to_string();
    }
    let mut segments = key.split('_').filter(|s| !s.is_empty());
    let Some(first) = segments.next() else {
        return key.to_string();
    };
    let mut out = first.to_lowercase();
    for segment in segments {
        let mut chars = segment.chars();
        if let Some(c) = chars.next() {
            out.extend(c.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}
