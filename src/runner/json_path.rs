//! Dotted-path mutation of untyped JSON documents

use serde_json::{Map, Value};
use thiserror::Error;

/// Why a dotted key could not be set
#[derive(Error, Debug, PartialEq, Eq)]
pub enum JsonPathError {
    #[error("empty key segment")]
    EmptySegment,

    #[error("document root is not an object")]
    RootNotObject,

    #[error("path segment {0:?} not found")]
    MissingSegment(String),

    #[error("path segment {0:?} is not an object")]
    NotAnObject(String),
}

/// Set the leaf at dotted `key` inside `root` to `value`
///
/// Every segment before the leaf must already exist and be an object.
/// The leaf is inserted or replaced wholesale, whatever its type.
pub fn set_path(root: &mut Value, key: &str, value: Value) -> Result<(), JsonPathError> {
    let segments: Vec<&str> = key.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(JsonPathError::EmptySegment);
    }

    match root {
        Value::Object(map) => walk_and_set(map, &segments, value),
        _ => Err(JsonPathError::RootNotObject),
    }
}

fn walk_and_set(
    map: &mut Map<String, Value>,
    segments: &[&str],
    value: Value,
) -> Result<(), JsonPathError> {
    match segments {
        [] => Err(JsonPathError::EmptySegment),
        [leaf] => {
            map.insert((*leaf).to_string(), value);
            Ok(())
        }
        [head, rest @ ..] => match map.get_mut(*head) {
            Some(Value::Object(child)) => walk_and_set(child, rest, value),
            Some(_) => Err(JsonPathError::NotAnObject((*head).to_string())),
            None => Err(JsonPathError::MissingSegment((*head).to_string())),
        },
    }
}
