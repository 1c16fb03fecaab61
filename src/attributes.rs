//! The deep-merged attribute view.
//!
//! Attributes are nested JSON object trees. Recipes see one read-mostly
//! view assembled from attribute-file defaults and the package's deploy
//! environment; `deep_merge` defines how layers combine.

use std::path::Path;

use serde_json::map::Entry;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AttributesError {
    #[error("failed to read attributes {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse attributes {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error(transparent)]
    Convert(#[from] serde_json::Error),
}

/// An empty attribute root.
pub fn root() -> Value {
    Value::Object(Map::new())
}

/// Merge `b` into `a`: keys where both sides hold mappings recurse, any
/// other key is replaced by `b`'s value. Mutates `a`.
pub fn deep_merge(a: &mut Value, b: Value) {
    match (a, b) {
        (Value::Object(a_map), Value::Object(b_map)) => {
            for (key, b_value) in b_map {
                match a_map.entry(key) {
                    Entry::Occupied(slot) => deep_merge(slot.into_mut(), b_value),
                    Entry::Vacant(slot) => {
                        slot.insert(b_value);
                    }
                }
            }
        }
        (a_slot, b_value) => *a_slot = b_value,
    }
}

/// Value at a dotted path, if present.
pub fn get<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Set the value at a dotted path, creating intermediate objects as
/// needed. Non-object values along the way are replaced.
pub fn set(root: &mut Value, path: &str, value: Value) {
    let mut current = root;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let map = current.as_object_mut().expect("just ensured an object");
        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return;
        }
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

/// Load a TOML attribute file as a JSON object tree.
pub fn load_toml(path: &Path) -> Result<Value, AttributesError> {
    let text = std::fs::read_to_string(path).map_err(|source| AttributesError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let parsed: toml::Value = toml::from_str(&text).map_err(|source| AttributesError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    Ok(serde_json::to_value(parsed)?)
}
