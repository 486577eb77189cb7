//! JSON path and merge utilities for the shared result tree.
//!
//! The executor writes every fetched subtree into the response at a path
//! computed from the gather plan. Paths address object keys and array
//! indices; descending through a key while standing on an array fans out
//! over every element, which is how "one exported field per item of a list"
//! lands without per-item bookkeeping in the caller.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

/// One segment of a JSON path into a result tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathElement {
    Index(usize),
    Key(String),
}

impl std::fmt::Display for PathElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathElement::Index(index) => write!(f, "{index}"),
            PathElement::Key(key) => write!(f, "{key}"),
        }
    }
}

/// Merges `source` into `target`. Objects merge key-wise, arrays merge
/// element-wise, anything else is overwritten (except that an explicit null
/// never clobbers existing data).
pub(crate) fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(target), Value::Array(source)) => {
            for (existing, value) in target.iter_mut().zip(source) {
                deep_merge(existing, value);
            }
        }
        (_, Value::Null) => {}
        (target, source) => *target = source,
    }
}

/// Merges `source` into `target` at `path`, creating intermediate objects
/// for key segments as needed. Standing on an array while descending a key
/// segment fans the remaining path out over every element.
pub(crate) fn merge_at_path(target: &mut Value, path: &[PathElement], source: Value) {
    let Some((head, rest)) = path.split_first() else {
        deep_merge(target, source);
        return;
    };
    match head {
        PathElement::Key(key) => {
            if let Value::Array(elements) = target {
                for element in elements {
                    merge_at_path(element, path, source.clone());
                }
                return;
            }
            if !target.is_object() {
                *target = Value::Object(Map::new());
            }
            let object = target.as_object_mut().expect("just ensured an object");
            let slot = object.entry(key.clone()).or_insert(Value::Null);
            merge_at_path(slot, rest, source);
        }
        PathElement::Index(index) => {
            if let Some(element) = target.get_mut(index) {
                merge_at_path(element, rest, source);
            }
        }
    }
}

/// Walks `keys` from `value`, fanning out over arrays, and yields every
/// reachable value along with its concrete (index-carrying) path.
pub(crate) fn select_values_and_paths<'a>(
    value: &'a Value,
    keys: &[String],
) -> Vec<(Vec<PathElement>, &'a Value)> {
    let mut results = Vec::new();
    collect(value, keys, Vec::new(), &mut results);
    results
}

fn collect<'a>(
    value: &'a Value,
    keys: &[String],
    prefix: Vec<PathElement>,
    results: &mut Vec<(Vec<PathElement>, &'a Value)>,
) {
    if let Value::Array(elements) = value {
        for (index, element) in elements.iter().enumerate() {
            let mut prefix = prefix.clone();
            prefix.push(PathElement::Index(index));
            collect(element, keys, prefix, results);
        }
        return;
    }
    match keys.split_first() {
        None => {
            if !value.is_null() {
                results.push((prefix, value));
            }
        }
        Some((key, rest)) => {
            if let Some(inner) = value.get(key) {
                let mut prefix = prefix;
                prefix.push(PathElement::Key(key.clone()));
                collect(inner, rest, prefix, results);
            }
        }
    }
}

/// Looks up a dotted path (`a.b.c`) of object keys, with no array fan-out.
/// Used to pull `select`-variable values out of a single entity.
pub(crate) fn get_dotted<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, key| current.get(key))
}

pub(crate) fn key_path(segments: &[String]) -> Vec<PathElement> {
    segments
        .iter()
        .map(|segment| PathElement::Key(segment.clone()))
        .collect()
}
