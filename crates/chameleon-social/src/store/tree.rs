//! Path operations on a JSON document tree.
//!
//! Empty objects and `null` never exist in the tree: writing either
//! removes the node, and removing the last child of an object prunes the
//! object itself.

use serde_json::{Map, Value};

use super::path::StorePath;
use super::types::is_server_timestamp;

pub(crate) fn get<'a>(root: &'a Value, path: &StorePath) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(root, |node, segment| node.as_object()?.get(segment))
}

/// Set (or with `None`, remove) the node at `path`.
pub(crate) fn set(root: &mut Value, path: &StorePath, value: Option<Value>) {
    let value = value.filter(|v| !is_empty(v));
    let Some((last, parents)) = path.segments().split_last() else {
        *root = value.unwrap_or_else(|| Value::Object(Map::new()));
        return;
    };

    match value {
        Some(value) => {
            let mut node = root;
            for segment in parents {
                node = ensure_object(node)
                    .entry(segment.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
            }
            ensure_object(node).insert(last.clone(), value);
        }
        None => {
            remove_at(root, path.segments());
        }
    }
}

/// Shallow merge into the object at `path`. `null` removes a child.
pub(crate) fn merge(root: &mut Value, path: &StorePath, fields: Map<String, Value>) {
    for (key, value) in fields {
        let child = path.child(&key);
        if value.is_null() {
            set(root, &child, None);
        } else {
            set(root, &child, Some(value));
        }
    }
}

/// Replace every server timestamp placeholder with `now`.
pub(crate) fn resolve_placeholders(value: &mut Value, now: i64) {
    if is_server_timestamp(value) {
        *value = Value::from(now);
        return;
    }
    match value {
        Value::Object(map) => map.values_mut().for_each(|v| resolve_placeholders(v, now)),
        Value::Array(items) => items.iter_mut().for_each(|v| resolve_placeholders(v, now)),
        _ => {}
    }
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}

fn remove_at(node: &mut Value, segments: &[String]) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    let Some(map) = node.as_object_mut() else {
        return;
    };
    if rest.is_empty() {
        map.remove(first);
        return;
    }
    if let Some(child) = map.get_mut(first) {
        remove_at(child, rest);
        if is_empty(child) {
            map.remove(first);
        }
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
