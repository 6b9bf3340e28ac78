//! JSON merge-patch with managed-key capture, and managed-key deletion.
//!
//! These two primitives are all the JSON manipulation placement needs;
//! every tool-specific document shape comes from configuration.

use crate::fsutil::write_atomic;
use crate::placement::PlacementError;
use brain_transform::jsonpath;
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::Path;

/// Key path as unescaped segments.
pub type Segments = Vec<String>;

/// Applies an RFC 7396 merge patch to `target` and returns the topmost paths
/// the patch created or overwrote.
///
/// A `null` in the patch deletes the key; deletions are not reported. When a
/// patch creates a key, only that key is reported, not its children.
///
/// ```
/// use brain_install::json::merge_patch;
/// use serde_json::json;
///
/// let mut doc = json!({"hooks": {"PreSave": [1]}});
/// let changed = merge_patch(&mut doc, &json!({"hooks": {"Stop": [2]}}));
/// assert_eq!(doc, json!({"hooks": {"PreSave": [1], "Stop": [2]}}));
/// assert_eq!(changed, vec![vec!["hooks".to_string(), "Stop".to_string()]]);
/// ```
pub fn merge_patch(target: &mut Value, patch: &Value) -> Vec<Segments> {
    let mut changed = Vec::new();
    let mut path = Vec::new();
    merge_into(target, patch, &mut path, &mut changed);
    changed
}

fn merge_into(target: &mut Value, patch: &Value, path: &mut Segments, changed: &mut Vec<Segments>) {
    let Some(patch_map) = patch.as_object() else {
        *target = patch.clone();
        changed.push(path.clone());
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
        if !path.is_empty() {
            changed.push(path.clone());
        }
        let mut ignored = Vec::new();
        merge_into(target, patch, path, &mut ignored);
        return;
    }
    let Some(target_map) = target.as_object_mut() else {
        return;
    };
    for (key, value) in patch_map {
        if value.is_null() {
            target_map.remove(key);
            continue;
        }
        path.push(key.clone());
        match target_map.get_mut(key) {
            Some(existing) if existing.is_object() && value.is_object() => {
                merge_into(existing, value, path, changed);
            }
            Some(existing) => {
                *existing = stripped(value);
                changed.push(path.clone());
            }
            None => {
                target_map.insert(key.clone(), stripped(value));
                changed.push(path.clone());
            }
        }
        path.pop();
    }
}

/// Merge-patch of `value` onto nothing: objects lose their null members.
fn stripped(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), stripped(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Looks up a key path.
pub fn get_path<'a>(doc: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter()
        .try_fold(doc, |node, segment| node.as_object()?.get(segment))
}

/// Deletes one key path. Parent objects are kept even when they become
/// empty. Returns whether anything was removed.
pub fn delete_path(doc: &mut Value, path: &[String]) -> bool {
    let Some((last, parents)) = path.split_last() else {
        return false;
    };
    let mut node = doc;
    for segment in parents {
        match node.as_object_mut().and_then(|m| m.get_mut(segment)) {
            Some(next) => node = next,
            None => return false,
        }
    }
    node.as_object_mut()
        .is_some_and(|map| map.remove(last).is_some())
}

/// Deletes `path` when it holds an empty object. Returns whether it did.
pub fn delete_if_empty(doc: &mut Value, path: &[String]) -> bool {
    let empty = get_path(doc, path)
        .and_then(Value::as_object)
        .is_some_and(Map::is_empty);
    empty && delete_path(doc, path)
}

/// Deletes every path; returns how many were present.
pub fn delete_paths<'a>(doc: &mut Value, paths: impl IntoIterator<Item = &'a str>) -> usize {
    paths
        .into_iter()
        .filter(|path| delete_path(doc, &jsonpath::split(path)))
        .count()
}

/// Sorts, dedups and drops paths covered by another path in the set.
pub fn collapse(paths: impl IntoIterator<Item = Segments>) -> Vec<Segments> {
    let mut all: Vec<Segments> = paths.into_iter().collect();
    all.sort();
    all.dedup();
    let mut kept: Vec<Segments> = Vec::with_capacity(all.len());
    for path in all {
        // Sorted order puts an ancestor directly before its descendants.
        if kept
            .last()
            .is_some_and(|prev| jsonpath::covers(prev, &path))
        {
            continue;
        }
        kept.push(path);
    }
    kept
}

/// Reads a shared document. A missing or blank file reads as `{}`.
pub fn read_document(path: &Path) -> Result<Value, PlacementError> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Value::Object(Map::new())),
        Err(source) => {
            return Err(PlacementError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    let doc: Value = serde_json::from_slice(&data).map_err(|source| PlacementError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    if !doc.is_object() {
        return Err(PlacementError::NotAnObject {
            path: path.to_path_buf(),
        });
    }
    Ok(doc)
}

/// Writes a shared document atomically as pretty JSON.
pub fn write_document(path: &Path, doc: &Value) -> Result<(), PlacementError> {
    let mut data = serde_json::to_vec_pretty(doc).map_err(|source| PlacementError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    data.push(b'\n');
    write_atomic(path, &data).map_err(|source| PlacementError::Io {
        path: path.to_path_buf(),
        source,
    })
}
