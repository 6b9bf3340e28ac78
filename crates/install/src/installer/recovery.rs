//! Rebuilding a manifest when the brand is detected but none was recorded.

use super::ConfiguredInstaller;
use crate::error::InstallError;
use crate::json;
use brain_config::{DocStrategy, Placement};
use brain_source::{Category, TemplateSource};
use brain_state::{ManagedKey, Manifest};
use brain_transform::{jsonpath, transform_all, MergePayload, TransformContext};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Reconstructs what an install into `root` would have recorded.
///
/// With a template source the answer comes from a fresh transform. Without
/// one, a prefixed tool can still be scanned for branded entries; otherwise
/// there is no safe way to tell brand files from user files.
pub(super) fn recover(
    installer: &ConfiguredInstaller,
    source: Option<&TemplateSource>,
    scope: &str,
    root: &Path,
) -> Result<Manifest, InstallError> {
    let tool = &installer.tool;
    let mut manifest = Manifest::new(&tool.name, scope, tool.manifest.kind);
    if tool.placement == Placement::Direct {
        manifest.managed_subtree = Some(root.to_path_buf());
    }

    match source {
        Some(source) => {
            let ctx = TransformContext::new(tool, &installer.brand, root);
            let output = transform_all(source, &ctx)?;
            manifest.files = output.writes().map(|f| root.join(&f.path)).collect();
            for (path, payload) in output.merges() {
                let file = root.join(path);
                let parents = match json::read_document(&file) {
                    Ok(doc) => created_parents(&doc, &payload),
                    Err(_) => Vec::new(),
                };
                let record = |path: String| ManagedKey {
                    file: file.clone(),
                    path,
                };
                manifest
                    .managed_keys
                    .extend(payload.managed_keys.into_iter().map(record));
                manifest
                    .created_parents
                    .extend(parents.into_iter().map(record));
            }
        }
        None if tool.prefix => {
            manifest.files = scan_prefixed(root, &installer.brand.prefix);
            if let (DocStrategy::Merge, Some(target)) = (tool.mcp.strategy, &tool.mcp.target) {
                manifest.managed_keys.push(ManagedKey {
                    file: root.join(target),
                    path: jsonpath::join([tool.mcp.servers_key.as_str(), installer.brand.name.as_str()]),
                });
            }
        }
        None => {
            return Err(InstallError::PreconditionFailed(format!(
                "no manifest recorded for {} and no template source to reconstruct one",
                tool.display_name
            )))
        }
    }

    manifest.normalize();
    tracing::info!(
        target: "brain::install",
        tool = %tool.name,
        files = manifest.files.len(),
        keys = manifest.managed_keys.len(),
        "Recovered manifest for detected install"
    );
    Ok(manifest)
}

/// Top-level objects that hold nothing but brand content, so the install
/// evidently created them.
fn created_parents(doc: &Value, payload: &MergePayload) -> Vec<String> {
    let mut parents: Vec<String> = payload
        .managed_keys
        .iter()
        .filter_map(|key| {
            let segments = jsonpath::split(key);
            let top = segments.first().filter(|_| segments.len() > 1)?;
            let live = doc.get(top)?.as_object()?;
            let ours = payload.content.get(top)?.as_object()?;
            live.keys()
                .all(|k| ours.contains_key(k))
                .then(|| jsonpath::join([top]))
        })
        .collect();
    parents.sort();
    parents.dedup();
    parents
}

/// Files under each category directory whose top-level entry carries `prefix`.
fn scan_prefixed(root: &Path, prefix: &str) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for category in Category::ALL {
        let Ok(entries) = fs::read_dir(root.join(category.dir_name())) else {
            continue;
        };
        for entry in entries.filter_map(|e| e.ok()) {
            if !entry.file_name().to_string_lossy().starts_with(prefix) {
                continue;
            }
            files.extend(
                WalkDir::new(entry.path())
                    .follow_links(false)
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| !e.file_type().is_dir())
                    .map(|e| e.into_path()),
            );
        }
    }
    files
}
