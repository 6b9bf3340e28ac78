//! Writing transformed output into a tool's configuration directory.
//!
//! Two strategies exist: [`DirectPlacement`] owns the whole scope subtree and
//! replaces it wholesale; [`CopyAndMergePlacement`] writes files next to user
//! content and deep-merges shared JSON documents. Shared-document merging is
//! the same for both and lives in [`merge_shared`] / [`unmerge_shared`].

mod copy_merge;
mod direct;

pub use copy_merge::CopyAndMergePlacement;
pub use direct::DirectPlacement;

use crate::json;
use brain_config::Placement;
use brain_state::{ManagedKey, Manifest};
use brain_transform::{jsonpath, FileKind, TransformOutput};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlacementError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path} must contain a JSON object to be merged into")]
    NotAnObject { path: PathBuf },
    #[error("invalid merge payload for {path}: {message}")]
    InvalidPayload { path: PathBuf, message: String },
}

impl PlacementError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PlacementError>;

/// What a `place` call wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacedRecord {
    /// Absolute paths of files written outright.
    pub files: Vec<PathBuf>,
    /// Subtree owned wholesale, for direct placement.
    pub managed_subtree: Option<PathBuf>,
}

/// How files reach disk for one placement kind.
pub trait PlacementStrategy: Send + Sync {
    fn kind(&self) -> Placement;

    /// Paths `place` may create or change, for snapshotting before it runs.
    fn footprint(&self, output: &TransformOutput, root: &Path) -> Vec<PathBuf>;

    /// Writes every non-shared file of `output` under `root`.
    fn place(&self, output: &TransformOutput, root: &Path) -> Result<PlacedRecord>;

    /// Removes the files (and subtree) recorded in `manifest`.
    fn remove_files(&self, manifest: &Manifest, root: &Path) -> Result<()>;

    /// Removes a prior install: managed keys first, then files.
    fn clean(&self, manifest: &Manifest, root: &Path) -> Result<()> {
        unmerge_shared(&manifest.managed_keys, &manifest.created_parents)?;
        self.remove_files(manifest, root)
    }
}

/// Returns the strategy for `placement`.
pub fn strategy_for(placement: Placement) -> Box<dyn PlacementStrategy> {
    match placement {
        Placement::Direct => Box::new(DirectPlacement),
        Placement::CopyAndMerge => Box::new(CopyAndMergePlacement),
    }
}

/// Keys one merge recorded, split by how removal treats them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedKeys {
    /// Deleted outright on removal.
    pub keys: Vec<ManagedKey>,
    /// Objects the merge created to hold `keys`; deleted only once empty.
    pub created_parents: Vec<ManagedKey>,
}

/// Merges every shared-document payload of `output` into its target under
/// `root` and returns the keys to record.
///
/// Recorded keys are the payload's declared keys plus any other path the
/// merge created or overwrote. A created object that holds declared keys is
/// recorded as a parent instead, so user keys added beside ours later
/// survive removal.
pub fn merge_shared(output: &TransformOutput, root: &Path) -> Result<SharedKeys> {
    let mut shared = SharedKeys::default();
    for file in output.files().filter(|f| f.kind == FileKind::Merge) {
        let target = root.join(&file.path);
        let payload = file
            .merge_payload()
            .ok_or_else(|| PlacementError::InvalidPayload {
                path: target.clone(),
                message: "payload is not {managedKeys, content}".to_string(),
            })?;
        if !payload.content.is_object() {
            return Err(PlacementError::InvalidPayload {
                path: target,
                message: "content must be a JSON object".to_string(),
            });
        }

        let mut doc = json::read_document(&target)?;
        let changed = json::merge_patch(&mut doc, &payload.content);
        json::write_document(&target, &doc)?;

        let declared: Vec<json::Segments> =
            payload.managed_keys.iter().map(|k| jsonpath::split(k)).collect();
        let (created, overwritten): (Vec<_>, Vec<_>) = changed
            .into_iter()
            .partition(|path| declared.iter().any(|key| is_strict_ancestor(path, key)));
        let parents = created_objects(&created, &declared);
        let keys = json::collapse(overwritten.into_iter().chain(declared));
        tracing::debug!(
            target: "brain::install",
            path = %target.display(),
            keys = keys.len(),
            parents = parents.len(),
            "Merged shared document"
        );
        let record = |segments: json::Segments| ManagedKey {
            file: target.clone(),
            path: jsonpath::join(&segments),
        };
        shared.keys.extend(keys.into_iter().map(record));
        shared.created_parents.extend(parents.into_iter().map(record));
    }
    Ok(shared)
}

fn is_strict_ancestor(ancestor: &[String], path: &[String]) -> bool {
    ancestor.len() < path.len() && jsonpath::covers(ancestor, path)
}

/// Every object from a created ancestor down to the declared keys under it.
fn created_objects(created: &[json::Segments], declared: &[json::Segments]) -> Vec<json::Segments> {
    let mut objects: Vec<json::Segments> = created
        .iter()
        .flat_map(|top| {
            declared
                .iter()
                .filter(move |key| is_strict_ancestor(top, key))
                .flat_map(move |key| (top.len()..key.len()).map(move |n| key[..n].to_vec()))
        })
        .collect();
    objects.sort();
    objects.dedup();
    objects
}

/// Deletes exactly the recorded keys from their documents, then each created
/// parent that was left empty.
///
/// Unmanaged keys are untouched. A document left as `{}` is removed; a
/// missing document is skipped.
pub fn unmerge_shared(keys: &[ManagedKey], created_parents: &[ManagedKey]) -> Result<()> {
    let mut by_file: BTreeMap<&Path, (Vec<&str>, Vec<json::Segments>)> = BTreeMap::new();
    for key in keys {
        by_file
            .entry(key.file.as_path())
            .or_default()
            .0
            .push(key.path.as_str());
    }
    for parent in created_parents {
        by_file
            .entry(parent.file.as_path())
            .or_default()
            .1
            .push(jsonpath::split(&parent.path));
    }

    for (file, (paths, mut parents)) in by_file {
        if !file.exists() {
            continue;
        }
        let mut doc = json::read_document(file)?;
        let mut removed = json::delete_paths(&mut doc, paths.iter().copied());
        // Deepest first, so an emptied child can empty its parent.
        parents.sort_by_key(|p| std::cmp::Reverse(p.len()));
        removed += parents
            .iter()
            .filter(|parent| json::delete_if_empty(&mut doc, parent))
            .count();
        if doc.as_object().is_some_and(|m| m.is_empty()) {
            crate::fsutil::remove_path(file).map_err(|e| PlacementError::io(file, e))?;
        } else if removed > 0 {
            json::write_document(file, &doc)?;
        }
        tracing::debug!(
            target: "brain::install",
            path = %file.display(),
            removed,
            "Removed managed keys"
        );
    }
    Ok(())
}

/// Paths of every shared document `output` merges into.
pub fn merge_targets(output: &TransformOutput, root: &Path) -> Vec<PathBuf> {
    output
        .files()
        .filter(|f| f.kind == FileKind::Merge)
        .map(|f| root.join(&f.path))
        .collect()
}
