use super::{PlacedRecord, PlacementError, PlacementStrategy, Result};
use crate::fsutil::{prune_empty_dirs, remove_path, write_atomic};
use brain_config::Placement;
use brain_state::Manifest;
use brain_transform::TransformOutput;
use std::path::{Path, PathBuf};

/// Placement for tools whose directories the brand shares with the user.
///
/// Only files the install wrote are ever removed; shared JSON documents are
/// merged key by key through [`super::merge_shared`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyAndMergePlacement;

impl PlacementStrategy for CopyAndMergePlacement {
    fn kind(&self) -> Placement {
        Placement::CopyAndMerge
    }

    fn footprint(&self, output: &TransformOutput, root: &Path) -> Vec<PathBuf> {
        output.writes().map(|f| root.join(&f.path)).collect()
    }

    fn place(&self, output: &TransformOutput, root: &Path) -> Result<PlacedRecord> {
        let mut files = Vec::new();
        for file in output.writes() {
            let path = root.join(&file.path);
            write_atomic(&path, &file.content).map_err(|e| PlacementError::io(&path, e))?;
            files.push(path);
        }
        tracing::debug!(
            target: "brain::install",
            root = %root.display(),
            files = files.len(),
            "Copied files"
        );
        Ok(PlacedRecord {
            files,
            managed_subtree: None,
        })
    }

    fn remove_files(&self, manifest: &Manifest, root: &Path) -> Result<()> {
        for file in &manifest.files {
            remove_path(file).map_err(|e| PlacementError::io(file, e))?;
            if let Some(parent) = file.parent() {
                prune_empty_dirs(parent, &category_floor(file, root));
            }
        }
        Ok(())
    }
}

/// The category directory (`<root>/skills`) a file lives in; pruning stops
/// there so the tool's own directory layout survives uninstall.
fn category_floor(file: &Path, root: &Path) -> PathBuf {
    match file.strip_prefix(root).ok().and_then(|rel| rel.components().next()) {
        Some(first) => root.join(first),
        None => root.to_path_buf(),
    }
}
