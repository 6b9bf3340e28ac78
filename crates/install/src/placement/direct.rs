use super::{PlacedRecord, PlacementError, PlacementStrategy, Result};
use crate::fsutil::{remove_path, write_atomic};
use brain_config::Placement;
use brain_state::Manifest;
use brain_transform::TransformOutput;
use std::path::{Path, PathBuf};

/// Placement for tools that let the brand own its scope directory outright.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectPlacement;

impl PlacementStrategy for DirectPlacement {
    fn kind(&self) -> Placement {
        Placement::Direct
    }

    fn footprint(&self, _output: &TransformOutput, root: &Path) -> Vec<PathBuf> {
        vec![root.to_path_buf()]
    }

    fn place(&self, output: &TransformOutput, root: &Path) -> Result<PlacedRecord> {
        remove_path(root).map_err(|e| PlacementError::io(root, e))?;

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
            "Placed subtree"
        );
        Ok(PlacedRecord {
            files,
            managed_subtree: Some(root.to_path_buf()),
        })
    }

    fn remove_files(&self, manifest: &Manifest, root: &Path) -> Result<()> {
        let subtree = manifest.managed_subtree.as_deref().unwrap_or(root);
        remove_path(subtree).map_err(|e| PlacementError::io(subtree, e))?;
        for file in manifest.files.iter().filter(|f| !f.starts_with(subtree)) {
            remove_path(file).map_err(|e| PlacementError::io(file, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brain_config::ManifestType;
    use brain_transform::GeneratedFile;
    use std::fs;
    use tempfile::tempdir;

    fn output() -> TransformOutput {
        TransformOutput {
            agents: vec![GeneratedFile::write("agents/🧠-architect.md", "a")],
            skills: vec![GeneratedFile::write("skills/🧠-review/SKILL.md", "s")],
            ..Default::default()
        }
    }

    #[test]
    fn place_replaces_the_whole_subtree() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("plugins/brain");
        fs::create_dir_all(root.join("agents")).unwrap();
        fs::write(root.join("agents/stale.md"), "old").unwrap();

        let record = DirectPlacement.place(&output(), &root).unwrap();

        assert!(!root.join("agents/stale.md").exists());
        assert_eq!(fs::read_to_string(root.join("agents/🧠-architect.md")).unwrap(), "a");
        assert_eq!(record.files.len(), 2);
        assert_eq!(record.managed_subtree.as_deref(), Some(root.as_path()));
    }

    #[test]
    fn remove_files_drops_subtree_and_leaves_siblings() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("plugins/brain");
        let sibling = tmp.path().join("plugins/other/keep.md");
        fs::create_dir_all(sibling.parent().unwrap()).unwrap();
        fs::write(&sibling, "keep").unwrap();

        let record = DirectPlacement.place(&output(), &root).unwrap();
        let mut manifest = Manifest::new("claude", "global", ManifestType::Marketplace);
        manifest.files = record.files;
        manifest.managed_subtree = record.managed_subtree;

        DirectPlacement.clean(&manifest, &root).unwrap();
        assert!(!root.exists());
        assert!(sibling.exists());

        // A second clean finds nothing to do.
        DirectPlacement.clean(&manifest, &root).unwrap();
    }
}
