//! Byte-exact captures of paths a step is about to change, used for undo.

use crate::fsutil::{remove_path, write_atomic};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    /// Did not exist; restoring removes whatever is there now.
    Absent(PathBuf),
    File { path: PathBuf, data: Vec<u8> },
    Tree {
        root: PathBuf,
        dirs: Vec<PathBuf>,
        files: Vec<(PathBuf, Vec<u8>)>,
    },
}

/// Prior state of a set of paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: Vec<Entry>,
}

impl Snapshot {
    /// Captures each path: file bytes, whole directory trees, or absence.
    ///
    /// For an absent path, the topmost missing ancestor is recorded so that
    /// restoring also removes directories created since.
    pub fn capture<I, P>(paths: I) -> io::Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut entries: Vec<Entry> = Vec::new();
        for path in paths {
            let path = path.as_ref();
            let entry = match fs::symlink_metadata(path) {
                Ok(meta) if meta.is_dir() => capture_tree(path)?,
                Ok(_) => Entry::File {
                    path: path.to_path_buf(),
                    data: fs::read(path)?,
                },
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    Entry::Absent(topmost_missing(path))
                }
                Err(e) => return Err(e),
            };
            if !entries.contains(&entry) {
                entries.push(entry);
            }
        }
        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Puts every captured path back the way it was.
    ///
    /// Keeps going after a failure and returns the first error.
    pub fn restore(&self) -> io::Result<()> {
        let mut first_error = None;
        let mut record = |result: io::Result<()>| {
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        };

        for entry in &self.entries {
            if let Entry::Absent(path) = entry {
                record(remove_path(path).map(|_| ()));
            }
        }
        for entry in &self.entries {
            match entry {
                Entry::Tree { root, dirs, files } => {
                    record(remove_path(root).map(|_| ()));
                    for dir in dirs {
                        record(fs::create_dir_all(dir));
                    }
                    for (path, data) in files {
                        record(write_atomic(path, data));
                    }
                }
                Entry::File { path, data } => record(write_atomic(path, data)),
                Entry::Absent(_) => {}
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn capture_tree(root: &Path) -> io::Result<Entry> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        let path = entry.path().to_path_buf();
        if entry.file_type().is_dir() {
            dirs.push(path);
        } else {
            let data = fs::read(&path)?;
            files.push((path, data));
        }
    }
    Ok(Entry::Tree {
        root: root.to_path_buf(),
        dirs,
        files,
    })
}

fn topmost_missing(path: &Path) -> PathBuf {
    let mut missing = path;
    while let Some(parent) = missing.parent() {
        if parent.as_os_str().is_empty() || parent.exists() {
            break;
        }
        missing = parent;
    }
    missing.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use brain_test_utils::snapshot_tree;
    use tempfile::tempdir;

    #[test]
    fn restores_modified_and_removes_created_files() {
        let tmp = tempdir().unwrap();
        let doc = tmp.path().join("hooks.json");
        fs::write(&doc, "{\"a\":1}").unwrap();
        let new_file = tmp.path().join("skills/x/SKILL.md");

        let snap = Snapshot::capture([&doc, &new_file]).unwrap();
        fs::write(&doc, "{}").unwrap();
        fs::create_dir_all(new_file.parent().unwrap()).unwrap();
        fs::write(&new_file, "new").unwrap();

        snap.restore().unwrap();
        assert_eq!(fs::read_to_string(&doc).unwrap(), "{\"a\":1}");
        assert!(!tmp.path().join("skills").exists());
    }

    #[test]
    fn tree_restore_is_exact() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("plugin");
        fs::create_dir_all(root.join("agents")).unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();
        fs::write(root.join("agents/a.md"), "a").unwrap();
        let before = snapshot_tree(&root).unwrap();

        let snap = Snapshot::capture([&root]).unwrap();
        fs::remove_dir_all(&root).unwrap();
        fs::create_dir_all(root.join("agents")).unwrap();
        fs::write(root.join("agents/b.md"), "b").unwrap();

        snap.restore().unwrap();
        assert_eq!(snapshot_tree(&root).unwrap(), before);
        assert!(root.join("empty").is_dir());
    }

    #[test]
    fn duplicate_paths_are_captured_once() {
        let tmp = tempdir().unwrap();
        let missing = tmp.path().join("a/b");
        let snap = Snapshot::capture([missing.join("c"), missing.join("d")]).unwrap();
        assert_eq!(snap.entries, vec![Entry::Absent(tmp.path().join("a"))]);
    }
}
