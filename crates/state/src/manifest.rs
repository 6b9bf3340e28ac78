use brain_config::ManifestType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// Schema version written by this build.
pub const MANIFEST_VERSION: u32 = 1;

/// A JSON key the installer owns inside a shared document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ManagedKey {
    /// Absolute path of the shared document.
    pub file: PathBuf,
    /// Escaped dot path (`hooks.Stop`).
    pub path: String,
}

/// Record of one tool install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub tool_name: String,
    pub scope: String,
    #[serde(with = "time::serde::rfc3339")]
    pub installed_at: OffsetDateTime,
    pub manifest_type: ManifestType,
    /// Absolute paths of every file written outright.
    pub files: Vec<PathBuf>,
    pub managed_keys: Vec<ManagedKey>,
    /// Objects created to hold managed keys; removed only once empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub created_parents: Vec<ManagedKey>,
    /// Subtree owned wholesale by a direct-placement install.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_subtree: Option<PathBuf>,
}

impl Manifest {
    pub fn new(tool_name: impl Into<String>, scope: impl Into<String>, manifest_type: ManifestType) -> Self {
        Self {
            version: MANIFEST_VERSION,
            tool_name: tool_name.into(),
            scope: scope.into(),
            installed_at: now_utc(),
            manifest_type,
            files: Vec::new(),
            managed_keys: Vec::new(),
            created_parents: Vec::new(),
            managed_subtree: None,
        }
    }

    /// Sorts and dedups entries so equal installs serialize identically.
    pub fn normalize(&mut self) {
        self.files.sort();
        self.files.dedup();
        self.managed_keys.sort();
        self.managed_keys.dedup();
        self.created_parents.sort();
        self.created_parents.dedup();
    }

    /// True when both manifests describe the same install, ignoring the timestamp.
    pub fn same_install(&self, other: &Manifest) -> bool {
        Manifest {
            installed_at: other.installed_at,
            ..self.clone()
        } == *other
    }

    /// Whether `path` is recorded, either as a file or inside the managed subtree.
    pub fn covers(&self, path: &Path) -> bool {
        self.files.iter().any(|f| f == path)
            || self
                .managed_subtree
                .as_deref()
                .is_some_and(|root| path.starts_with(root))
    }

    /// Managed keys recorded for one shared document.
    pub fn keys_for<'a>(&'a self, file: &'a Path) -> impl Iterator<Item = &'a str> + 'a {
        self.managed_keys
            .iter()
            .filter(move |k| k.file == file)
            .map(|k| k.path.as_str())
    }

    /// Distinct shared documents with managed keys.
    pub fn shared_documents(&self) -> Vec<&Path> {
        let mut docs: Vec<&Path> = self
            .managed_keys
            .iter()
            .chain(&self.created_parents)
            .map(|k| k.file.as_path())
            .collect();
        docs.sort();
        docs.dedup();
        docs
    }
}

/// Current UTC time truncated to whole seconds.
pub fn now_utc() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(0).unwrap_or(now)
}
