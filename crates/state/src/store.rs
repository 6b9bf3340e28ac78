use crate::manifest::{Manifest, MANIFEST_VERSION};
use crate::{ManifestError, Result};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// One JSON manifest per tool under a state directory.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    dir: PathBuf,
}

impl ManifestStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at [`crate::state_dir`].
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self::new(crate::state_dir()?))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, tool: &str) -> PathBuf {
        self.dir.join(format!("{tool}.json"))
    }

    /// Reads the manifest for `tool`, or `None` when there is none.
    ///
    /// A manifest with an unknown `version` is reported as
    /// [`ManifestError::Incompatible`] and left on disk as-is.
    pub fn read(&self, tool: &str) -> Result<Option<Manifest>> {
        let path = self.path(tool);
        if !path.is_file() {
            return Ok(None);
        }
        let data = fs::read(&path).map_err(|source| ManifestError::Io {
            path: path.clone(),
            source,
        })?;
        let raw: serde_json::Value =
            serde_json::from_slice(&data).map_err(|source| ManifestError::Corrupt {
                path: path.clone(),
                source,
            })?;
        match raw.get("version").and_then(serde_json::Value::as_u64) {
            Some(v) if v == u64::from(MANIFEST_VERSION) => {}
            other => {
                return Err(ManifestError::Incompatible {
                    tool: tool.to_string(),
                    found: other.map_or_else(|| "<missing>".to_string(), |v| v.to_string()),
                    supported: MANIFEST_VERSION,
                })
            }
        }
        let manifest = serde_json::from_value(raw)
            .map_err(|source| ManifestError::Corrupt { path, source })?;
        Ok(Some(manifest))
    }

    /// Writes `manifest` atomically (temp file + rename), mode 0600.
    pub fn write(&self, manifest: &Manifest) -> Result<PathBuf> {
        let mut data = serde_json::to_vec_pretty(manifest).map_err(ManifestError::Serialize)?;
        data.push(b'\n');
        let path = self.replace(&manifest.tool_name, &data)?;

        tracing::debug!(
            target: "brain::state",
            tool = %manifest.tool_name,
            path = %path.display(),
            files = manifest.files.len(),
            keys = manifest.managed_keys.len(),
            "Wrote install manifest"
        );
        Ok(path)
    }

    /// Deletes the manifest for `tool`. Returns false when there was none.
    pub fn delete(&self, tool: &str) -> Result<bool> {
        let path = self.path(tool);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(ManifestError::Io { path, source }),
        }
    }

    /// Raw bytes of the manifest file, if any. Used to restore it verbatim.
    pub fn read_bytes(&self, tool: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(tool);
        if !path.is_file() {
            return Ok(None);
        }
        fs::read(&path)
            .map(Some)
            .map_err(|source| ManifestError::Io { path, source })
    }

    /// Restores bytes captured by [`ManifestStore::read_bytes`].
    pub fn restore_bytes(&self, tool: &str, data: Option<&[u8]>) -> Result<()> {
        match data {
            None => self.delete(tool).map(|_| ()),
            Some(data) => self.replace(tool, data).map(|_| ()),
        }
    }

    /// Replaces the manifest file for `tool` with `data` via a private temp
    /// file and rename. The temp file never outlives a failure.
    fn replace(&self, tool: &str, data: &[u8]) -> Result<PathBuf> {
        self.ensure_dir()?;
        let path = self.path(tool);
        let temp_path = path.with_extension("json.tmp");
        if let Err(source) = write_private(&temp_path, data) {
            let _ = fs::remove_file(&temp_path);
            return Err(ManifestError::Io {
                path: temp_path,
                source,
            });
        }
        if let Err(source) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(ManifestError::Io { path, source });
        }
        Ok(path)
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|source| ManifestError::Io {
            path: self.dir.clone(),
            source,
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.dir, fs::Permissions::from_mode(0o700)).map_err(
                |source| ManifestError::Io {
                    path: self.dir.clone(),
                    source,
                },
            )?;
        }
        Ok(())
    }
}

fn write_private(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    #[cfg(unix)]
    {
        // mode() only applies when the file is created
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(data)?;
    file.sync_all()
}
