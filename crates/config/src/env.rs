use anyhow::Result;
use std::path::{Path, PathBuf};

/// Returns the user's home directory.
pub fn home_dir() -> Result<PathBuf> {
    #[cfg(unix)]
    if let Ok(home) = std::env::var("HOME") {
        return Ok(PathBuf::from(home));
    }
    dirs::home_dir().ok_or_else(|| anyhow::anyhow!("home directory not found"))
}

/// Expands a leading `~` to the home directory.
///
/// ```
/// use brain_config::expand_home;
/// use std::path::PathBuf;
///
/// assert_eq!(expand_home("/etc/brain").unwrap(), PathBuf::from("/etc/brain"));
/// ```
pub fn expand_home(raw: &str) -> Result<PathBuf> {
    if raw == "~" {
        return home_dir();
    }
    if let Some(rest) = raw.strip_prefix("~/") {
        return Ok(home_dir()?.join(rest));
    }
    Ok(PathBuf::from(raw))
}

/// Returns the configuration document path.
///
/// `BRAIN_CONFIG` wins over the default `~/.brain/config.yaml`.
pub fn config_path() -> Result<PathBuf> {
    if let Ok(custom) = std::env::var("BRAIN_CONFIG") {
        return Ok(PathBuf::from(custom));
    }
    Ok(home_dir()?.join(".brain").join("config.yaml"))
}

/// Returns the canonical template tree from `BRAIN_SOURCE_DIR`, if set.
pub fn source_dir_from_env() -> Option<PathBuf> {
    std::env::var("BRAIN_SOURCE_DIR")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

/// Resolves `path` against `base` unless it is already absolute, dropping
/// `.` components.
pub(crate) fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.components().collect()
    } else {
        base.join(path).components().collect()
    }
}
