use anyhow::Result;
use brain_config::home_dir;
use std::path::PathBuf;

/// Returns the directory holding per-tool install manifests.
///
/// `BRAIN_STATE_DIR` wins over the default `~/.brain/state/manifests`.
pub fn state_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var("BRAIN_STATE_DIR")
        .ok()
        .filter(|s| !s.is_empty())
    {
        return Ok(PathBuf::from(dir));
    }
    Ok(home_dir()?.join(".brain").join("state").join("manifests"))
}
