//! Shared test fixtures for brain crates.
//!
//! Kept free of workspace dependencies so every crate can pull it in as a
//! dev-dependency without cycles.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, MutexGuard};
use walkdir::WalkDir;

/// Serialize tests that mutate process-global state (env vars, cwd).
pub fn env_guard() -> MutexGuard<'static, ()> {
    static TEST_SERIAL: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));
    TEST_SERIAL.lock().unwrap_or_else(|e| e.into_inner())
}

/// Restores an environment variable to its previous value on drop.
pub struct EnvVarGuard {
    key: &'static str,
    previous: Option<String>,
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        match &self.previous {
            Some(v) => std::env::set_var(self.key, v),
            None => std::env::remove_var(self.key),
        }
    }
}

/// Sets (or with `None`, removes) an environment variable until the guard drops.
///
/// ```
/// let _guard = brain_test_utils::set_env_var("BRAIN_DOC_VAR", Some("value"));
/// assert_eq!(std::env::var("BRAIN_DOC_VAR").unwrap(), "value");
/// ```
pub fn set_env_var(key: &'static str, value: Option<&str>) -> EnvVarGuard {
    let previous = std::env::var(key).ok();
    match value {
        Some(val) => std::env::set_var(key, val),
        None => std::env::remove_var(key),
    }
    EnvVarGuard { key, previous }
}

/// A canonical template tree built on disk inside a temp directory.
pub struct TemplateFixture {
    pub tempdir: tempfile::TempDir,
}

impl TemplateFixture {
    /// Creates an empty template tree.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            tempdir: tempfile::tempdir()?,
        })
    }

    /// Creates a tree with one item of every category.
    ///
    /// - `agents/architect.md` with `model`, `description`, `color`
    /// - `skills/review/SKILL.md` plus `skills/review/checklist.txt`
    /// - `commands/ship.md` composed from `commands/ship/01-plan.md`, `02-push.md`
    /// - `rules/style.md`
    /// - `hooks/hooks.json` referencing `hooks/stop.sh`
    /// - `mcp/server.json`
    pub fn sample() -> io::Result<Self> {
        let fixture = Self::new()?;
        fixture.agent(
            "architect",
            "---\nmodel: opus\ndescription: Designs systems\ncolor: blue\n---\nYou design systems.\n",
        )?;
        fixture.file("skills/review/SKILL.md", "---\nname: review\n---\nReview code.\n")?;
        fixture.file("skills/review/checklist.txt", "- tests pass\n")?;
        fixture.file("commands/ship.md", "---\ndescription: Ship it\n---\n# Ship\n")?;
        fixture.file("commands/ship/01-plan.md", "Plan the release.\n")?;
        fixture.file("commands/ship/02-push.md", "Push the tag.\n")?;
        fixture.file("rules/style.md", "---\nglobs: '*.rs'\n---\nUse rustfmt.\n")?;
        fixture.file(
            "hooks/hooks.json",
            r#"{"hooks":{"Stop":[{"type":"command","command":"${HOOKS_DIR}/stop.sh"}]}}"#,
        )?;
        fixture.file("hooks/stop.sh", "#!/bin/sh\necho stop\n")?;
        fixture.file(
            "mcp/server.json",
            r#"{"command":"${BRAIN_ROOT}/bin/brain-mcp","args":["serve"]}"#,
        )?;
        Ok(fixture)
    }

    /// Root of the template tree.
    pub fn root(&self) -> &Path {
        self.tempdir.path()
    }

    /// Writes `content` at `rel`, creating parent directories.
    pub fn file(&self, rel: &str, content: &str) -> io::Result<PathBuf> {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Writes `agents/<name>.md`.
    pub fn agent(&self, name: &str, content: &str) -> io::Result<PathBuf> {
        self.file(&format!("agents/{name}.md"), content)
    }

    /// Writes `rules/<name>.md`.
    pub fn rule(&self, name: &str, content: &str) -> io::Result<PathBuf> {
        self.file(&format!("rules/{name}.md"), content)
    }
}

/// Collects every file under `root` as sorted `(relative path, bytes)` pairs.
///
/// Used to compare whole trees before and after an operation.
pub fn snapshot_tree(root: &Path) -> io::Result<Vec<(PathBuf, Vec<u8>)>> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_dir() {
            continue;
        }
        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path()).to_path_buf();
        out.push((rel, fs::read(entry.path())?));
    }
    out.sort();
    Ok(out)
}
