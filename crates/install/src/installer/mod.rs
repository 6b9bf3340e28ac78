//! The generic, config-driven tool installer.
//!
//! There is one implementation, [`ConfiguredInstaller`], parameterized by a
//! [`ToolConfig`]. Adding a tool means adding a config entry.

mod install;
mod recovery;
mod uninstall;

use crate::error::InstallError;
use crate::json;
use crate::pipeline::{CancelToken, PipelineFailure};
use crate::report::{InstallReport, LogBuffer};
use brain_config::{Brand, Detection, ToolConfig};
use brain_source::TemplateSource;
use brain_state::ManifestStore;
use brain_transform::jsonpath;
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(test)]
use mockall::automock;

/// Inputs shared by every tool in one run.
#[derive(Debug, Clone, Default)]
pub struct InstallRequest {
    /// Canonical templates. Required for install; used for recovery on uninstall.
    pub source: Option<TemplateSource>,
    /// Scope to install into; the tool's default scope when `None`.
    pub scope: Option<String>,
}

/// Installs and removes the brand for one target tool.
#[cfg_attr(test, automock)]
pub trait ToolInstaller: Send + Sync {
    /// Tool identifier (e.g. "claude", "cursor")
    fn name(&self) -> &str;

    fn display_name(&self) -> &str;

    /// The tool's configuration directory (e.g. ~/.claude)
    fn config_dir(&self) -> PathBuf;

    /// Whether the tool itself is present on this machine.
    fn is_tool_installed(&self) -> bool;

    /// Evaluates the tool's detection rule afresh.
    fn is_brain_installed(&self) -> bool;

    fn install(
        &self,
        request: &InstallRequest,
        log: &mut LogBuffer,
        cancel: &CancelToken,
    ) -> Result<InstallReport, InstallError>;

    fn uninstall(
        &self,
        request: &InstallRequest,
        log: &mut LogBuffer,
        cancel: &CancelToken,
    ) -> Result<InstallReport, InstallError>;
}

/// [`ToolInstaller`] driven entirely by a [`ToolConfig`].
#[derive(Debug, Clone)]
pub struct ConfiguredInstaller {
    tool: ToolConfig,
    brand: Brand,
    store: ManifestStore,
}

impl ConfiguredInstaller {
    pub fn new(tool: ToolConfig, brand: Brand, store: ManifestStore) -> Self {
        Self { tool, brand, store }
    }

    pub fn tool(&self) -> &ToolConfig {
        &self.tool
    }

    pub fn store(&self) -> &ManifestStore {
        &self.store
    }

    /// Scope name and absolute root for `scope`.
    fn resolve_scope(&self, scope: Option<&str>) -> Result<(String, PathBuf), InstallError> {
        let name = self.tool.scope_name(scope);
        let root = self.tool.scope_root(Some(name)).ok_or_else(|| {
            InstallError::PreconditionFailed(format!(
                "{} has no scope named '{name}'",
                self.tool.display_name
            ))
        })?;
        Ok((name.to_string(), root.to_path_buf()))
    }

    fn require_tool(&self) -> Result<(), InstallError> {
        if self.is_tool_installed() {
            Ok(())
        } else {
            Err(InstallError::PreconditionFailed(format!(
                "{} is not installed ({} not found)",
                self.tool.display_name,
                self.tool.config_dir.display()
            )))
        }
    }
}

impl ToolInstaller for ConfiguredInstaller {
    fn name(&self) -> &str {
        &self.tool.name
    }

    fn display_name(&self) -> &str {
        &self.tool.display_name
    }

    fn config_dir(&self) -> PathBuf {
        self.tool.config_dir.clone()
    }

    fn is_tool_installed(&self) -> bool {
        self.tool.config_dir.is_dir()
    }

    fn is_brain_installed(&self) -> bool {
        detect(&self.tool.detection, &self.tool.config_dir, &self.brand.prefix)
    }

    fn install(
        &self,
        request: &InstallRequest,
        log: &mut LogBuffer,
        cancel: &CancelToken,
    ) -> Result<InstallReport, InstallError> {
        install::run(self, request, log, cancel)
    }

    fn uninstall(
        &self,
        request: &InstallRequest,
        log: &mut LogBuffer,
        cancel: &CancelToken,
    ) -> Result<InstallReport, InstallError> {
        uninstall::run(self, request, log, cancel)
    }
}

/// Evaluates a detection rule against `config_dir`.
fn detect(rule: &Detection, config_dir: &Path, prefix: &str) -> bool {
    match rule {
        Detection::JsonKey { file, key } => {
            let path = config_dir.join(file);
            path.is_file()
                && json::read_document(&path)
                    .map(|doc| json::get_path(&doc, &jsonpath::split(key)).is_some())
                    .unwrap_or(false)
        }
        Detection::PrefixScan { dirs } => dirs.iter().any(|dir| {
            fs::read_dir(config_dir.join(dir))
                .map(|entries| {
                    entries
                        .filter_map(|e| e.ok())
                        .any(|e| e.file_name().to_string_lossy().starts_with(prefix))
                })
                .unwrap_or(false)
        }),
    }
}

/// Converts a rolled-back pipeline into the error reported to the caller.
///
/// `remnants` lists paths that may still hold partial state; it is only
/// consulted when an undo failed.
fn into_install_error(
    failure: PipelineFailure<InstallError>,
    remnants: impl FnOnce() -> Vec<PathBuf>,
) -> InstallError {
    let cause = match failure.cause {
        crate::pipeline::FailureCause::Step(err) => err,
        crate::pipeline::FailureCause::Cancelled => InstallError::Cancelled,
    };
    if failure.rollback.is_complete() {
        return cause;
    }
    InstallError::RollbackIncomplete {
        cause: Box::new(cause),
        failures: failure.rollback.failures,
        remnants: remnants(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn json_key_detection_follows_nested_path() {
        let tmp = tempdir().unwrap();
        fs::write(
            tmp.path().join("mcp.json"),
            r#"{"mcpServers": {"brain": {"command": "x"}}}"#,
        )
        .unwrap();
        let rule = |key: &str| Detection::JsonKey {
            file: PathBuf::from("mcp.json"),
            key: key.to_string(),
        };
        assert!(detect(&rule("mcpServers.brain"), tmp.path(), "🧠-"));
        assert!(!detect(&rule("mcpServers.other"), tmp.path(), "🧠-"));
    }

    #[test]
    fn json_key_detection_tolerates_bad_documents() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("mcp.json"), "{not json").unwrap();
        let rule = Detection::JsonKey {
            file: PathBuf::from("mcp.json"),
            key: "mcpServers".into(),
        };
        assert!(!detect(&rule, tmp.path(), "🧠-"));
    }

    #[test]
    fn prefix_scan_matches_branded_entries() {
        let tmp = tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("rules")).unwrap();
        fs::write(tmp.path().join("rules/mine.mdc"), "").unwrap();
        let rule = Detection::PrefixScan {
            dirs: vec![PathBuf::from("rules"), PathBuf::from("missing")],
        };
        assert!(!detect(&rule, tmp.path(), "🧠-"));

        fs::write(tmp.path().join("rules/🧠-style.mdc"), "").unwrap();
        assert!(detect(&rule, tmp.path(), "🧠-"));
    }
}
