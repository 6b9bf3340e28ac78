//! Tool name to installer mapping, built once at startup.

use crate::installer::{ConfiguredInstaller, ToolInstaller};
use crate::report::ToolListing;
use brain_config::BrainConfig;
use brain_state::ManifestStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown tool '{name}' (known tools: {known})")]
    UnknownTool { name: String, known: String },
}

/// Installers keyed by tool name, iterated in name order.
#[derive(Default)]
pub struct Registry {
    installers: BTreeMap<String, Arc<dyn ToolInstaller>>,
    /// Names eligible for "all"; `None` means every registered tool.
    enabled: Option<Vec<String>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One [`ConfiguredInstaller`] per configured tool; `targets` limits
    /// which of them [`Registry::all`] returns.
    pub fn from_config(config: &BrainConfig, store: &ManifestStore) -> Self {
        let mut registry = Self::new();
        for tool in config.tools.values() {
            registry.register(Arc::new(ConfiguredInstaller::new(
                tool.clone(),
                config.brand.clone(),
                store.clone(),
            )));
        }
        registry.enabled = config.targets.clone();
        tracing::debug!(
            target: "brain::registry",
            tools = registry.installers.len(),
            "Built installer registry"
        );
        registry
    }

    /// Adds or replaces the installer for its tool name.
    pub fn register(&mut self, installer: Arc<dyn ToolInstaller>) {
        self.installers
            .insert(installer.name().to_string(), installer);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolInstaller>> {
        self.installers.get(name).cloned()
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.installers.contains_key(name)
            && self
                .enabled
                .as_ref()
                .map_or(true, |enabled| enabled.iter().any(|e| e == name))
    }

    /// Every enabled installer, in name order.
    pub fn all(&self) -> Vec<Arc<dyn ToolInstaller>> {
        self.installers
            .iter()
            .filter(|(name, _)| self.is_enabled(name))
            .map(|(_, installer)| Arc::clone(installer))
            .collect()
    }

    /// Resolves explicit names, or every enabled tool when `names` is empty.
    ///
    /// Explicit names are honoured even when `targets` leaves them out.
    pub fn select(&self, names: &[String]) -> Result<Vec<Arc<dyn ToolInstaller>>, RegistryError> {
        if names.is_empty() {
            return Ok(self.all());
        }
        let mut selected: BTreeMap<&str, Arc<dyn ToolInstaller>> = BTreeMap::new();
        for name in names {
            let installer = self.get(name).ok_or_else(|| RegistryError::UnknownTool {
                name: name.clone(),
                known: self.names().join(", "),
            })?;
            selected.insert(name.as_str(), installer);
        }
        Ok(selected.into_values().collect())
    }

    pub fn names(&self) -> Vec<&str> {
        self.installers.keys().map(String::as_str).collect()
    }

    /// Fresh presence and detection checks for the selected tools.
    pub fn list(&self, names: &[String]) -> Result<Vec<ToolListing>, RegistryError> {
        Ok(self
            .select(names)?
            .iter()
            .map(|installer| ToolListing {
                name: installer.name().to_string(),
                display_name: installer.display_name().to_string(),
                tool_present: installer.is_tool_installed(),
                brand_installed: installer.is_brain_installed(),
            })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.installers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.installers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installer::MockToolInstaller;

    fn mock(name: &str, present: bool) -> Arc<dyn ToolInstaller> {
        let mut installer = MockToolInstaller::new();
        installer.expect_name().return_const(name.to_string());
        installer
            .expect_display_name()
            .return_const(name.to_uppercase());
        installer.expect_is_tool_installed().return_const(present);
        installer.expect_is_brain_installed().return_const(false);
        Arc::new(installer)
    }

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.register(mock("cursor", false));
        registry.register(mock("claude", true));
        registry
    }

    #[test]
    fn all_is_sorted_by_name() {
        let names: Vec<_> = registry()
            .all()
            .iter()
            .map(|i| i.name().to_string())
            .collect();
        assert_eq!(names, ["claude", "cursor"]);
    }

    #[test]
    fn select_rejects_unknown_names() {
        let err = registry().select(&["codex".to_string()]).err().unwrap();
        assert_eq!(
            err,
            RegistryError::UnknownTool {
                name: "codex".into(),
                known: "claude, cursor".into()
            }
        );
    }

    #[test]
    fn targets_limit_all_but_not_explicit_selection() {
        let mut registry = registry();
        registry.enabled = Some(vec!["cursor".into()]);
        assert_eq!(registry.all().len(), 1);
        assert_eq!(registry.select(&["claude".to_string()]).unwrap().len(), 1);
    }

    #[test]
    fn list_checks_each_tool() {
        let rows = registry().list(&[]).unwrap();
        assert_eq!(
            rows,
            vec![
                ToolListing {
                    name: "claude".into(),
                    display_name: "CLAUDE".into(),
                    tool_present: true,
                    brand_installed: false,
                },
                ToolListing {
                    name: "cursor".into(),
                    display_name: "CURSOR".into(),
                    tool_present: false,
                    brand_installed: false,
                },
            ]
        );
    }
}
