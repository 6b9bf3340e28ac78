#![allow(dead_code)]

use brain_config::{parse_config, BrainConfig};
use brain_install::{ConfiguredInstaller, InstallRequest};
use brain_source::TemplateSource;
use brain_state::ManifestStore;
use brain_test_utils::TemplateFixture;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A fake home directory with tool config dirs, a state dir and templates.
pub struct Sandbox {
    pub home: TempDir,
    pub templates: TemplateFixture,
}

impl Sandbox {
    pub fn new(templates: TemplateFixture) -> Self {
        Self {
            home: tempfile::tempdir().unwrap(),
            templates,
        }
    }

    pub fn sample() -> Self {
        Self::new(TemplateFixture::sample().unwrap())
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.home.path().join(rel)
    }

    /// Creates the tool's config dir so the tool counts as present.
    pub fn tool_present(&self, dir: &str) -> PathBuf {
        let path = self.path(dir);
        fs::create_dir_all(&path).unwrap();
        path
    }

    pub fn store(&self) -> ManifestStore {
        ManifestStore::new(self.path("state"))
    }

    pub fn request(&self) -> InstallRequest {
        InstallRequest {
            source: Some(TemplateSource::open(self.templates.root()).unwrap()),
            scope: None,
        }
    }

    /// Parses a config whose `tools` mapping is `tools_yaml`, with `{home}`
    /// replaced by the sandbox home.
    pub fn config(&self, tools_yaml: &str) -> BrainConfig {
        let home = self.home.path().display().to_string();
        let yaml = format!(
            "brand:\n  version: 1.0.0\ntools:\n{}",
            tools_yaml.replace("{home}", &home)
        );
        parse_config(&yaml, Path::new("sandbox.yaml")).unwrap()
    }

    pub fn installer(&self, config: &BrainConfig, tool: &str) -> ConfiguredInstaller {
        ConfiguredInstaller::new(config.tools[tool].clone(), config.brand.clone(), self.store())
    }
}

/// A direct-placement tool owning `<home>/.claude/plugins/brain`.
pub const CLAUDE: &str = r#"
  claude:
    display_name: Claude
    placement: direct
    config_dir: "{home}/.claude"
    prefix: true
    scopes: { global: plugins/brain }
    default_scope: global
    agents: { frontmatter: [model, color] }
    rules: { extension: .md }
    hooks: { strategy: direct, target: hooks/hooks.json }
    mcp: { strategy: direct, target: .mcp.json }
    manifest: { type: marketplace }
    detection:
      brain_installed: { type: prefix_scan, dirs: [plugins/brain/agents] }
"#;

/// A copy-and-merge tool sharing `<home>/.cursor` with the user.
pub const CURSOR: &str = r#"
  cursor:
    display_name: Cursor
    placement: copy_and_merge
    config_dir: "{home}/.cursor"
    prefix: true
    scopes: { global: "." }
    default_scope: global
    agents: { frontmatter: [model] }
    rules: { extension: .mdc, extra_frontmatter: { alwaysApply: true } }
    hooks: { strategy: merge, target: hooks.json }
    mcp: { strategy: merge, target: mcp.json }
    manifest: { type: file_list }
    detection:
      brain_installed: { type: json_key, file: mcp.json, key: mcpServers.brain }
"#;

pub fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}
