//! Validated configuration records.

use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// How transformed output is written into a tool's configuration directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// The scope subtree is owned outright and replaced wholesale.
    Direct,
    /// Files are copied next to user content; JSON targets are deep-merged.
    CopyAndMerge,
}

impl Placement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::CopyAndMerge => "copy_and_merge",
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strategy for a JSON document produced from hooks or MCP sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocStrategy {
    /// Written as a standalone file.
    Direct,
    /// Merged into a shared document with managed-key tracking.
    Merge,
    /// Not emitted.
    None,
}

impl DocStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Merge => "merge",
            Self::None => "none",
        }
    }
}

/// Shape of the install manifest recorded for a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestType {
    Marketplace,
    FileList,
}

impl ManifestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Marketplace => "marketplace",
            Self::FileList => "file_list",
        }
    }
}

/// Rule deciding whether the brand is already installed in a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Detection {
    /// A key path exists in a JSON file under `config_dir`.
    JsonKey { file: PathBuf, key: String },
    /// Any entry in the listed directories (under `config_dir`) carries the brand prefix.
    PrefixScan { dirs: Vec<PathBuf> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentsConfig {
    /// Retained frontmatter fields, in output order.
    pub frontmatter: Vec<String>,
    /// Output file extension, including the leading dot.
    pub extension: String,
    /// Per-agent selection. `None` emits every agent; otherwise only listed
    /// agents with a non-null entry are emitted, the entry overriding fields.
    pub select: Option<BTreeMap<String, Option<Mapping>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RulesConfig {
    pub extension: String,
    /// Injected into every rule's frontmatter; these keys always win.
    pub extra_frontmatter: Mapping,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HooksConfig {
    pub strategy: DocStrategy,
    /// Relative to the scope root. Present whenever `strategy` is not `none`.
    pub target: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpConfig {
    pub strategy: DocStrategy,
    pub target: Option<PathBuf>,
    /// Object that holds server definitions (`mcpServers` for most tools).
    pub servers_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestConfig {
    pub kind: ManifestType,
    /// Plugin descriptor emitted for `marketplace` installs.
    pub descriptor: PathBuf,
}

/// Everything the generic installer knows about one target tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolConfig {
    pub name: String,
    pub display_name: String,
    pub placement: Placement,
    /// Absolute path of the tool's configuration directory.
    pub config_dir: PathBuf,
    /// Prefix output filenames with the brand marker.
    pub prefix: bool,
    /// Scope name to absolute base path.
    pub scopes: BTreeMap<String, PathBuf>,
    pub default_scope: String,
    pub agents: AgentsConfig,
    pub rules: RulesConfig,
    pub hooks: HooksConfig,
    pub mcp: McpConfig,
    pub manifest: ManifestConfig,
    pub detection: Detection,
}

impl ToolConfig {
    /// Base path for `scope`, or the default scope when `None`.
    pub fn scope_root(&self, scope: Option<&str>) -> Option<&Path> {
        let name = scope.unwrap_or(&self.default_scope);
        self.scopes.get(name).map(PathBuf::as_path)
    }

    /// Resolves a scope name, falling back to the default scope.
    pub fn scope_name<'a>(&'a self, scope: Option<&'a str>) -> &'a str {
        scope.unwrap_or(&self.default_scope)
    }

    /// Shared JSON targets (relative to the scope root) whose strategy is `merge`.
    pub fn merge_targets(&self) -> Vec<&Path> {
        let mut targets = Vec::new();
        if self.hooks.strategy == DocStrategy::Merge {
            targets.extend(self.hooks.target.as_deref());
        }
        if self.mcp.strategy == DocStrategy::Merge {
            targets.extend(self.mcp.target.as_deref());
        }
        targets
    }
}

/// Branding applied to every install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Brand {
    /// Identifier used for managed keys (`mcpServers.<name>`).
    pub name: String,
    /// Filename marker for tools with `prefix: true`.
    pub prefix: String,
    pub version: String,
    pub description: Option<String>,
}

pub const DEFAULT_BRAND_NAME: &str = "brain";
pub const DEFAULT_BRAND_PREFIX: &str = "🧠-";

impl Default for Brand {
    fn default() -> Self {
        Self {
            name: DEFAULT_BRAND_NAME.to_string(),
            prefix: DEFAULT_BRAND_PREFIX.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: None,
        }
    }
}

impl Brand {
    /// The filename marker to use for `tool` (empty when prefixing is off).
    pub fn marker_for(&self, tool: &ToolConfig) -> &str {
        if tool.prefix {
            &self.prefix
        } else {
            ""
        }
    }
}

/// The full configuration document.
#[derive(Debug, Clone, PartialEq)]
pub struct BrainConfig {
    pub brand: Brand,
    /// Canonical template tree, if the document names one.
    pub source: Option<PathBuf>,
    /// Enabled tool names. `None` enables every configured tool.
    pub targets: Option<Vec<String>>,
    pub tools: BTreeMap<String, ToolConfig>,
}

impl BrainConfig {
    pub fn is_enabled(&self, name: &str) -> bool {
        match &self.targets {
            Some(targets) => targets.iter().any(|t| t == name),
            None => self.tools.contains_key(name),
        }
    }

    /// Enabled tools in name order.
    pub fn enabled_tools(&self) -> impl Iterator<Item = &ToolConfig> {
        self.tools.values().filter(|t| self.is_enabled(&t.name))
    }
}
