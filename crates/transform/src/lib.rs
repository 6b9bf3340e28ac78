//! Transform engine for the brain installer.
//!
//! [`transform_all`] is a pure function from a canonical template tree and one
//! tool's configuration to the complete set of files that tool should receive.
//! Every per-tool difference (retained frontmatter, filename prefixing, rule
//! extensions, hook and MCP document shape) is driven by [`ToolConfig`] data.
//!
//! # Examples
//!
//! ```
//! use brain_config::{parse_config, Brand};
//! use brain_source::TemplateSource;
//! use brain_transform::{transform_all, TransformContext};
//! use std::path::Path;
//!
//! let temp = tempfile::tempdir().unwrap();
//! std::fs::create_dir_all(temp.path().join("agents")).unwrap();
//! std::fs::write(
//!     temp.path().join("agents/architect.md"),
//!     "---\nmodel: opus\ndescription: d\ncolor: red\n---\nBody\n",
//! )
//! .unwrap();
//!
//! let config = parse_config(
//!     r#"
//! tools:
//!   claude:
//!     display_name: Claude
//!     placement: direct
//!     config_dir: /home/me/.claude
//!     prefix: true
//!     scopes: { global: plugins/brain }
//!     default_scope: global
//!     agents: { frontmatter: [model, color] }
//!     rules: { extension: .md }
//!     hooks: { strategy: none }
//!     mcp: { strategy: none }
//!     manifest: { type: file_list }
//!     detection:
//!       brain_installed: { type: prefix_scan, dirs: [plugins/brain/agents] }
//! "#,
//!     Path::new("inline.yaml"),
//! )
//! .unwrap();
//!
//! let tool = &config.tools["claude"];
//! let source = TemplateSource::open(temp.path()).unwrap();
//! let ctx = TransformContext::new(tool, &config.brand, tool.scope_root(None).unwrap());
//! let output = transform_all(&source, &ctx).unwrap();
//!
//! assert_eq!(output.agents[0].path, Path::new("agents/🧠-architect.md"));
//! assert_eq!(
//!     String::from_utf8_lossy(&output.agents[0].content),
//!     "---\nmodel: opus\ncolor: red\n---\nBody\n"
//! );
//! ```

#![deny(unsafe_code)]

mod agents;
mod commands;
mod documents;
pub mod jsonpath;
pub mod output;
mod rules;
mod skills;

pub use output::{managed_keys_of, FileKind, GeneratedFile, MergePayload, TransformOutput};

use brain_config::{Brand, ToolConfig};
use brain_source::{SourceError, TemplateSource};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Inputs shared by every category transform.
#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'a> {
    pub tool: &'a ToolConfig,
    pub brand: &'a Brand,
    /// Absolute scope root the output will be placed under.
    pub root: &'a Path,
}

impl<'a> TransformContext<'a> {
    pub fn new(tool: &'a ToolConfig, brand: &'a Brand, root: &'a Path) -> Self {
        Self { tool, brand, root }
    }

    /// Filename marker for this tool (empty when prefixing is off).
    pub fn marker(&self) -> &'a str {
        self.brand.marker_for(self.tool)
    }

    pub(crate) fn prefixed(&self, name: &str) -> String {
        format!("{}{}", self.marker(), name)
    }
}

/// Errors raised while transforming canonical content.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransformError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("skill '{skill}' has no SKILL.md")]
    MissingSkillFile { skill: String },
    #[error("command '{command}' references missing fragment '{fragment}'")]
    MissingFragment { command: String, fragment: String },
    #[error("command '{command}' has an invalid fragments list: {message}")]
    InvalidFragments { command: String, message: String },
    #[error("hook document references missing script '{script}'")]
    MissingScript { script: String },
    #[error("{path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to render {path}: {message}")]
    Render { path: PathBuf, message: String },
}

/// Result type for transform operations.
pub type Result<T> = std::result::Result<T, TransformError>;

/// Produces every output file for `ctx.tool` from `source`.
///
/// Same inputs yield byte-equal outputs: no clocks, no randomness, and no
/// filesystem access beyond what [`TemplateSource`] reads.
pub fn transform_all(source: &TemplateSource, ctx: &TransformContext<'_>) -> Result<TransformOutput> {
    let mut output = TransformOutput {
        agents: agents::transform(source, ctx)?,
        skills: skills::transform(source, ctx)?,
        commands: commands::transform(source, ctx)?,
        rules: rules::transform(source, ctx)?,
        hooks: documents::hooks(source, ctx)?,
        mcp: documents::mcp(source, ctx)?,
        descriptor: documents::descriptor(ctx)?,
    };
    output.sort();

    tracing::debug!(
        target: "brain::transform",
        tool = %ctx.tool.name,
        files = output.len(),
        "Transformed canonical sources"
    );
    Ok(output)
}
