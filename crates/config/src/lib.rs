//! Declarative configuration for the brain installer.
//!
//! One [`ToolConfig`] record describes everything the installer needs to know
//! about a target tool: where its configuration lives, how canonical content is
//! reshaped for it, how the output is placed, and how an existing install is
//! detected. Adding a tool means adding a record, not code.
//!
//! # Examples
//!
//! ```
//! use brain_config::{parse_config, Placement};
//! use std::path::Path;
//!
//! let yaml = r#"
//! tools:
//!   cursor:
//!     display_name: Cursor
//!     placement: copy_and_merge
//!     config_dir: /home/me/.cursor
//!     prefix: true
//!     scopes: { global: "." }
//!     default_scope: global
//!     agents: { frontmatter: [name, description] }
//!     rules: { extension: .mdc }
//!     hooks: { strategy: none }
//!     mcp: { strategy: merge, target: mcp.json }
//!     manifest: { type: file_list }
//!     detection:
//!       brain_installed: { type: prefix_scan, dirs: [rules] }
//! "#;
//!
//! let config = parse_config(yaml, Path::new("inline.yaml")).unwrap();
//! let cursor = &config.tools["cursor"];
//! assert_eq!(cursor.placement, Placement::CopyAndMerge);
//! assert_eq!(cursor.rules.extension, ".mdc");
//! ```

#![deny(unsafe_code)]

pub mod env;
pub mod error;
pub mod loader;
pub mod types;

pub use env::{config_path, expand_home, home_dir, source_dir_from_env};
pub use error::{ConfigError, ConfigReport, Violation};
pub use loader::{load_config, parse_config};
pub use types::{
    AgentsConfig, BrainConfig, Brand, Detection, DocStrategy, HooksConfig, ManifestConfig,
    ManifestType, McpConfig, Placement, RulesConfig, ToolConfig,
};

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
