//! Canonical template source for the brain installer.
//!
//! The template tree holds tool-agnostic content, one top-level directory per
//! [`Category`]:
//!
//! ```text
//! templates/
//!   agents/architect.md
//!   skills/review/SKILL.md
//!   commands/ship.md
//!   commands/ship/01-intro.md      # fragments composed into `ship`
//!   rules/style.md
//!   hooks/hooks.json
//!   hooks/stop.sh
//!   mcp/server.json
//! ```
//!
//! # Examples
//!
//! ```
//! use brain_source::{Category, TemplateSource};
//! use tempfile::tempdir;
//!
//! let temp = tempdir().unwrap();
//! std::fs::create_dir_all(temp.path().join("agents")).unwrap();
//! std::fs::write(
//!     temp.path().join("agents/architect.md"),
//!     "---\nmodel: opus\n---\nDesign things.\n",
//! )
//! .unwrap();
//!
//! let source = TemplateSource::open(temp.path()).unwrap();
//! let agents = source.list(Category::Agent).unwrap();
//! assert_eq!(agents.len(), 1);
//! assert_eq!(agents[0].body, "Design things.\n");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// YAML frontmatter splitting and parsing.
pub mod frontmatter;
/// Directory scanning.
pub mod scanner;
/// Canonical file and category types.
pub mod types;

pub use frontmatter::{parse_document, render_document, Document};
pub use scanner::TemplateSource;
pub use types::{CanonicalFile, Category, Frontmatter, SKILL_FILE};

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading the template tree.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The template root does not exist or is not a directory.
    #[error("template source {0} is not a directory")]
    NotADirectory(PathBuf),
    /// A file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// Directory traversal failed.
    #[error("failed to scan {path}: {source}")]
    Walk {
        /// Directory being scanned.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: walkdir::Error,
    },
    /// A file's frontmatter is malformed.
    #[error("malformed frontmatter in {path}: {message}")]
    Parse {
        /// Offending file.
        path: PathBuf,
        /// What is wrong with it.
        message: String,
    },
    /// A path does not belong to any category directory.
    #[error("{0} is not inside a template category directory")]
    UnknownCategory(PathBuf),
}

/// Result type for template source operations.
pub type Result<T> = std::result::Result<T, SourceError>;
