//! Install manifests.
//!
//! A manifest records everything one install wrote: absolute file paths,
//! the managed subtree for direct placement, and every JSON key merged into a
//! shared document. Uninstall works from the manifest alone.

#![deny(unsafe_code)]

pub mod env;
pub mod manifest;
pub mod store;

pub use env::state_dir;
pub use manifest::{ManagedKey, Manifest, MANIFEST_VERSION};
pub use store::ManifestStore;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ManifestError {
    #[error("manifest I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("manifest {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// The manifest was written by a newer (or unknown) schema; it is left untouched.
    #[error("manifest for '{tool}' has version {found}, this build understands version {supported}")]
    Incompatible {
        tool: String,
        found: String,
        supported: u32,
    },
    #[error("failed to serialize manifest: {0}")]
    Serialize(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ManifestError>;
