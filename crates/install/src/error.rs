use crate::placement::PlacementError;
use brain_source::SourceError;
use brain_state::ManifestError;
use brain_transform::TransformError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by a tool install or uninstall.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InstallError {
    /// The tool is not present, or there is nothing to uninstall.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error(transparent)]
    Placement(#[from] PlacementError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    /// Capturing or restoring prior file state failed.
    #[error("failed to {action}: {source}")]
    Snapshot {
        action: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("operation cancelled")]
    Cancelled,
    #[error("worker for '{0}' panicked")]
    Panicked(String),
    /// An undo failed while rolling back `cause`.
    #[error(
        "{cause}; rollback incomplete, manual cleanup may be required for: {}",
        list_paths(remnants)
    )]
    RollbackIncomplete {
        cause: Box<InstallError>,
        failures: Vec<(String, InstallError)>,
        remnants: Vec<PathBuf>,
    },
}

impl From<SourceError> for InstallError {
    fn from(err: SourceError) -> Self {
        Self::Transform(TransformError::Source(err))
    }
}

impl InstallError {
    /// Short error-kind label for user output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PreconditionFailed(_) => "PreconditionFailed",
            Self::Transform(_) => "TransformError",
            Self::Placement(_) => "PlacementError",
            Self::Manifest(ManifestError::Incompatible { .. }) => "ManifestIncompatible",
            Self::Manifest(_) => "ManifestError",
            Self::Snapshot { .. } => "PlacementError",
            Self::Cancelled => "Cancelled",
            Self::Panicked(_) => "Internal",
            Self::RollbackIncomplete { .. } => "RollbackIncomplete",
        }
    }

    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::PreconditionFailed(_))
    }

    pub(crate) fn snapshot(action: &'static str) -> impl FnOnce(std::io::Error) -> Self {
        move |source| Self::Snapshot { action, source }
    }
}

fn list_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "(no remaining files found)".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
