//! Installation machinery for the brain installer.
//!
//! - [`placement`]: writing transformed output (`direct` or
//!   `copy_and_merge`), with JSON merge-patch and managed-key removal in
//!   [`json`].
//! - [`pipeline`]: ordered steps with reverse-order rollback.
//! - [`installer`]: the single config-driven [`ToolInstaller`].
//! - [`registry`] and [`executor`]: tool selection and the parallel,
//!   fail-isolated run across tools.

#![deny(unsafe_code)]

pub mod error;
pub mod executor;
mod fsutil;
pub mod installer;
pub mod json;
pub mod pipeline;
pub mod placement;
pub mod registry;
pub mod report;
pub mod snapshot;

pub use error::InstallError;
pub use executor::{execute_all, ExecutionSummary, Operation, ToolResult};
pub use installer::{ConfiguredInstaller, InstallRequest, ToolInstaller};
pub use pipeline::{CancelToken, Pipeline, PipelineFailure, RollbackReport, Step, StepStatus};
pub use placement::{PlacementError, PlacementStrategy};
pub use registry::{Registry, RegistryError};
pub use report::{InstallReport, InstallStatus, LogBuffer, ToolListing};
pub use snapshot::Snapshot;
