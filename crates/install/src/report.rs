//! Per-tool output buffers and outcome types.

use crate::error::InstallError;
use crate::pipeline::StepRecord;
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Human-readable progress for one tool, printed after all workers finish.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogBuffer {
    buf: Vec<u8>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one line.
    pub fn line(&mut self, message: impl fmt::Display) {
        self.buf.extend_from_slice(message.to_string().as_bytes());
        self.buf.push(b'\n');
    }

    /// Appends the contents of `other`.
    pub fn append(&mut self, other: &LogBuffer) {
        self.buf.extend_from_slice(&other.buf);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// What a successful install or uninstall did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub tool: String,
    pub scope: String,
    /// Scope root the operation worked under.
    pub root: PathBuf,
    pub files: usize,
    pub managed_keys: usize,
    pub steps: Vec<StepRecord>,
}

/// Top-level outcome of one tool's operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStatus {
    Ok,
    /// Succeeded although a step was rolled back. Indicates a bug.
    OkWithRollback,
    FailedRolledBack,
    FailedRollbackIncomplete,
}

impl InstallStatus {
    pub fn of(result: &Result<InstallReport, InstallError>) -> Self {
        use crate::pipeline::StepStatus;
        match result {
            Ok(report)
                if report
                    .steps
                    .iter()
                    .any(|s| matches!(s.status, StepStatus::Undone | StepStatus::UndoFailed)) =>
            {
                Self::OkWithRollback
            }
            Ok(_) => Self::Ok,
            Err(InstallError::RollbackIncomplete { .. }) => Self::FailedRollbackIncomplete,
            Err(_) => Self::FailedRolledBack,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::OkWithRollback => "ok_with_rollback",
            Self::FailedRolledBack => "failed_rolled_back",
            Self::FailedRollbackIncomplete => "failed_rollback_incomplete",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for InstallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of `brain list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolListing {
    pub name: String,
    pub display_name: String,
    pub tool_present: bool,
    pub brand_installed: bool,
}
