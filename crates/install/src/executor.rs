//! Runs one operation across many tools in parallel, one worker per tool.
//!
//! Workers share nothing but the filesystem (tools own disjoint directory
//! trees) and never cancel each other. Each worker's output goes to its own
//! [`LogBuffer`]; buffers are printed in tool-name order once every worker
//! has finished.

use crate::error::InstallError;
use crate::installer::{InstallRequest, ToolInstaller};
use crate::pipeline::CancelToken;
use crate::report::{InstallReport, InstallStatus, LogBuffer};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Install,
    Uninstall,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Uninstall => "uninstall",
        }
    }
}

/// Outcome of one tool's worker.
#[derive(Debug)]
pub struct ToolResult {
    pub name: String,
    pub status: InstallStatus,
    pub outcome: Result<InstallReport, InstallError>,
    pub log: LogBuffer,
}

impl ToolResult {
    fn new(name: String, outcome: Result<InstallReport, InstallError>, log: LogBuffer) -> Self {
        Self {
            status: InstallStatus::of(&outcome),
            name,
            outcome,
            log,
        }
    }

    pub fn error(&self) -> Option<&InstallError> {
        self.outcome.as_ref().err()
    }
}

/// Per-tool results keyed (and therefore ordered) by tool name.
#[derive(Debug)]
pub struct ExecutionSummary {
    pub operation: Operation,
    pub results: BTreeMap<String, ToolResult>,
}

impl ExecutionSummary {
    /// `0` when every tool succeeded, `3` when every tool failed a
    /// precondition, `1` otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.results.values().all(|r| r.status.is_ok()) {
            return 0;
        }
        let all_preconditions = self
            .results
            .values()
            .all(|r| r.error().is_some_and(InstallError::is_precondition));
        if all_preconditions {
            3
        } else {
            1
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code() == 0
    }

    /// Writes each tool's buffered output and a status line, by tool name.
    pub fn print(&self, out: &mut impl Write) -> io::Result<()> {
        for result in self.results.values() {
            out.write_all(result.log.as_bytes())?;
            match &result.outcome {
                Ok(report) => writeln!(
                    out,
                    "{}: {} ({}, {} files, {} managed keys)",
                    result.name,
                    result.status,
                    self.operation.as_str(),
                    report.files,
                    report.managed_keys
                )?,
                Err(err) => {
                    writeln!(out, "{}: {}", result.name, result.status)?;
                    writeln!(out, "  error [{}]: {}", err.kind(), err)?;
                }
            }
        }
        Ok(())
    }
}

/// Runs `operation` for every installer concurrently and collects results.
pub fn execute_all(
    installers: &[Arc<dyn ToolInstaller>],
    operation: Operation,
    request: &InstallRequest,
    cancel: &CancelToken,
) -> ExecutionSummary {
    tracing::info!(
        target: "brain::executor",
        operation = operation.as_str(),
        tools = installers.len(),
        "Starting workers"
    );

    let results = thread::scope(|scope| {
        let workers: Vec<_> = installers
            .iter()
            .map(|installer| {
                let name = installer.name().to_string();
                let handle = scope.spawn(move || {
                    let mut log = LogBuffer::new();
                    let outcome = match operation {
                        Operation::Install => installer.install(request, &mut log, cancel),
                        Operation::Uninstall => installer.uninstall(request, &mut log, cancel),
                    };
                    (outcome, log)
                });
                (name, handle)
            })
            .collect();

        workers
            .into_iter()
            .map(|(name, handle)| {
                let (outcome, log) = handle.join().unwrap_or_else(|_| {
                    tracing::error!(target: "brain::executor", tool = %name, "Worker panicked");
                    (Err(InstallError::Panicked(name.clone())), LogBuffer::new())
                });
                (name.clone(), ToolResult::new(name, outcome, log))
            })
            .collect::<BTreeMap<_, _>>()
    });

    ExecutionSummary { operation, results }
}
