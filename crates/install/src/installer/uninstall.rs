//! Uninstall pipeline: detect, remove-files, unmerge-shared, delete-manifest.

use super::install::{prior_placement, prior_root};
use super::{into_install_error, recovery, ConfiguredInstaller, InstallRequest, ToolInstaller};
use crate::error::InstallError;
use crate::pipeline::{CancelToken, Pipeline, Step};
use crate::placement::{strategy_for, unmerge_shared};
use crate::report::{InstallReport, LogBuffer};
use crate::snapshot::Snapshot;
use brain_state::Manifest;
use std::path::{Path, PathBuf};

type UninstallStep<'a> = Step<'a, UninstallRun, InstallError>;

#[derive(Debug)]
struct UninstallRun {
    log: LogBuffer,
    scope: String,
    root: PathBuf,
    manifest: Manifest,
    files_snapshot: Snapshot,
    docs_snapshot: Snapshot,
    manifest_backup: Option<Vec<u8>>,
}

pub(super) fn run(
    installer: &ConfiguredInstaller,
    request: &InstallRequest,
    log: &mut LogBuffer,
    cancel: &CancelToken,
) -> Result<InstallReport, InstallError> {
    let tool = &installer.tool;
    let (scope, root) = installer.resolve_scope(request.scope.as_deref())?;
    let mut run = UninstallRun {
        log: LogBuffer::new(),
        // Replaced by the recorded or recovered manifest in `detect`.
        manifest: Manifest::new(&tool.name, &scope, tool.manifest.kind),
        scope,
        root,
        files_snapshot: Snapshot::default(),
        docs_snapshot: Snapshot::default(),
        manifest_backup: None,
    };
    run.log.line(format!("{}: uninstalling", tool.display_name));

    let pipeline = Pipeline::new()
        .step(UninstallStep::new("detect", |run: &mut UninstallRun| {
            let manifest = match installer.store.read(&tool.name)? {
                Some(manifest) => manifest,
                None if installer.is_tool_installed() && installer.is_brain_installed() => {
                    run.log.line("  brand detected without a manifest; recovering");
                    recovery::recover(installer, request.source.as_ref(), &run.scope, &run.root)?
                }
                None => {
                    return Err(InstallError::PreconditionFailed(format!(
                        "{} has no brain install to remove",
                        tool.display_name
                    )))
                }
            };
            run.root = prior_root(installer, &manifest, &run.root);
            run.scope = manifest.scope.clone();
            run.manifest = manifest;
            Ok(())
        }))
        .step(
            UninstallStep::new("remove-files", |run: &mut UninstallRun| {
                run.files_snapshot = Snapshot::capture(owned_paths(&run.manifest))
                    .map_err(InstallError::snapshot("snapshot installed files"))?;
                let strategy = strategy_for(prior_placement(&run.manifest));
                if let Err(e) = strategy.remove_files(&run.manifest, &run.root) {
                    if let Err(restore) = run.files_snapshot.restore() {
                        tracing::warn!(target: "brain::install", error = %restore, "Failed to restore after remove-files error");
                    }
                    return Err(e.into());
                }
                run.log.line(format!("  removed {} files", run.manifest.files.len()));
                Ok(())
            })
            .undo(|run: &mut UninstallRun| {
                run.files_snapshot
                    .restore()
                    .map_err(InstallError::snapshot("restore removed files"))
            }),
        )
        .step(
            UninstallStep::new("unmerge-shared", |run: &mut UninstallRun| {
                run.docs_snapshot = Snapshot::capture(run.manifest.shared_documents())
                    .map_err(InstallError::snapshot("snapshot shared documents"))?;
                let manifest = &run.manifest;
                if let Err(e) = unmerge_shared(&manifest.managed_keys, &manifest.created_parents) {
                    if let Err(restore) = run.docs_snapshot.restore() {
                        tracing::warn!(target: "brain::install", error = %restore, "Failed to restore after unmerge-shared error");
                    }
                    return Err(e.into());
                }
                run.log.line(format!(
                    "  removed {} managed keys",
                    run.manifest.managed_keys.len()
                ));
                Ok(())
            })
            .when(|run: &UninstallRun| !run.manifest.managed_keys.is_empty())
            .undo(|run: &mut UninstallRun| {
                run.docs_snapshot
                    .restore()
                    .map_err(InstallError::snapshot("restore shared documents"))
            }),
        )
        .step(
            UninstallStep::new("delete-manifest", |run: &mut UninstallRun| {
                run.manifest_backup = installer.store.read_bytes(&tool.name)?;
                installer.store.delete(&tool.name)?;
                Ok(())
            })
            .undo(|run: &mut UninstallRun| {
                installer
                    .store
                    .restore_bytes(&tool.name, run.manifest_backup.as_deref())
                    .map_err(InstallError::from)
            }),
        );

    let outcome = pipeline.execute(&mut run, cancel);
    log.append(&run.log);
    match outcome {
        Ok(report) => {
            tracing::info!(
                target: "brain::install",
                tool = %tool.name,
                files = run.manifest.files.len(),
                managed_keys = run.manifest.managed_keys.len(),
                "Uninstalled"
            );
            Ok(InstallReport {
                tool: installer.name().to_string(),
                files: run.manifest.files.len(),
                managed_keys: run.manifest.managed_keys.len(),
                scope: run.scope,
                root: run.root,
                steps: report.records,
            })
        }
        Err(failure) => Err(into_install_error(failure, || {
            run.manifest
                .files
                .iter()
                .map(PathBuf::as_path)
                .chain(run.manifest.shared_documents())
                .filter(|p| p.exists())
                .map(Path::to_path_buf)
                .collect()
        })),
    }
}

/// Files and subtree an install owns outright.
fn owned_paths(manifest: &Manifest) -> Vec<PathBuf> {
    manifest
        .managed_subtree
        .iter()
        .chain(&manifest.files)
        .cloned()
        .collect()
}
