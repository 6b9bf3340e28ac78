//! Install pipeline: detect, clean-prior, place, merge-shared, write-manifest.

use super::{into_install_error, recovery, ConfiguredInstaller, InstallRequest, ToolInstaller};
use crate::error::InstallError;
use crate::pipeline::{CancelToken, Pipeline, Step};
use crate::placement::{self, strategy_for, PlacedRecord, SharedKeys};
use crate::report::{InstallReport, LogBuffer};
use crate::snapshot::Snapshot;
use brain_config::Placement;
use brain_state::Manifest;
use brain_transform::{transform_all, TransformContext, TransformOutput};
use std::path::{Path, PathBuf};

type InstallStep<'a> = Step<'a, InstallRun, InstallError>;

/// State threaded through one install run.
#[derive(Debug, Default)]
struct InstallRun {
    log: LogBuffer,
    scope: String,
    root: PathBuf,
    /// Manifest read from the store.
    recorded: Option<Manifest>,
    /// Recorded manifest, or one recovered from detection.
    prior: Option<Manifest>,
    output: TransformOutput,
    placed: PlacedRecord,
    shared: SharedKeys,
    clean_snapshot: Snapshot,
    place_snapshot: Snapshot,
    merge_snapshot: Snapshot,
    manifest_backup: Option<Vec<u8>>,
    manifest: Option<Manifest>,
}

pub(super) fn run(
    installer: &ConfiguredInstaller,
    request: &InstallRequest,
    log: &mut LogBuffer,
    cancel: &CancelToken,
) -> Result<InstallReport, InstallError> {
    let tool = &installer.tool;
    let (scope, root) = installer.resolve_scope(request.scope.as_deref())?;
    let source = request.source.as_ref().ok_or_else(|| {
        InstallError::PreconditionFailed("no template source configured".to_string())
    })?;
    let strategy = strategy_for(tool.placement);

    let mut run = InstallRun {
        scope,
        root,
        ..Default::default()
    };
    run.log.line(format!(
        "{}: installing into {} (scope {})",
        tool.display_name,
        run.root.display(),
        run.scope
    ));

    let pipeline = Pipeline::new()
        .step(InstallStep::new("detect", |run: &mut InstallRun| {
            installer.require_tool()?;
            run.recorded = installer.store.read(&tool.name)?;
            run.prior = match &run.recorded {
                Some(manifest) => {
                    run.log.line(format!(
                        "  found previous install ({} files)",
                        manifest.files.len()
                    ));
                    Some(manifest.clone())
                }
                None if installer.is_brain_installed() => {
                    run.log.line("  brand detected without a manifest; recovering");
                    Some(recovery::recover(installer, Some(source), &run.scope, &run.root)?)
                }
                None => None,
            };
            Ok(())
        }))
        .step(
            InstallStep::new("clean-prior", |run: &mut InstallRun| {
                let Some(prior) = &run.prior else {
                    return Ok(());
                };
                let prior_root = prior_root(installer, prior, &run.root);
                run.clean_snapshot = Snapshot::capture(prior_footprint(prior, &prior_root))
                    .map_err(InstallError::snapshot("snapshot previous install"))?;
                let prior_strategy = strategy_for(prior_placement(prior));
                if let Err(e) = prior_strategy.clean(prior, &prior_root) {
                    restore_quietly(&run.clean_snapshot, "clean-prior");
                    return Err(e.into());
                }
                run.log.line("  removed previous install");
                Ok(())
            })
            .when(|run: &InstallRun| run.prior.is_some())
            .undo(|run: &mut InstallRun| {
                run.clean_snapshot
                    .restore()
                    .map_err(InstallError::snapshot("restore previous install"))
            }),
        )
        .step(
            InstallStep::new("place", |run: &mut InstallRun| {
                let ctx = TransformContext::new(tool, &installer.brand, &run.root);
                let output = transform_all(source, &ctx)?;
                run.place_snapshot = Snapshot::capture(strategy.footprint(&output, &run.root))
                    .map_err(InstallError::snapshot("snapshot placement targets"))?;
                match strategy.place(&output, &run.root) {
                    Ok(placed) => {
                        run.log.line(format!("  placed {} files", placed.files.len()));
                        run.placed = placed;
                        run.output = output;
                        Ok(())
                    }
                    Err(e) => {
                        restore_quietly(&run.place_snapshot, "place");
                        Err(e.into())
                    }
                }
            })
            .undo(|run: &mut InstallRun| {
                run.place_snapshot
                    .restore()
                    .map_err(InstallError::snapshot("remove placed files"))
            }),
        )
        .step(
            InstallStep::new("merge-shared", |run: &mut InstallRun| {
                let targets = placement::merge_targets(&run.output, &run.root);
                run.merge_snapshot = Snapshot::capture(&targets)
                    .map_err(InstallError::snapshot("snapshot shared documents"))?;
                match placement::merge_shared(&run.output, &run.root) {
                    Ok(shared) => {
                        run.log.line(format!(
                            "  merged {} managed keys into {} shared documents",
                            shared.keys.len(),
                            targets.len()
                        ));
                        run.shared = shared;
                        Ok(())
                    }
                    Err(e) => {
                        restore_quietly(&run.merge_snapshot, "merge-shared");
                        Err(e.into())
                    }
                }
            })
            .when(|run: &InstallRun| !placement::merge_targets(&run.output, &run.root).is_empty())
            .undo(|run: &mut InstallRun| {
                run.merge_snapshot
                    .restore()
                    .map_err(InstallError::snapshot("restore shared documents"))
            }),
        )
        .step(
            InstallStep::new("write-manifest", |run: &mut InstallRun| {
                let mut manifest = Manifest::new(&tool.name, &run.scope, tool.manifest.kind);
                manifest.files = run.placed.files.clone();
                manifest.managed_keys = run.shared.keys.clone();
                manifest.created_parents = run.shared.created_parents.clone();
                manifest.managed_subtree = run.placed.managed_subtree.clone();
                manifest.normalize();
                if let Some(recorded) = &run.recorded {
                    if manifest.same_install(recorded) {
                        manifest.installed_at = recorded.installed_at;
                    }
                }

                run.manifest_backup = installer.store.read_bytes(&tool.name)?;
                let path = installer.store.write(&manifest)?;
                run.log.line(format!("  recorded manifest {}", path.display()));
                run.manifest = Some(manifest);
                Ok(())
            })
            .undo(|run: &mut InstallRun| {
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
            let (files, managed_keys) = run
                .manifest
                .as_ref()
                .map_or((0, 0), |m| (m.files.len(), m.managed_keys.len()));
            tracing::info!(
                target: "brain::install",
                tool = %tool.name,
                scope = %run.scope,
                files,
                managed_keys,
                "Installed"
            );
            Ok(InstallReport {
                tool: installer.name().to_string(),
                scope: run.scope,
                root: run.root,
                files,
                managed_keys,
                steps: report.records,
            })
        }
        Err(failure) => {
            tracing::warn!(
                target: "brain::install",
                tool = %tool.name,
                step = %failure.step,
                undone = failure.rollback.undone.len(),
                "Install failed and was rolled back"
            );
            Err(into_install_error(failure, || remnants(&run)))
        }
    }
}

/// Scope root the prior install was made under.
pub(super) fn prior_root(installer: &ConfiguredInstaller, prior: &Manifest, fallback: &Path) -> PathBuf {
    prior
        .managed_subtree
        .clone()
        .or_else(|| installer.tool.scope_root(Some(&prior.scope)).map(Path::to_path_buf))
        .unwrap_or_else(|| fallback.to_path_buf())
}

/// The placement a manifest was written with, independent of current config.
pub(super) fn prior_placement(manifest: &Manifest) -> Placement {
    if manifest.managed_subtree.is_some() {
        Placement::Direct
    } else {
        Placement::CopyAndMerge
    }
}

/// Every path a manifest's removal may change.
pub(super) fn prior_footprint(manifest: &Manifest, root: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = Vec::new();
    if let Some(subtree) = &manifest.managed_subtree {
        paths.push(subtree.clone());
    }
    let subtree = manifest.managed_subtree.as_deref().unwrap_or(root);
    paths.extend(
        manifest
            .files
            .iter()
            .filter(|f| manifest.managed_subtree.is_none() || !f.starts_with(subtree))
            .cloned(),
    );
    paths.extend(manifest.shared_documents().into_iter().map(Path::to_path_buf));
    paths
}

fn restore_quietly(snapshot: &Snapshot, step: &str) {
    if let Err(e) = snapshot.restore() {
        tracing::warn!(target: "brain::install", step, error = %e, "Failed to restore after step error");
    }
}

/// Paths that may still carry partial install state.
fn remnants(run: &InstallRun) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = run
        .output
        .writes()
        .map(|f| run.root.join(&f.path))
        .chain(placement::merge_targets(&run.output, &run.root))
        .filter(|p| p.exists())
        .collect();
    paths.sort();
    paths.dedup();
    paths
}
