//! Wires configuration, manifests and templates into the installer and maps
//! outcomes to exit codes.

use crate::cli::{Cli, Commands, OutputFormat};
use anyhow::{Context, Result};
use brain_config::{load_config, BrainConfig, ConfigError};
use brain_install::{
    execute_all, CancelToken, InstallRequest, Operation, Registry, RegistryError, ToolListing,
};
use brain_source::TemplateSource;
use brain_state::ManifestStore;
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const EXIT_CONFIG_INVALID: u8 = 2;

/// The main entry point for the `brain` binary.
pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = match cli.config {
        Some(path) => path,
        None => brain_config::config_path()?,
    };
    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(err) => return Ok(config_failure(&err)),
    };

    let store = match cli.state_dir {
        Some(dir) => ManifestStore::new(dir),
        None => ManifestStore::from_env()?,
    };
    tracing::debug!(
        target: "brain::cli",
        config = %config_path.display(),
        state = %store.dir().display(),
        tools = config.tools.len(),
        "Starting"
    );
    let registry = Registry::from_config(&config, &store);

    match cli.command {
        Commands::List { tools, format } => match registry.list(&tools) {
            Ok(rows) => {
                print_listing(&rows, format)?;
                Ok(ExitCode::SUCCESS)
            }
            Err(err) => Ok(selection_failure(&err)),
        },
        Commands::Install { tools, scope } => {
            let source = open_source(cli.source, &config)?;
            execute(&registry, &tools, Operation::Install, InstallRequest { source, scope })
        }
        Commands::Uninstall { tools } => {
            // Only needed to reconstruct a lost manifest; a broken source
            // must not block removal.
            let source = open_source(cli.source, &config).unwrap_or_else(|err| {
                tracing::warn!(target: "brain::cli", error = %err, "Ignoring template source");
                None
            });
            execute(
                &registry,
                &tools,
                Operation::Uninstall,
                InstallRequest {
                    source,
                    scope: None,
                },
            )
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn config_failure(err: &ConfigError) -> ExitCode {
    eprintln!("{err}");
    ExitCode::from(EXIT_CONFIG_INVALID)
}

fn selection_failure(err: &RegistryError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(EXIT_CONFIG_INVALID)
}

/// `--source` (or `BRAIN_SOURCE_DIR`) wins over the configured `source`.
fn open_source(flag: Option<PathBuf>, config: &BrainConfig) -> Result<Option<TemplateSource>> {
    let Some(dir) = flag.or_else(|| config.source.clone()) else {
        return Ok(None);
    };
    let source = TemplateSource::open(&dir)
        .with_context(|| format!("cannot open template source {}", dir.display()))?;
    Ok(Some(source))
}

fn execute(
    registry: &Registry,
    tools: &[String],
    operation: Operation,
    request: InstallRequest,
) -> Result<ExitCode> {
    let installers = match registry.select(tools) {
        Ok(installers) => installers,
        Err(err) => return Ok(selection_failure(&err)),
    };

    let cancel = CancelToken::new();
    let handler = cancel.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        eprintln!("\nInterrupted; finishing current steps and rolling back...");
        handler.cancel();
    }) {
        tracing::warn!(target: "brain::cli", error = %err, "Cannot install Ctrl-C handler");
    }

    let summary = execute_all(&installers, operation, &request, &cancel);
    let mut out = io::stdout().lock();
    summary.print(&mut out).context("failed to write results")?;
    out.flush()?;

    let code = summary.exit_code();
    tracing::info!(
        target: "brain::cli",
        operation = operation.as_str(),
        tools = summary.results.len(),
        code,
        "Finished"
    );
    Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
}

fn print_listing(rows: &[ToolListing], format: OutputFormat) -> Result<()> {
    let mut out = io::stdout().lock();
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut out, rows)?;
            writeln!(out)?;
        }
        OutputFormat::Text => {
            let width = rows.iter().map(|r| r.name.len()).max().unwrap_or(0);
            for row in rows {
                writeln!(
                    out,
                    "{:<width$}  {:<12}  tool: {:<3}  brand: {}",
                    row.name,
                    row.display_name,
                    yes_no(row.tool_present),
                    yes_no(row.brand_installed),
                )?;
            }
        }
    }
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
