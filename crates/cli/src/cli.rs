use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for `brain list`.
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Command-line interface for the `brain` installer.
#[derive(Debug, Parser)]
#[command(
    name = "brain",
    version,
    about = "Install brand agents, skills, rules, hooks and MCP servers into AI coding tools"
)]
pub struct Cli {
    /// Configuration document (default `~/.brain/config.yaml`).
    #[arg(long, global = true, env = "BRAIN_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Canonical template tree (overrides `source` in the configuration).
    #[arg(long, global = true, env = "BRAIN_SOURCE_DIR", value_name = "DIR")]
    pub source: Option<PathBuf>,
    /// Directory holding install manifests.
    #[arg(long, global = true, env = "BRAIN_STATE_DIR", value_name = "DIR")]
    pub state_dir: Option<PathBuf>,
    /// Logs debug output to stderr (`RUST_LOG` takes precedence).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Installs the brand into the selected tools (all enabled tools by default).
    Install {
        /// Tool names; empty selects every enabled tool.
        tools: Vec<String>,
        /// Scope to install into instead of each tool's default.
        #[arg(long, value_name = "SCOPE")]
        scope: Option<String>,
    },
    /// Removes a previous install from the selected tools.
    Uninstall {
        /// Tool names; empty selects every enabled tool.
        tools: Vec<String>,
    },
    /// Shows whether each tool and the brand are present.
    List {
        /// Tool names; empty selects every enabled tool.
        tools: Vec<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}
