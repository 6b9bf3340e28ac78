//! Configuration errors.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A single configuration problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Tool the problem belongs to, or `None` for document-level problems.
    pub tool: Option<String>,
    /// Dotted field path relative to the tool record (or the document root).
    pub field: String,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tool {
            Some(tool) => write!(f, "tools.{tool}.{}: {}", self.field, self.message),
            None => write!(f, "{}: {}", self.field, self.message),
        }
    }
}

/// Every violation found in one configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigReport {
    pub origin: PathBuf,
    pub violations: Vec<Violation>,
}

impl ConfigReport {
    pub fn new(origin: PathBuf) -> Self {
        Self {
            origin,
            violations: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub(crate) fn push(&mut self, tool: Option<&str>, field: &str, message: impl Into<String>) {
        self.violations.push(Violation {
            tool: tool.map(str::to_string),
            field: field.to_string(),
            message: message.into(),
        });
    }

    /// Returns violations attached to `tool`.
    pub fn for_tool<'a>(&'a self, tool: &'a str) -> impl Iterator<Item = &'a Violation> + 'a {
        self.violations
            .iter()
            .filter(move |v| v.tool.as_deref() == Some(tool))
    }
}

impl fmt::Display for ConfigReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} problem(s) in {}",
            self.violations.len(),
            self.origin.display()
        )?;
        for v in &self.violations {
            write!(f, "\n  - {v}")?;
        }
        Ok(())
    }
}

/// Errors produced while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config {path} is not valid YAML: {source}")]
    Syntax {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(ConfigReport),
}

impl ConfigError {
    /// The aggregated report, when the document parsed but failed validation.
    pub fn report(&self) -> Option<&ConfigReport> {
        match self {
            Self::Invalid(report) => Some(report),
            _ => None,
        }
    }
}
