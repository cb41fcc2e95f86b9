//! Error types for the HYPR Dockerfile linter.
//!
//! Errors are `thiserror` enums that keep the underlying source error.
//! Shell parse errors never show up here: rules swallow them (see `shell::ShellParseError`).

use std::path::PathBuf;
use thiserror::Error;

use crate::dockerfile::ParseError;

/// Result type alias for linter operations.
pub type Result<T> = std::result::Result<T, LintError>;

/// Main error type for the linter.
#[derive(Error, Debug)]
pub enum LintError {
    // Input errors
    #[error("Invalid Dockerfile: {0}")]
    Dockerfile(#[from] ParseError),

    #[error("Invalid Dockerfile at {path:?}: {source}")]
    DockerfileAt {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("File read error: {path:?}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Configuration errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Invalid configuration at {path:?}: {reason}")]
    InvalidConfigFile { path: PathBuf, reason: String },

    #[error("Unknown severity: {value}")]
    UnknownSeverity { value: String },

    #[error("Unknown label type '{value}' for label '{label}'")]
    UnknownLabelType { label: String, value: String },
}

impl LintError {
    /// Attaches the file path to a Dockerfile parse error.
    pub fn at_path(path: impl Into<PathBuf>, err: ParseError) -> Self {
        Self::DockerfileAt { path: path.into(), source: err }
    }
}
