//! Error types for CLI input files and scripts.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading user input.
#[derive(Debug, Error)]
pub enum CliError {
    /// Failed to read a file from disk.
    #[error("failed to read {path}: {source}")]
    ReadFile {
        /// Path that could not be read
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// TOML syntax or schema error.
    #[error("invalid engine file: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// A note script entry could not be parsed.
    #[error("invalid note '{entry}': {reason}")]
    InvalidScript {
        /// The offending entry
        entry: String,
        /// What is wrong with it
        reason: String,
    },

    /// A breakpoint list could not be parsed.
    #[error("invalid point '{entry}': expected x:y")]
    InvalidPoint {
        /// The offending entry
        entry: String,
    },

    /// A modulation route could not be parsed.
    #[error("invalid route '{entry}': {reason}")]
    InvalidRoute {
        /// The offending entry
        entry: String,
        /// What is wrong with it
        reason: String,
    },
}
