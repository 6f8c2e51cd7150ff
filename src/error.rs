//! Error types for the bsl-mcp crate.

use std::path::PathBuf;

/// Bridge-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum BslError {
    /// Source path does not exist.
    #[error("source path does not exist: {path}")]
    PathNotFound { path: PathBuf },

    /// Directory holds no `.bsl` / `.os` files.
    #[error("directory contains no BSL/OS files: {path}")]
    NoSourceFiles { path: PathBuf },

    /// A single file was given but it is not a BSL/OS source.
    #[error("file is not a BSL/OS source file: {path}")]
    UnsupportedFile { path: PathBuf },

    /// Analyzer configuration file missing or not JSON.
    #[error("configuration file not usable: {path}: {reason}")]
    ConfigNotFound { path: PathBuf, reason: String },

    /// Startup configuration rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Heap size outside the accepted range.
    #[error("invalid memory limit: {value} MB ({reason})")]
    InvalidMemoryLimit { value: i64, reason: String },

    /// Java launcher or the analyzer jar is missing or unusable.
    #[error("external tool not available: {tool}: {reason}")]
    ToolNotFound { tool: String, reason: String },

    /// Wall-clock bound exceeded; the child was killed.
    #[error("{operation} of {path} timed out after {timeout_secs}s")]
    ProcessTimeout {
        operation: &'static str,
        path: PathBuf,
        timeout_secs: u64,
    },

    /// Analyzer output was not the expected JSON.
    #[error("could not parse analyzer output: {reason}")]
    OutputParse { reason: String },

    /// Non-zero exit without usable output.
    #[error("{operation} of {path} failed with exit code {code}: {stderr}")]
    Execution {
        operation: &'static str,
        path: PathBuf,
        code: i32,
        stderr: String,
    },

    /// I/O error with context.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BslError {
    /// Whether the error was raised while checking caller input, before any
    /// process was started.
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::PathNotFound { .. }
                | Self::NoSourceFiles { .. }
                | Self::UnsupportedFile { .. }
                | Self::ConfigNotFound { .. }
                | Self::InvalidMemoryLimit { .. }
        )
    }
}

/// Convenience result type for bsl-mcp operations.
pub type BslResult<T> = Result<T, BslError>;
