//! Analysis and formatting results.
//!
//! Values here are built once per call by [`parse`] from a finished
//! process run and handed to the caller as structured tool output.

pub mod parse;
pub mod summary;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::BslError;

pub use parse::{ParseContext, parse_analysis_output, parse_format_output};

/// Diagnostic severity, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub const ALL: [Self; 3] = [Self::Error, Self::Warning, Self::Info];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
            Self::Info => "INFO",
        }
    }

    /// Map an LSP severity name (`Error`, `Warning`, `Information`, `Hint`)
    /// or short form. Unknown names count as informational.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "error" => Self::Error,
            "warning" | "warn" => Self::Warning,
            _ => Self::Info,
        }
    }

    /// Map an LSP numeric severity: 1 error, 2 warning, 3 information, 4 hint.
    pub const fn from_lsp_code(code: i64) -> Self {
        match code {
            1 => Self::Error,
            2 => Self::Warning,
            _ => Self::Info,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One issue reported by the analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub file_path: String,
    /// 1-based.
    pub line: u32,
    /// 1-based; 0 when the analyzer gave no column.
    pub column: u32,
    pub severity: Severity,
    pub code: String,
    pub message: String,
}

/// Per-severity totals, always carrying all three keys.
pub type SeverityCounts = BTreeMap<Severity, usize>;

/// Count `diagnostics` by severity.
pub fn count_by_severity(diagnostics: &[Diagnostic]) -> SeverityCounts {
    let mut counts: SeverityCounts = Severity::ALL.iter().map(|s| (*s, 0)).collect();
    for diag in diagnostics {
        *counts.entry(diag.severity).or_default() += 1;
    }
    counts
}

/// Outcome of one `bsl_analyze` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub success: bool,
    pub files_processed: usize,
    pub diagnostics: Vec<Diagnostic>,
    pub counts_by_severity: SeverityCounts,
    /// Report records dropped because required fields were missing.
    pub skipped_records: usize,
    pub timed_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Undecodable analyzer output, kept for diagnosis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl AnalysisResult {
    /// A failed run that produced nothing to parse.
    pub fn failure(files_processed: usize, error: &BslError) -> Self {
        Self {
            success: false,
            files_processed,
            diagnostics: Vec::new(),
            counts_by_severity: count_by_severity(&[]),
            skipped_records: 0,
            timed_out: matches!(error, BslError::ProcessTimeout { .. }),
            error: Some(error.to_string()),
            raw_output: None,
            stderr: None,
        }
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.counts_by_severity.get(&severity).copied().unwrap_or(0)
    }
}

/// Outcome of one `bsl_format` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatResult {
    pub success: bool,
    pub files_processed: usize,
    pub raw_output: String,
    pub timed_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl FormatResult {
    pub fn failure(files_processed: usize, error: &BslError) -> Self {
        Self {
            success: false,
            files_processed,
            raw_output: String::new(),
            timed_out: matches!(error, BslError::ProcessTimeout { .. }),
            error: Some(error.to_string()),
            stderr: None,
        }
    }
}
