//! Request dispatcher.
//!
//! Validates requests before anything is spawned, drives the runner and the
//! parser, and shapes the response as summary text plus the structured
//! result. Expected process failures come back in-band as `success=false`
//! results; only validation errors and unexpected I/O faults are returned
//! as `Err`.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::analysis::summary::{render_analysis_summary, render_format_status};
use crate::analysis::{
    AnalysisResult, FormatResult, ParseContext, parse_analysis_output, parse_format_output,
};
use crate::config::{BslConfig, validate_config_path};
use crate::error::{BslError, BslResult};
use crate::runner::{BslRunner, ProcessRunner, SystemRunner};
use crate::util::sources::{count_source_files, is_source_file};

/// Entries in the summary's top-issues list.
pub const TOP_ISSUES: usize = 5;

/// Input of `bsl_analyze`.
#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    /// File or directory to analyze.
    pub source_path: PathBuf,
    pub config_path: Option<PathBuf>,
    /// Heap in MB; must be positive. Falls back to the configured default.
    pub memory_limit_mb: Option<i64>,
}

/// Input of `bsl_format`.
#[derive(Debug, Clone, Default)]
pub struct FormatRequest {
    pub source_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AnalysisResponse {
    /// Markdown for the caller.
    pub summary: String,
    pub result: AnalysisResult,
}

#[derive(Debug, Clone)]
pub struct FormatResponse {
    pub status: String,
    pub result: FormatResult,
}

/// A validated source path.
#[derive(Debug)]
struct SourceTarget {
    /// Absolute form of the requested path.
    path: PathBuf,
    is_file: bool,
    files: usize,
}

impl SourceTarget {
    /// Directory the analyzer scans.
    fn scan_dir(&self) -> &Path {
        if self.is_file {
            self.path.parent().unwrap_or(&self.path)
        } else {
            &self.path
        }
    }
}

/// The two bridge operations over a [`BslRunner`].
#[derive(Debug)]
pub struct BslService<R = SystemRunner> {
    runner: BslRunner<R>,
}

impl BslService<SystemRunner> {
    pub fn new(config: BslConfig) -> Self {
        Self::with_runner(BslRunner::new(config))
    }
}

impl<R: ProcessRunner> BslService<R> {
    pub const fn with_runner(runner: BslRunner<R>) -> Self {
        Self { runner }
    }

    pub const fn runner(&self) -> &BslRunner<R> {
        &self.runner
    }

    pub const fn config(&self) -> &BslConfig {
        self.runner.config()
    }

    /// Analyze a file or directory.
    ///
    /// # Errors
    ///
    /// Validation failures (missing path, no sources, unsupported file, bad
    /// configuration path, non-positive memory) before any process starts,
    /// and I/O faults that prevent a run from being set up at all.
    pub fn analyze(&self, request: &AnalysisRequest) -> BslResult<AnalysisResponse> {
        info!(
            source = %request.source_path.display(),
            config = ?request.config_path,
            memory_mb = ?request.memory_limit_mb,
            "analyze request"
        );

        let target = validate_source(&request.source_path)?;
        let memory_mb = resolve_memory(request.memory_limit_mb, self.config().default_memory_mb)?;
        let analyzer_config = request
            .config_path
            .as_deref()
            .map(validate_config_path)
            .transpose()?;

        let ctx = ParseContext {
            source: &target.path,
            timeout: self.runner.analyze_timeout(),
            files_processed: target.files,
            only_file: target.is_file.then_some(target.path.as_path()),
        };

        let result = match self
            .runner
            .run_analysis(target.scan_dir(), analyzer_config.as_deref(), memory_mb)
        {
            Ok(outcome) => parse_analysis_output(&outcome, &ctx),
            Err(e) => AnalysisResult::failure(target.files, &in_band(e)?),
        };

        info!(
            success = result.success,
            diagnostics = result.diagnostics.len(),
            "analyze finished"
        );
        Ok(AnalysisResponse {
            summary: render_analysis_summary(&result, TOP_ISSUES),
            result,
        })
    }

    /// Format a file or directory in place.
    ///
    /// # Errors
    ///
    /// Same validation as [`Self::analyze`] for the source path, and I/O
    /// faults that prevent a run from being set up.
    pub fn format(&self, request: &FormatRequest) -> BslResult<FormatResponse> {
        info!(source = %request.source_path.display(), "format request");

        let target = validate_source(&request.source_path)?;
        let ctx = ParseContext {
            source: &target.path,
            timeout: self.runner.format_timeout(),
            files_processed: target.files,
            only_file: None,
        };

        let result = match self.runner.run_format(&target.path) {
            Ok(outcome) => parse_format_output(&outcome, &ctx),
            Err(e) => FormatResult::failure(target.files, &in_band(e)?),
        };

        info!(success = result.success, "format finished");
        Ok(FormatResponse {
            status: render_format_status(&result),
            result,
        })
    }
}

/// Keep expected run failures for an in-band result; pass faults through.
fn in_band(error: BslError) -> BslResult<BslError> {
    match error {
        BslError::Io { .. } | BslError::Json(_) => Err(error),
        other => {
            warn!(error = %other, "run failed");
            Ok(other)
        }
    }
}

fn validate_source(path: &Path) -> BslResult<SourceTarget> {
    if path.as_os_str().is_empty() || !path.exists() {
        return Err(BslError::PathNotFound {
            path: path.to_path_buf(),
        });
    }
    let absolute = std::path::absolute(path).map_err(|source| BslError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if absolute.is_dir() {
        let files = count_source_files(&absolute)?;
        if files == 0 {
            return Err(BslError::NoSourceFiles { path: absolute });
        }
        return Ok(SourceTarget {
            path: absolute,
            is_file: false,
            files,
        });
    }

    if !is_source_file(&absolute) {
        return Err(BslError::UnsupportedFile { path: absolute });
    }
    Ok(SourceTarget {
        path: absolute,
        is_file: true,
        files: 1,
    })
}

fn resolve_memory(requested: Option<i64>, default_mb: u32) -> BslResult<u32> {
    let Some(value) = requested else {
        return Ok(default_mb);
    };
    if value <= 0 {
        return Err(BslError::InvalidMemoryLimit {
            value,
            reason: "must be a positive integer".to_owned(),
        });
    }
    u32::try_from(value).map_err(|_| BslError::InvalidMemoryLimit {
        value,
        reason: "too large".to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_defaults_and_bounds() {
        assert_eq!(resolve_memory(None, 4096).expect("default"), 4096);
        assert_eq!(resolve_memory(Some(1), 4096).expect("small"), 1);
        assert!(matches!(
            resolve_memory(Some(0), 4096),
            Err(BslError::InvalidMemoryLimit { value: 0, .. })
        ));
        assert!(resolve_memory(Some(-5), 4096).is_err());
        assert!(resolve_memory(Some(i64::MAX), 4096).is_err());
    }

    #[test]
    fn source_validation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();

        let missing = validate_source(&root.join("nope")).expect_err("missing");
        assert!(matches!(missing, BslError::PathNotFound { .. }));

        let empty = validate_source(root).expect_err("empty");
        assert!(matches!(empty, BslError::NoSourceFiles { .. }));

        let txt = root.join("readme.txt");
        std::fs::write(&txt, "").expect("write");
        assert!(matches!(
            validate_source(&txt),
            Err(BslError::UnsupportedFile { .. })
        ));

        let module = root.join("Module.bsl");
        std::fs::write(&module, "").expect("write");
        let file = validate_source(&module).expect("file");
        assert!(file.is_file);
        assert_eq!(file.files, 1);
        assert_eq!(file.scan_dir(), root);

        let tree = validate_source(root).expect("dir");
        assert!(!tree.is_file);
        assert_eq!(tree.files, 1);
        assert_eq!(tree.scan_dir(), root);
    }

    #[test]
    fn io_faults_are_not_in_band() {
        let io = BslError::Io {
            path: PathBuf::from("/x"),
            source: std::io::Error::other("disk gone"),
        };
        assert!(in_band(io).is_err());
        let timeout = BslError::ProcessTimeout {
            operation: "analysis",
            path: PathBuf::from("/x"),
            timeout_secs: 1,
        };
        assert!(in_band(timeout).is_ok());
    }
}
