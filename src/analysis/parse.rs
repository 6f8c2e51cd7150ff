//! Analyzer output decoding.
//!
//! Never fails: undecodable output becomes a failed result that carries the
//! raw text. Individual report records missing required fields are skipped
//! and counted instead of discarding the whole report.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{AnalysisResult, Diagnostic, FormatResult, Severity, count_by_severity};
use crate::error::{BslError, BslResult};
use crate::runner::ProcessOutcome;
use crate::runner::filter::{STDERR_EXCERPT_CHARS, excerpt, has_error_marker, significant_stderr};

/// Characters of undecodable output kept in a result.
pub const RAW_OUTPUT_CHARS: usize = 20_000;

/// Positions tried when looking for JSON embedded in log text.
const MAX_JSON_CANDIDATES: usize = 64;

/// What a run was asked to do, for result bookkeeping and error text.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    pub source: &'a Path,
    pub timeout: Duration,
    pub files_processed: usize,
    /// Keep only diagnostics reported for this file.
    pub only_file: Option<&'a Path>,
}

// Reporter schema. Unknown fields are ignored by serde.

#[derive(Debug, Deserialize)]
struct RawFileInfo {
    path: String,
    #[serde(default)]
    diagnostics: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawDiagnostic {
    range: RawRange,
    #[serde(default)]
    severity: Option<RawSeverity>,
    #[serde(default)]
    code: Option<RawCode>,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RawRange {
    start: RawPosition,
}

#[derive(Debug, Deserialize)]
struct RawPosition {
    line: u32,
    #[serde(default)]
    character: u32,
}

/// Legacy flat issue list.
#[derive(Debug, Deserialize)]
struct RawIssue {
    #[serde(default)]
    file: String,
    line: u32,
    #[serde(default)]
    column: u32,
    #[serde(default)]
    severity: Option<RawSeverity>,
    #[serde(default)]
    code: Option<RawCode>,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSeverity {
    Name(String),
    Code(i64),
}

impl RawSeverity {
    fn resolve(severity: Option<&Self>) -> Severity {
        match severity {
            Some(Self::Name(name)) => Severity::from_name(name),
            Some(Self::Code(code)) => Severity::from_lsp_code(*code),
            None => Severity::Info,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCode {
    Text(String),
    Number(i64),
}

impl RawCode {
    fn resolve(code: Option<Self>) -> String {
        match code {
            Some(Self::Text(text)) => text,
            Some(Self::Number(n)) => n.to_string(),
            None => String::new(),
        }
    }
}

#[derive(Debug, Default)]
struct DecodedReport {
    diagnostics: Vec<Diagnostic>,
    skipped: usize,
}

/// Build the result of an analysis run.
///
/// The reporter file wins over stdout when both exist. Severity counts are
/// always recomputed from the decoded list; totals embedded in the report
/// are ignored.
pub fn parse_analysis_output(outcome: &ProcessOutcome, ctx: &ParseContext<'_>) -> AnalysisResult {
    let payload = outcome
        .report
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .unwrap_or(&outcome.stdout);

    let (decoded, parse_error) = match decode_report(payload, ctx.only_file) {
        Ok(report) => (report, None),
        Err(e) => {
            warn!(error = %e, payload_len = payload.len(), "analyzer output not decodable");
            (DecodedReport::default(), Some(e))
        }
    };

    let significant = significant_stderr(&outcome.stderr);
    let error = run_failure("analysis", outcome, ctx, &significant)
        .map(|e| e.to_string())
        .or_else(|| parse_error.as_ref().map(ToString::to_string));
    let success = error.is_none();

    let raw_output = parse_error
        .is_some()
        .then(|| payload.trim())
        .filter(|p| !p.is_empty())
        .map(|p| excerpt(p, RAW_OUTPUT_CHARS));

    debug!(
        diagnostics = decoded.diagnostics.len(),
        skipped = decoded.skipped,
        success,
        "analysis output parsed"
    );

    AnalysisResult {
        success,
        files_processed: ctx.files_processed,
        counts_by_severity: count_by_severity(&decoded.diagnostics),
        diagnostics: decoded.diagnostics,
        skipped_records: decoded.skipped,
        timed_out: outcome.timed_out,
        error,
        raw_output,
        stderr: failure_stderr(success, &outcome.stderr, &significant),
    }
}

/// Build the result of a formatting run.
///
/// Success requires a clean exit and no error markers in stderr once
/// progress output is filtered away.
pub fn parse_format_output(outcome: &ProcessOutcome, ctx: &ParseContext<'_>) -> FormatResult {
    let significant = significant_stderr(&outcome.stderr);
    let error = run_failure("formatting", outcome, ctx, &significant)
        .map(|e| e.to_string())
        .or_else(|| {
            has_error_marker(&significant).then(|| {
                format!(
                    "formatter reported errors for {}: {}",
                    ctx.source.display(),
                    excerpt(&significant, STDERR_EXCERPT_CHARS)
                )
            })
        });
    let success = error.is_none();

    FormatResult {
        success,
        files_processed: ctx.files_processed,
        raw_output: outcome.stdout.clone(),
        timed_out: outcome.timed_out,
        error,
        stderr: failure_stderr(success, &outcome.stderr, &significant),
    }
}

fn run_failure(
    operation: &'static str,
    outcome: &ProcessOutcome,
    ctx: &ParseContext<'_>,
    significant: &str,
) -> Option<BslError> {
    if outcome.timed_out {
        return Some(BslError::ProcessTimeout {
            operation,
            path: ctx.source.to_path_buf(),
            timeout_secs: ctx.timeout.as_secs(),
        });
    }
    if outcome.exit_code != 0 {
        let stderr = if significant.trim().is_empty() {
            outcome.stderr.trim()
        } else {
            significant.trim()
        };
        return Some(BslError::Execution {
            operation,
            path: ctx.source.to_path_buf(),
            code: outcome.exit_code,
            stderr: excerpt(stderr, STDERR_EXCERPT_CHARS),
        });
    }
    None
}

fn failure_stderr(success: bool, raw: &str, significant: &str) -> Option<String> {
    if success {
        return None;
    }
    let text = if significant.trim().is_empty() { raw } else { significant };
    let text = text.trim();
    (!text.is_empty()).then(|| excerpt(text, STDERR_EXCERPT_CHARS))
}

fn decode_report(text: &str, only_file: Option<&Path>) -> BslResult<DecodedReport> {
    let value = find_json_value(text).ok_or_else(|| BslError::OutputParse {
        reason: if text.trim().is_empty() {
            "analyzer produced no output".to_owned()
        } else {
            "no JSON report found in analyzer output".to_owned()
        },
    })?;

    match value {
        Value::Object(mut map) => {
            if let Some(infos) = map.remove("fileinfos") {
                let Value::Array(items) = infos else {
                    return Err(BslError::OutputParse {
                        reason: "\"fileinfos\" is not an array".to_owned(),
                    });
                };
                Ok(decode_file_infos(items, only_file))
            } else if let Some(issues) = map.remove("issues") {
                let Value::Array(items) = issues else {
                    return Err(BslError::OutputParse {
                        reason: "\"issues\" is not an array".to_owned(),
                    });
                };
                Ok(decode_issues(items, only_file))
            } else {
                let keys: Vec<&str> = map.keys().map(String::as_str).collect();
                Err(BslError::OutputParse {
                    reason: format!("unexpected JSON object, keys: {}", keys.join(", ")),
                })
            }
        }
        Value::Array(items) => Ok(decode_file_infos(items, only_file)),
        _ => Err(BslError::OutputParse {
            reason: "JSON report is neither an object nor an array".to_owned(),
        }),
    }
}

/// The report value in `text`, tolerating log lines around it.
///
/// An empty array counts only when it is the whole payload; inside log text
/// `[]` is too common to mean "no diagnostics".
fn find_json_value(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() || value.is_array() {
            return Some(value);
        }
    }

    trimmed
        .char_indices()
        .filter(|(_, c)| *c == '{' || *c == '[')
        .take(MAX_JSON_CANDIDATES)
        .find_map(|(start, _)| {
            let mut stream = serde_json::Deserializer::from_str(&trimmed[start..]).into_iter::<Value>();
            match stream.next() {
                Some(Ok(value)) if looks_like_report(&value) => {
                    debug!(offset = start, "extracted JSON report from mixed output");
                    Some(value)
                }
                _ => None,
            }
        })
}

fn looks_like_report(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.contains_key("fileinfos") || map.contains_key("issues"),
        Value::Array(items) => items.iter().any(|item| item.get("path").is_some()),
        _ => false,
    }
}

fn decode_file_infos(items: Vec<Value>, only_file: Option<&Path>) -> DecodedReport {
    let mut report = DecodedReport::default();

    for item in items {
        let info: RawFileInfo = match serde_json::from_value(item) {
            Ok(info) => info,
            Err(e) => {
                warn!(error = %e, "skipping malformed file record");
                report.skipped += 1;
                continue;
            }
        };

        let path = to_local_path(&info.path);
        if only_file.is_some_and(|target| !same_file(&path, target)) {
            continue;
        }

        for raw in info.diagnostics {
            match serde_json::from_value::<RawDiagnostic>(raw) {
                Ok(d) => report.diagnostics.push(Diagnostic {
                    file_path: path.clone(),
                    line: d.range.start.line.saturating_add(1),
                    column: d.range.start.character.saturating_add(1),
                    severity: RawSeverity::resolve(d.severity.as_ref()),
                    code: RawCode::resolve(d.code),
                    message: d.message,
                }),
                Err(e) => {
                    warn!(file = %path, error = %e, "skipping malformed diagnostic");
                    report.skipped += 1;
                }
            }
        }
    }

    report
}

fn decode_issues(items: Vec<Value>, only_file: Option<&Path>) -> DecodedReport {
    let mut report = DecodedReport::default();

    for item in items {
        let issue: RawIssue = match serde_json::from_value(item) {
            Ok(issue) => issue,
            Err(e) => {
                warn!(error = %e, "skipping malformed issue");
                report.skipped += 1;
                continue;
            }
        };

        let path = to_local_path(&issue.file);
        if only_file.is_some_and(|target| !same_file(&path, target)) {
            continue;
        }

        report.diagnostics.push(Diagnostic {
            file_path: path,
            line: issue.line.max(1),
            column: issue.column,
            severity: RawSeverity::resolve(issue.severity.as_ref()),
            code: RawCode::resolve(issue.code),
            message: issue.message,
        });
    }

    report
}

/// `file://` URIs become filesystem paths; anything else is kept verbatim.
fn to_local_path(reported: &str) -> String {
    if !reported.starts_with("file://") {
        return reported.to_owned();
    }
    url::Url::parse(reported)
        .ok()
        .and_then(|u| u.to_file_path().ok())
        .map_or_else(|| reported.to_owned(), |p| p.display().to_string())
}

fn same_file(reported: &str, target: &Path) -> bool {
    let reported = Path::new(reported);
    if reported == target {
        return true;
    }
    if reported.is_relative() && !reported.as_os_str().is_empty() && target.ends_with(reported) {
        return true;
    }
    match (reported.canonicalize(), target.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
