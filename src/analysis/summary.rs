//! Markdown rendering of results for the calling agent.

use std::fmt::Write;

use super::{AnalysisResult, Diagnostic, FormatResult, Severity};

/// Up to `limit` diagnostics, most severe first, then by file and line.
///
/// The sort is stable, so equal keys keep the analyzer's order.
pub fn rank_top_issues(diagnostics: &[Diagnostic], limit: usize) -> Vec<&Diagnostic> {
    let mut ranked: Vec<&Diagnostic> = diagnostics.iter().collect();
    ranked.sort_by(|a, b| {
        a.severity
            .cmp(&b.severity)
            .then_with(|| a.file_path.cmp(&b.file_path))
            .then_with(|| a.line.cmp(&b.line))
    });
    ranked.truncate(limit);
    ranked
}

fn status_word(success: bool) -> &'static str {
    if success { "success" } else { "failed" }
}

/// Summary of an analysis run with the `limit` top issues.
pub fn render_analysis_summary(result: &AnalysisResult, limit: usize) -> String {
    let mut out = String::from("## BSL Analysis Results\n\n");
    let status = if result.timed_out { "timed out" } else { status_word(result.success) };
    let _ = writeln!(out, "**Status:** {status}");
    let _ = writeln!(out, "**Files processed:** {}", result.files_processed);
    let _ = writeln!(out, "**Total diagnostics:** {}", result.diagnostics.len());
    for severity in Severity::ALL {
        let _ = writeln!(out, "- {severity}: {}", result.count(severity));
    }
    if result.skipped_records > 0 {
        let _ = writeln!(out, "- skipped malformed records: {}", result.skipped_records);
    }

    let top = rank_top_issues(&result.diagnostics, limit);
    if !top.is_empty() {
        out.push_str("\n### Top issues\n\n");
        for d in top {
            let _ = write!(out, "- [{}] {}:{}:{}", d.severity, d.file_path, d.line, d.column);
            if !d.code.is_empty() {
                let _ = write!(out, " [{}]", d.code);
            }
            let _ = writeln!(out, " {}", d.message);
        }
    }

    if let Some(error) = &result.error {
        let _ = write!(out, "\n### Error\n\n{error}\n");
    }
    if let Some(stderr) = &result.stderr {
        let _ = write!(out, "\n### Stderr\n\n```\n{stderr}\n```\n");
    }
    out
}

/// Status text for a formatting run.
pub fn render_format_status(result: &FormatResult) -> String {
    let mut out = String::from("## BSL Formatting Results\n\n");
    let status = if result.timed_out { "timed out" } else { status_word(result.success) };
    let _ = writeln!(out, "**Status:** {status}");
    let _ = writeln!(out, "**Files processed:** {}", result.files_processed);

    let output = result.raw_output.trim();
    if !output.is_empty() {
        let _ = write!(out, "\n### Output\n\n```\n{output}\n```\n");
    }
    if let Some(error) = &result.error {
        let _ = write!(out, "\n### Error\n\n{error}\n");
    }
    if let Some(stderr) = &result.stderr {
        let _ = write!(out, "\n### Stderr\n\n```\n{stderr}\n```\n");
    }
    out
}
