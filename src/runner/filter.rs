//! Stderr classification.
//!
//! The analyzer redraws a progress bar on stderr with carriage returns.
//! Those lines carry no failure signal and are removed before stderr is
//! inspected for error markers; the raw capture is left untouched.

use std::sync::LazyLock;

use regex::Regex;

/// Characters of stderr kept in user-facing excerpts.
pub const STDERR_EXCERPT_CHARS: usize = 2000;

#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in pattern is valid")
}

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| compile(r"\x1b\[[0-9;?]*[A-Za-z]"));

// Optional label, optional bar, a percentage, optional bar, optional
// `done/total` counter, optional `(elapsed / eta)` group.
static PROGRESS: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"^\s*(?:\p{L}[\p{L}\s.:_-]*?)?\s*(?:[\[│|][^\]│|]*[\]│|]\s*)?\d{1,3}(?:[.,]\d+)?\s?%\s*(?:[\[│|][^\]│|]*[\]│|])?\s*(?:\d+\s*/\s*\d+)?\s*(?:\([^)]*\))?\s*$",
    )
});

static ERROR_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"(?m)(?:(?i:^\s*(?:error|fatal)\s*:)|\b(?:ERROR|FATAL|SEVERE)\b|Exception in thread|^\s*(?:[\w$]+\.)*[\w$]*(?:Exception|Error)\b(?::|\s*$)|^\s*Caused by:)",
    )
});

/// Messages the Java launcher prints when it cannot start the analyzer.
const LAUNCHER_FAILURES: [&str; 6] = [
    "Unable to access jarfile",
    "Invalid or corrupt jarfile",
    "no main manifest attribute",
    "Could not find or load main class",
    "UnsupportedClassVersionError",
    "Error occurred during initialization of VM",
];

/// Messages the JVM prints when the requested heap cannot be used.
const HEAP_FAILURES: [&str; 2] = ["Invalid maximum heap size", "Could not reserve enough space"];

/// Whether one visual line (no `\r`) is a progress indicator.
///
/// A line carrying an error marker never is, even when it ends in a
/// percentage.
pub fn is_progress_line(segment: &str) -> bool {
    let clean = ANSI_ESCAPE.replace_all(segment, "");
    !ERROR_MARKER.is_match(&clean) && PROGRESS.is_match(&clean)
}

/// Stderr with progress output removed.
///
/// A physical line redrawn with `\r` is split into its segments; segments
/// that are blank or progress indicators are dropped, and the line vanishes
/// when nothing else remains.
pub fn significant_stderr(stderr: &str) -> String {
    let mut kept = Vec::new();
    for line in stderr.lines() {
        let segments: Vec<&str> = line
            .split('\r')
            .filter(|s| !s.trim().is_empty() && !is_progress_line(s))
            .collect();
        if !segments.is_empty() {
            kept.push(segments.join(" "));
        }
    }
    kept.join("\n")
}

/// Whether filtered stderr reports an error.
pub fn has_error_marker(significant: &str) -> bool {
    ERROR_MARKER.is_match(significant)
}

/// The launcher failure message found in `stderr`, if any.
pub fn launcher_failure(stderr: &str) -> Option<&'static str> {
    LAUNCHER_FAILURES
        .iter()
        .copied()
        .find(|marker| stderr.contains(marker))
}

/// The heap rejection message found in `stderr`, if any.
pub fn heap_failure(stderr: &str) -> Option<&'static str> {
    HEAP_FAILURES
        .iter()
        .copied()
        .find(|marker| stderr.contains(marker))
}

/// First `max_chars` characters of `text`, with a note on what was cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_owned();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{head}\n... and {} more characters", total - max_chars)
}
