//! BSL Language Server invocation.
//!
//! Builds the analyzer and formatter command lines, runs them through a
//! [`ProcessRunner`] with fixed time bounds, and picks up the JSON report
//! the analyzer writes into a per-call temporary directory.
//!
//! ```text
//! java -Xmx<m>m -Dfile.encoding=UTF-8 -jar <jar> --analyze --srcDir <dir>
//!      --reporter json --outputDir <tmp> [--configuration <cfg>]
//! java -Dfile.encoding=UTF-8 -jar <jar> --format --src <path>
//! ```

pub mod filter;
pub mod process;

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::BslConfig;
use crate::error::{BslError, BslResult};
use crate::util::atomic::atomic_write_json;

pub use process::{Invocation, ProcessOutcome, ProcessRunner, SystemRunner};

/// Wall-clock bound for an analysis run.
pub const ANALYZE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// Wall-clock bound for a formatting run.
pub const FORMAT_TIMEOUT: Duration = Duration::from_secs(2 * 60);

/// File the JSON reporter writes into `--outputDir`.
pub const REPORT_FILE_NAME: &str = "bsl-json.json";
/// Analyzer configuration created next to the jar when none is given.
pub const DEFAULT_CONFIG_FILE_NAME: &str = ".bsl-language-server.json";

/// Variables pointed at the system temp directory for the child, keeping
/// the JVM away from profile directories it may not be able to traverse.
const REDIRECTED_ENV: [&str; 6] = ["HOME", "USERPROFILE", "TEMP", "TMP", "APPDATA", "LOCALAPPDATA"];

/// Runs the analyzer jar.
#[derive(Debug)]
pub struct BslRunner<R = SystemRunner> {
    config: BslConfig,
    process: R,
    analyze_timeout: Duration,
    format_timeout: Duration,
}

impl BslRunner<SystemRunner> {
    pub fn new(config: BslConfig) -> Self {
        Self::with_process(config, SystemRunner)
    }
}

impl<R: ProcessRunner> BslRunner<R> {
    pub const fn with_process(config: BslConfig, process: R) -> Self {
        Self {
            config,
            process,
            analyze_timeout: ANALYZE_TIMEOUT,
            format_timeout: FORMAT_TIMEOUT,
        }
    }

    /// Override the time bounds.
    #[must_use]
    pub const fn with_timeouts(mut self, analyze: Duration, format: Duration) -> Self {
        self.analyze_timeout = analyze;
        self.format_timeout = format;
        self
    }

    pub const fn config(&self) -> &BslConfig {
        &self.config
    }

    pub const fn process(&self) -> &R {
        &self.process
    }

    pub const fn analyze_timeout(&self) -> Duration {
        self.analyze_timeout
    }

    pub const fn format_timeout(&self) -> Duration {
        self.format_timeout
    }

    /// Analyze every source under `source_dir`.
    ///
    /// `analyzer_config` overrides the configured default. The JSON report,
    /// when the analyzer wrote one, is returned in
    /// [`ProcessOutcome::report`].
    pub fn run_analysis(
        &self,
        source_dir: &Path,
        analyzer_config: Option<&Path>,
        memory_mb: u32,
    ) -> BslResult<ProcessOutcome> {
        let java = self.launcher()?;
        let analyzer_config = analyzer_config
            .map(Path::to_path_buf)
            .or_else(|| self.config.config_path.clone())
            .or_else(|| self.default_analyzer_config());

        let report_dir = tempfile::Builder::new()
            .prefix("bsl-report-")
            .tempdir()
            .map_err(|source| BslError::Io {
                path: std::env::temp_dir(),
                source,
            })?;

        let heap = base_invocation(&java, source_dir).arg(format!("-Xmx{memory_mb}m"));
        let mut invocation = self
            .with_jar(heap)
            .arg("--analyze")
            .arg("--srcDir")
            .arg(source_dir.as_os_str())
            .arg("--reporter")
            .arg("json")
            .arg("--outputDir")
            .arg(report_dir.path().as_os_str());
        if let Some(cfg) = &analyzer_config {
            invocation = invocation.arg("--configuration").arg(cfg.as_os_str());
        }

        info!(
            source = %source_dir.display(),
            memory_mb,
            config = ?analyzer_config,
            "running analysis"
        );
        let mut outcome = self.process.run(&invocation, self.analyze_timeout)?;
        self.check_launcher(&java, &outcome, "analysis", source_dir, Some(memory_mb))?;

        let report_path = report_dir.path().join(REPORT_FILE_NAME);
        match std::fs::read_to_string(&report_path) {
            Ok(report) => {
                debug!(path = %report_path.display(), bytes = report.len(), "read JSON report");
                outcome.report = Some(report);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no JSON report written, falling back to stdout");
            }
            Err(e) => warn!(path = %report_path.display(), error = %e, "failed to read JSON report"),
        }

        info!(
            exit_code = outcome.exit_code,
            timed_out = outcome.timed_out,
            "analysis finished"
        );
        Ok(outcome)
    }

    /// Format `source` (a file or a directory) in place.
    pub fn run_format(&self, source: &Path) -> BslResult<ProcessOutcome> {
        let java = self.launcher()?;
        let work_dir = if source.is_dir() {
            source
        } else {
            source.parent().unwrap_or(source)
        };

        let invocation = self
            .with_jar(base_invocation(&java, work_dir))
            .arg("--format")
            .arg("--src")
            .arg(source.as_os_str());

        info!(source = %source.display(), "running formatter");
        let outcome = self.process.run(&invocation, self.format_timeout)?;
        self.check_launcher(&java, &outcome, "formatting", source, None)?;

        info!(
            exit_code = outcome.exit_code,
            timed_out = outcome.timed_out,
            "formatting finished"
        );
        Ok(outcome)
    }

    fn launcher(&self) -> BslResult<PathBuf> {
        if !self.config.jar_path.is_file() {
            return Err(BslError::ToolNotFound {
                tool: self.config.jar_path.display().to_string(),
                reason: "BSL Language Server jar no longer exists".to_owned(),
            });
        }
        self.config.resolve_java()
    }

    fn with_jar(&self, invocation: Invocation) -> Invocation {
        invocation
            .arg("-Dfile.encoding=UTF-8")
            .arg("-jar")
            .arg(self.config.jar_path.as_os_str())
    }

    /// A run that died in the launcher means Java or the jar is unusable,
    /// unless the JVM only rejected the heap size it was given.
    fn check_launcher(
        &self,
        java: &Path,
        outcome: &ProcessOutcome,
        operation: &'static str,
        source: &Path,
        heap_mb: Option<u32>,
    ) -> BslResult<()> {
        if outcome.timed_out || outcome.exit_code == 0 {
            return Ok(());
        }
        let stderr = filter::excerpt(outcome.stderr.trim(), filter::STDERR_EXCERPT_CHARS);

        if let Some(marker) = filter::heap_failure(&outcome.stderr) {
            let heap = heap_mb.map_or_else(|| "its default heap".to_owned(), |mb| format!("a {mb} MB heap"));
            return Err(BslError::Execution {
                operation,
                path: source.to_path_buf(),
                code: outcome.exit_code,
                stderr: format!("JVM could not start with {heap} ({marker}): {stderr}"),
            });
        }

        match filter::launcher_failure(&outcome.stderr) {
            Some(marker) => Err(BslError::ToolNotFound {
                tool: format!("{} -jar {}", java.display(), self.config.jar_path.display()),
                reason: format!("{marker}: {stderr}"),
            }),
            None => Ok(()),
        }
    }

    /// `.bsl-language-server.json` beside the jar, created if missing.
    fn default_analyzer_config(&self) -> Option<PathBuf> {
        let path = self.config.jar_path.parent()?.join(DEFAULT_CONFIG_FILE_NAME);
        if path.is_file() {
            return Some(path);
        }
        let body = serde_json::json!({
            "diagnosticLanguage": "ru",
            "language": "ru",
        });
        match atomic_write_json(&path, &body) {
            Ok(()) => {
                info!(path = %path.display(), "created default analyzer configuration");
                Some(path)
            }
            Err(e) => {
                warn!(error = %e, "cannot create default analyzer configuration, running without one");
                None
            }
        }
    }
}

fn base_invocation(java: &Path, work_dir: &Path) -> Invocation {
    let temp = std::env::temp_dir();
    REDIRECTED_ENV.iter().fold(
        Invocation::new(java).current_dir(work_dir),
        |inv, key| inv.env(*key, temp.as_os_str()),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Records invocations and replays a fixed outcome.
    struct Recorder {
        seen: Mutex<Vec<(Invocation, Duration)>>,
        outcome: ProcessOutcome,
    }

    impl Recorder {
        fn new(outcome: ProcessOutcome) -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
                outcome,
            }
        }

        fn last(&self) -> (Invocation, Duration) {
            self.seen.lock().expect("lock").last().cloned().expect("a run")
        }
    }

    impl ProcessRunner for Recorder {
        fn run(&self, invocation: &Invocation, timeout: Duration) -> BslResult<ProcessOutcome> {
            self.seen
                .lock()
                .expect("lock")
                .push((invocation.clone(), timeout));
            Ok(self.outcome.clone())
        }
    }

    fn setup(outcome: ProcessOutcome) -> (tempfile::TempDir, BslRunner<Recorder>) {
        let dir = tempfile::tempdir().expect("tempdir");
        let jar = dir.path().join("bsl-language-server.jar");
        std::fs::write(&jar, b"PK").expect("jar");
        // Any existing file stands in for the launcher; Recorder never execs it.
        let config = BslConfig::new(&jar).expect("config").with_java(&jar);
        (dir, BslRunner::with_process(config, Recorder::new(outcome)))
    }

    fn args_of(inv: &Invocation) -> Vec<String> {
        inv.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn analyze_command_line() {
        let (dir, runner) = setup(ProcessOutcome::default());
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).expect("mkdir");

        runner.run_analysis(&src, None, 2048).expect("run");

        let (inv, timeout) = runner.process.last();
        let args = args_of(&inv);
        assert_eq!(timeout, ANALYZE_TIMEOUT);
        assert_eq!(args[0], "-Xmx2048m");
        assert_eq!(args[1], "-Dfile.encoding=UTF-8");
        assert_eq!(args[2], "-jar");
        assert!(args.contains(&"--analyze".to_owned()));
        assert_eq!(inv.flag_value("--srcDir"), Some(src.display().to_string()));
        assert_eq!(inv.flag_value("--reporter").as_deref(), Some("json"));
        assert!(inv.flag_value("--outputDir").is_some());
        assert_eq!(inv.current_dir.as_deref(), Some(src.as_path()));
    }

    #[test]
    fn default_config_created_next_to_jar() {
        let (dir, runner) = setup(ProcessOutcome::default());
        runner.run_analysis(dir.path(), None, 512).expect("run");

        let expected = dir.path().join(DEFAULT_CONFIG_FILE_NAME);
        assert!(expected.is_file());
        let (inv, _) = runner.process.last();
        assert_eq!(
            inv.flag_value("--configuration"),
            Some(expected.display().to_string())
        );
    }

    #[test]
    fn explicit_config_wins() {
        let (dir, runner) = setup(ProcessOutcome::default());
        let cfg = dir.path().join("custom.json");
        std::fs::write(&cfg, "{}").expect("cfg");

        runner.run_analysis(dir.path(), Some(&cfg), 512).expect("run");

        let (inv, _) = runner.process.last();
        assert_eq!(inv.flag_value("--configuration"), Some(cfg.display().to_string()));
        assert!(!dir.path().join(DEFAULT_CONFIG_FILE_NAME).exists());
    }

    #[test]
    fn format_command_line() {
        let (dir, runner) = setup(ProcessOutcome::default());
        let file = dir.path().join("Module.bsl");
        std::fs::write(&file, "").expect("src");

        runner.run_format(&file).expect("run");

        let (inv, timeout) = runner.process.last();
        assert_eq!(timeout, FORMAT_TIMEOUT);
        assert!(!args_of(&inv).iter().any(|a| a.starts_with("-Xmx")));
        assert!(args_of(&inv).contains(&"--format".to_owned()));
        assert_eq!(inv.flag_value("--src"), Some(file.display().to_string()));
        assert_eq!(inv.current_dir.as_deref(), Some(dir.path()));
    }

    #[test]
    fn launcher_failure_is_tool_not_found() {
        let (dir, runner) = setup(ProcessOutcome {
            exit_code: 1,
            stderr: "Error: Unable to access jarfile /missing.jar".to_owned(),
            ..ProcessOutcome::default()
        });
        let err = runner.run_format(dir.path()).expect_err("must fail");
        assert!(matches!(err, BslError::ToolNotFound { .. }));
    }

    #[test]
    fn oversized_heap_is_execution_failure() {
        let (dir, runner) = setup(ProcessOutcome {
            exit_code: 1,
            stderr: "Error occurred during initialization of VM\n\
                     Could not reserve enough space for 99999999KB object heap"
                .to_owned(),
            ..ProcessOutcome::default()
        });
        let err = runner
            .run_analysis(dir.path(), None, 99_999)
            .expect_err("must fail");
        match err {
            BslError::Execution { operation, stderr, .. } => {
                assert_eq!(operation, "analysis");
                assert!(stderr.contains("99999 MB heap"));
                assert!(stderr.contains("Could not reserve enough space"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn deleted_jar_is_tool_not_found() {
        let (dir, runner) = setup(ProcessOutcome::default());
        std::fs::remove_file(dir.path().join("bsl-language-server.jar")).expect("rm");
        let err = runner.run_format(dir.path()).expect_err("must fail");
        assert!(matches!(err, BslError::ToolNotFound { .. }));
        assert!(runner.process.seen.lock().expect("lock").is_empty());
    }
}
