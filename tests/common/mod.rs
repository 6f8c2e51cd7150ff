//! Shared fixtures: a scratch workspace with a stand-in jar and a scripted
//! process runner.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use bsl_mcp::BslConfig;
use bsl_mcp::error::BslResult;
use bsl_mcp::runner::{BslRunner, Invocation, ProcessOutcome, ProcessRunner};
use bsl_mcp::service::BslService;
use bsl_mcp::tools::ToolRouter;

/// Replays scripted results and records every invocation it receives.
pub struct FakeRunner {
    script: Box<dyn Fn(&Invocation) -> BslResult<ProcessOutcome> + Send + Sync>,
    pub calls: Mutex<Vec<(Invocation, Duration)>>,
}

impl FakeRunner {
    pub fn replying(outcome: ProcessOutcome) -> Self {
        Self::scripted(move |_| Ok(outcome.clone()))
    }

    pub fn scripted(
        script: impl Fn(&Invocation) -> BslResult<ProcessOutcome> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("lock").len()
    }

    pub fn last_invocation(&self) -> Invocation {
        self.calls
            .lock()
            .expect("lock")
            .last()
            .map(|(inv, _)| inv.clone())
            .expect("at least one run")
    }
}

impl ProcessRunner for FakeRunner {
    fn run(&self, invocation: &Invocation, timeout: Duration) -> BslResult<ProcessOutcome> {
        self.calls
            .lock()
            .expect("lock")
            .push((invocation.clone(), timeout));
        (self.script)(invocation)
    }
}

/// A temporary directory holding `bsl-language-server.jar` and `src/`.
pub struct Workspace {
    pub dir: tempfile::TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("bsl-language-server.jar"), b"PK").expect("jar");
        std::fs::create_dir_all(dir.path().join("src")).expect("src");
        Self { dir }
    }

    pub fn jar(&self) -> PathBuf {
        self.dir.path().join("bsl-language-server.jar")
    }

    pub fn src(&self) -> PathBuf {
        self.dir.path().join("src")
    }

    /// Create a source file under `src/`.
    pub fn add_source(&self, relative: &str) -> PathBuf {
        let path = self.src().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("mkdir");
        }
        std::fs::write(&path, "Процедура Тест()\nКонецПроцедуры\n").expect("write");
        path
    }

    pub fn config(&self) -> BslConfig {
        // The jar doubles as the launcher path; fakes never execute it.
        BslConfig::new(self.jar()).expect("config").with_java(self.jar())
    }

    pub fn service(&self, runner: FakeRunner) -> BslService<FakeRunner> {
        BslService::with_runner(BslRunner::with_process(self.config(), runner))
    }

    pub fn router(&self, runner: FakeRunner) -> ToolRouter<FakeRunner> {
        ToolRouter::with_service(self.service(runner))
    }
}

/// One LSP-style diagnostic as the JSON reporter writes it.
pub fn lsp_diagnostic(line: u32, severity: &str, code: &str) -> serde_json::Value {
    serde_json::json!({
        "range": {
            "start": {"line": line, "character": 0},
            "end": {"line": line, "character": 10}
        },
        "severity": severity,
        "code": code,
        "source": "bsl-language-server",
        "message": format!("{code} on line {}", line + 1)
    })
}

/// A `fileinfos` report for one file.
pub fn report_for(path: &Path, diagnostics: Vec<serde_json::Value>) -> String {
    serde_json::json!({
        "date": "2024-05-01T00:00:00",
        "sourceDir": path.parent().map(|p| p.display().to_string()),
        "fileinfos": [{
            "path": path.display().to_string(),
            "mdoRef": "",
            "diagnostics": diagnostics,
            "metrics": {}
        }]
    })
    .to_string()
}
