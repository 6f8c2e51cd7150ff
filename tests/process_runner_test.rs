//! Real child processes through `SystemRunner`, driven with `sh`.

#![cfg(unix)]

use std::time::{Duration, Instant};

use bsl_mcp::BslError;
use bsl_mcp::runner::{Invocation, ProcessRunner, SystemRunner};

fn sh(script: &str) -> Invocation {
    Invocation::new("sh").arg("-c").arg(script)
}

#[test]
fn captures_exit_code_and_both_streams() {
    let outcome = SystemRunner
        .run(&sh("echo out; echo err >&2; exit 7"), Duration::from_secs(10))
        .expect("run");
    assert_eq!(outcome.exit_code, 7);
    assert_eq!(outcome.stdout, "out\n");
    assert_eq!(outcome.stderr, "err\n");
    assert!(!outcome.timed_out);
    assert!(!outcome.exited_cleanly());
}

#[test]
fn applies_environment_and_working_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let inv = sh("printf '%s\\n' \"$BSL_MARKER\"; pwd")
        .env("BSL_MARKER", "marker-value")
        .current_dir(dir.path());

    let outcome = SystemRunner.run(&inv, Duration::from_secs(10)).expect("run");
    let mut lines = outcome.stdout.lines();
    assert_eq!(lines.next(), Some("marker-value"));
    let cwd = std::path::PathBuf::from(lines.next().expect("pwd"));
    assert_eq!(
        cwd.canonicalize().expect("cwd"),
        dir.path().canonicalize().expect("dir")
    );
    assert!(outcome.exited_cleanly());
}

#[test]
fn timeout_kills_child_and_keeps_partial_output() {
    let started = Instant::now();
    let outcome = SystemRunner
        .run(&sh("echo partial; exec sleep 30"), Duration::from_secs(1))
        .expect("run");

    assert!(outcome.timed_out);
    assert_eq!(outcome.exit_code, -1);
    assert_eq!(outcome.stdout, "partial\n");
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn large_stderr_does_not_deadlock() {
    let outcome = SystemRunner
        .run(
            &sh("head -c 1000000 /dev/zero | tr '\\0' x >&2; echo done"),
            Duration::from_secs(30),
        )
        .expect("run");

    assert!(!outcome.timed_out);
    assert_eq!(outcome.stderr.len(), 1_000_000);
    assert_eq!(outcome.stdout, "done\n");
}

#[test]
fn lingering_grandchild_does_not_hold_the_call() {
    let started = Instant::now();
    let outcome = SystemRunner
        .run(&sh("sleep 30 & echo spawned"), Duration::from_secs(10))
        .expect("run");

    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.stdout, "spawned\n");
    assert!(started.elapsed() < Duration::from_secs(8));
}

#[test]
fn missing_program_is_tool_not_found() {
    let err = SystemRunner
        .run(
            &Invocation::new("/nonexistent/bsl-mcp-test/java"),
            Duration::from_secs(5),
        )
        .expect_err("spawn must fail");
    assert!(matches!(err, BslError::ToolNotFound { .. }));
}
