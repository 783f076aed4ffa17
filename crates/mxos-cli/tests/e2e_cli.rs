//! E2E integration tests for the `mxos` binary.
//!
//! Every test runs the real binary with the null sink and a bounded
//! number of ticks. Logs go to stderr; stdout only carries the `stats:`
//! line (or the listing of `apps`).

mod common;

use common::{mxos_cmd, run_cmd, write_project_config};
use predicates::prelude::PredicateBooleanExt;
use predicates::str::{contains, is_match};

// ─── run ───────────────────────────────────────────────────────────

#[test]
fn run_prints_stats_after_ticks() {
    let (mut cmd, _home) = run_cmd(30);
    cmd.args(["--app", "bounce:1", "--fps", "120"])
        .assert()
        .success()
        .stdout(is_match(r"^stats: ticks=30 overruns=\d+ presented=\d+").expect("regex"))
        .stdout(contains("worker_faults=0"));
}

#[test]
fn run_rotates_through_several_apps() {
    let (mut cmd, _home) = run_cmd(90);
    cmd.args(["--app", "bounce:1", "--app", "binary_clock:1", "--fps", "60", "-v"])
        .assert()
        .success()
        .stdout(contains("ticks=90"))
        .stderr(contains("scheduled"))
        .stderr(contains("binary_clock"));
}

#[test]
fn unknown_app_fails_with_context() {
    let (mut cmd, _home) = run_cmd(1);
    cmd.args(["--app", "fireworks"])
        .assert()
        .failure()
        .stderr(contains("cannot register 'fireworks'"))
        .stderr(contains("unknown app: fireworks"));
}

#[test]
fn zero_duration_is_rejected_by_the_parser() {
    let (mut cmd, _home) = run_cmd(1);
    cmd.args(["--app", "bounce:0"])
        .assert()
        .failure()
        .stderr(contains("duration must be positive"));
}

#[test]
fn empty_display_is_rejected() {
    let (mut cmd, _home) = run_cmd(1);
    cmd.args(["--app", "bounce", "--width", "0"])
        .assert()
        .failure()
        .stderr(contains("config error").or(contains("invalid")));
}

#[cfg(unix)]
#[test]
fn process_isolation_runs_workers_as_children() {
    let (mut cmd, _home) = run_cmd(120);
    cmd.args(["--app", "bounce:5", "--fps", "60", "--isolation", "process", "-d"])
        .assert()
        .success()
        .stdout(contains("worker_faults=0"))
        .stderr(contains("worker process spawned"));
}

// ─── configuration ─────────────────────────────────────────────────

#[test]
fn project_config_sets_the_rotation() {
    let (mut cmd, home) = run_cmd(20);
    write_project_config(
        home.path(),
        r#"
[kernel]
fps = 120

[[apps]]
kind = "binary_clock"
duration_secs = 2
"#,
    );
    cmd.arg("-v")
        .assert()
        .success()
        .stdout(contains("ticks=20"))
        .stderr(contains("binary_clock"))
        .stderr(contains("bounce").not());
}

#[test]
fn explicit_config_file_must_exist() {
    let (mut cmd, home) = run_cmd(1);
    cmd.arg("--config")
        .arg(home.path().join("missing.toml"))
        .assert()
        .failure()
        .stderr(contains("failed to read config file"));
}

#[test]
fn malformed_config_is_reported() {
    let (mut cmd, home) = run_cmd(1);
    write_project_config(home.path(), "[kernel\nfps = ");
    cmd.assert()
        .failure()
        .stderr(contains("failed to parse config file"));
}

#[test]
fn bad_env_var_is_named() {
    let (mut cmd, _home) = run_cmd(1);
    cmd.env("MXOS_FPS", "lots")
        .assert()
        .failure()
        .stderr(contains("MXOS_FPS"));
}

#[test]
fn log_file_receives_debug_output() {
    let (mut cmd, home) = run_cmd(10);
    let log = home.path().join("logs").join("mxos.log");
    cmd.args(["--app", "bounce:1", "--fps", "120"])
        .arg("--log-file")
        .arg(&log)
        .assert()
        .success();
    let text = std::fs::read_to_string(&log).expect("log file written");
    assert!(text.contains("render loop started"), "{text}");
    assert!(!text.contains("\u{1b}["), "ANSI codes in log file");
}

// ─── apps ──────────────────────────────────────────────────────────

#[test]
fn apps_lists_builtins_with_isolation() {
    let (mut cmd, home) = mxos_cmd();
    cmd.arg("apps")
        .arg("-C")
        .arg(home.path())
        .assert()
        .success()
        .stdout(is_match(r"(?m)^bounce\s+1\.0\.0\s+10 fps\s+thread").expect("regex"))
        .stdout(is_match(r"(?m)^binary_clock\s+1\.0\.0\s+1 fps\s+thread\s+system_info").expect("regex"))
        .stdout(is_match(r"(?m)^loadmeter\s+1\.0\.0\s+2 fps\s+process\s+filesystem").expect("regex"));
}

#[test]
fn apps_honors_always_process() {
    let (mut cmd, home) = mxos_cmd();
    cmd.env("MXOS_ISOLATION", "process")
        .arg("apps")
        .arg("-C")
        .arg(home.path())
        .assert()
        .success()
        .stdout(is_match(r"(?m)^bounce\s+\S+\s+10 fps\s+process").expect("regex"));
}

// ─── worker ────────────────────────────────────────────────────────

#[test]
fn worker_speaks_json_lines() {
    let (mut cmd, _home) = mxos_cmd();
    cmd.args([
        "worker",
        "--app",
        "bounce",
        "--registration",
        "7",
        "--width",
        "16",
        "--height",
        "8",
        "--run-id",
        "67e55044-10b1-426f-9247-bb680e5fe0c8",
    ])
    .write_stdin("{\"type\":\"stop\"}\n")
    .assert()
    .success()
    .stdout(contains(r#"{"type":"ready"}"#));
}

#[test]
fn worker_exits_on_stdin_eof() {
    let (mut cmd, _home) = mxos_cmd();
    cmd.args([
        "worker",
        "--app",
        "binary_clock",
        "--registration",
        "1",
        "--width",
        "12",
        "--height",
        "8",
    ])
    .write_stdin("")
    .assert()
    .success();
}

#[test]
fn worker_rejects_unknown_kind() {
    let (mut cmd, _home) = mxos_cmd();
    cmd.args([
        "worker",
        "--app",
        "nope",
        "--registration",
        "1",
        "--width",
        "4",
        "--height",
        "4",
    ])
    .write_stdin("")
    .assert()
    .failure()
    .stderr(contains("worker cannot run 'nope'"));
}
