//! Shared E2E test helpers for `mxos` binary tests.

use assert_cmd::cargo::cargo_bin_cmd;
use std::time::Duration;
use tempfile::TempDir;

/// Default timeout for one CLI invocation.
pub const TIMEOUT_BASIC: Duration = Duration::from_secs(20);

/// Environment variables read by the config loader.
const MXOS_VARS: &[&str] = &[
    "MXOS_WIDTH",
    "MXOS_HEIGHT",
    "MXOS_BRIGHTNESS",
    "MXOS_SIMULATE",
    "MXOS_FPS",
    "MXOS_ERROR_POLICY",
    "MXOS_ISOLATION",
    "MXOS_DEFAULT_DURATION",
];

/// Build a Command for the `mxos` binary isolated from the developer's
/// config: `HOME` points at a fresh temp dir and `MXOS_*` is cleared.
///
/// Returns (command, home). Keep the guard alive for the whole test.
/// The temp dir also serves as the project root via `-C`.
pub fn mxos_cmd() -> (assert_cmd::Command, TempDir) {
    let home = tempfile::tempdir().expect("create temp home");
    let mut cmd: assert_cmd::Command = cargo_bin_cmd!("mxos");
    cmd.timeout(TIMEOUT_BASIC);
    cmd.env("HOME", home.path());
    cmd.env_remove("RUST_LOG");
    for var in MXOS_VARS {
        cmd.env_remove(var);
    }
    (cmd, home)
}

/// `mxos run` with the null sink and a bounded number of ticks.
pub fn run_cmd(ticks: u64) -> (assert_cmd::Command, TempDir) {
    let (mut cmd, home) = mxos_cmd();
    cmd.arg("run")
        .arg("-C")
        .arg(home.path())
        .args(["--sink", "null", "--ticks"])
        .arg(ticks.to_string());
    (cmd, home)
}

/// Writes `.mxos/config.toml` under `root`.
pub fn write_project_config(root: &std::path::Path, toml: &str) {
    let dir = root.join(".mxos");
    std::fs::create_dir_all(&dir).expect("create .mxos");
    std::fs::write(dir.join("config.toml"), toml).expect("write config");
}
