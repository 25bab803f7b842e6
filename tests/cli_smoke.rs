//! Behavioural smoke tests for the CLI entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn help_lists_every_subcommand() {
    let mut cmd = cargo_bin_cmd!("quiesce");
    cmd.arg("--help").assert().success().stdout(
        predicate::str::contains("status")
            .and(predicate::str::contains("ensure"))
            .and(predicate::str::contains("attach-volume"))
            .and(predicate::str::contains("detach-volume"))
            .and(predicate::str::contains("wait-gone")),
    );
}

#[test]
fn missing_subcommand_prints_usage() {
    let mut cmd = cargo_bin_cmd!("quiesce");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn unknown_power_state_is_rejected_by_the_parser() {
    let mut cmd = cargo_bin_cmd!("quiesce");
    cmd.args(["ensure", "fr-par-1/srv-1", "--state", "hibernating"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("hibernating"));
}

#[test]
fn blank_target_fails_with_an_error_chain() {
    let mut cmd = cargo_bin_cmd!("quiesce");
    cmd.args(["status", "   "])
        .assert()
        .code(1)
        .stderr(
            predicate::str::contains("error: invalid target")
                .and(predicate::str::contains("must not be empty")),
        );
}

#[test]
fn blank_secret_key_names_the_environment_variable() {
    let home = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let mut cmd = cargo_bin_cmd!("quiesce");
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path())
        .env_remove("QUIESCE_CONFIG_PATH")
        .env("SCW_SECRET_KEY", "   ")
        .args(["status", "fr-par-1/srv-1"])
        .assert()
        .code(1)
        .stderr(
            predicate::str::contains("configuration error")
                .and(predicate::str::contains("SCW_SECRET_KEY")),
        );
}
