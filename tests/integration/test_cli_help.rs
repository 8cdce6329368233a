use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn top_level_help_lists_every_subcommand() {
    let mut cmd = Command::cargo_bin("pipeline").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("resume"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("cancel"))
        .stdout(predicate::str::contains("pause"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("cleanup"))
        .stdout(predicate::str::contains("report"));
}

#[test]
fn version_flag_prints_crate_version() {
    let mut cmd = Command::cargo_bin("pipeline").unwrap();
    cmd.arg("--version");
    cmd.assert().success();
}

#[test]
fn missing_workflow_file_fails_with_nonzero_exit() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("pipeline").unwrap();
    cmd.args([
        "run",
        "does-not-exist.json",
        "--workspace",
        dir.path().to_str().unwrap(),
    ]);
    cmd.assert().failure();
}
