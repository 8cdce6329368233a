use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn write_workflow(dir: &std::path::Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn run_executes_a_linear_three_task_workflow_to_completion() {
    let workspace = tempfile::tempdir().unwrap();
    let workflow = write_workflow(
        workspace.path(),
        "workflow.json",
        r#"{
            "name": "sequence-pipeline",
            "tasks": [
                {"task_id": "fetch", "name": "Fetch sequence", "function": "string_interaction"},
                {"task_id": "dock", "name": "Docking", "function": "docking_prediction", "dependencies": ["fetch"]},
                {"task_id": "report", "name": "Report", "function": "report_generate", "dependencies": ["dock"]}
            ]
        }"#,
    );

    let mut cmd = Command::cargo_bin("pipeline").unwrap();
    cmd.args([
        "run",
        workflow.to_str().unwrap(),
        "--workspace",
        workspace.path().to_str().unwrap(),
    ]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Completed"));
}

#[test]
fn run_rejects_a_cyclic_workflow_with_construction_exit_code() {
    let workspace = tempfile::tempdir().unwrap();
    let workflow = write_workflow(
        workspace.path(),
        "cycle.json",
        r#"{
            "name": "cyclic",
            "tasks": [
                {"task_id": "a", "name": "A", "function": "string_interaction", "dependencies": ["b"]},
                {"task_id": "b", "name": "B", "function": "string_interaction", "dependencies": ["a"]}
            ]
        }"#,
    );

    let mut cmd = Command::cargo_bin("pipeline").unwrap();
    cmd.args([
        "run",
        workflow.to_str().unwrap(),
        "--workspace",
        workspace.path().to_str().unwrap(),
    ]);
    cmd.assert().code(2);
}

#[test]
fn status_list_and_report_reflect_a_completed_workflow() {
    let workspace = tempfile::tempdir().unwrap();
    let workflow = write_workflow(
        workspace.path(),
        "workflow.json",
        r#"{
            "name": "single-task",
            "tasks": [
                {"task_id": "only", "name": "Only", "function": "string_interaction"}
            ]
        }"#,
    );

    let mut run_cmd = Command::cargo_bin("pipeline").unwrap();
    let output = run_cmd
        .args([
            "run",
            workflow.to_str().unwrap(),
            "--workspace",
            workspace.path().to_str().unwrap(),
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let workflow_id = stdout
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .expect("first line should start with 'workflow <id>'");

    let mut list_cmd = Command::cargo_bin("pipeline").unwrap();
    list_cmd.args(["list", "--workspace", workspace.path().to_str().unwrap()]);
    list_cmd
        .assert()
        .success()
        .stdout(predicate::str::contains("single-task"));

    let mut status_cmd = Command::cargo_bin("pipeline").unwrap();
    status_cmd.args([
        "status",
        workflow_id,
        "--workspace",
        workspace.path().to_str().unwrap(),
    ]);
    status_cmd
        .assert()
        .success()
        .stdout(predicate::str::contains("Completed"));

    let mut report_cmd = Command::cargo_bin("pipeline").unwrap();
    report_cmd.args([
        "report",
        workflow_id,
        "--format",
        "json",
        "--workspace",
        workspace.path().to_str().unwrap(),
    ]);
    report_cmd
        .assert()
        .success()
        .stdout(predicate::str::contains("single-task"));
}

#[test]
fn cleanup_reports_zero_removals_for_a_fresh_workspace() {
    let workspace = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("pipeline").unwrap();
    cmd.args([
        "cleanup",
        "--older-than",
        "7d",
        "--workspace",
        workspace.path().to_str().unwrap(),
    ]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("removed 0 workflow(s)"));
}
