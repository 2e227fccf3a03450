//! CLI tests: spawn the terrarun binary and check output and exit codes.

use std::fs;
use std::process::Command;

use terrarun::exit_codes;
use terrarun::test_support::{ModuleTree, dependency_block};

fn terrarun() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_terrarun"));
    cmd.env_remove("work_dir")
        .env_remove("base_branch")
        .env_remove("repo_url")
        .env("RUST_LOG", "off");
    cmd
}

#[test]
fn graph_json_prints_plan() {
    let tree = ModuleTree::new().expect("tree");
    tree.module("live/a", "").expect("a");
    tree.module("live/b", &dependency_block("a", "../a"))
        .expect("b");

    let output = terrarun()
        .arg("--work-dir")
        .arg(tree.root())
        .args(["graph", "--command", "plan", "--json"])
        .args(["--changed", "live/a/terragrunt.hcl"])
        .output()
        .expect("terrarun graph");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(plan["command"], "plan");
    let batches = plan["batches"].as_array().expect("batches");
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[1]["operations"][0]["kind"], "run");
}

#[test]
fn graph_text_marks_destroy_operations() {
    let tree = ModuleTree::new().expect("tree");
    tree.module("live/a", "").expect("a");

    let output = terrarun()
        .arg("--work-dir")
        .arg(tree.root())
        .args(["graph", "--command", "apply"])
        .args(["--changed", "live/gone/terragrunt.hcl"])
        .output()
        .expect("terrarun graph");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("includes 1 batches"));
    assert!(stdout.contains("[!!! DESTROY !!!]"));
}

#[test]
fn deps_prints_resolved_paths() {
    let tree = ModuleTree::new().expect("tree");
    let file = tree
        .module("live/app", &dependency_block("vpc", "../vpc"))
        .expect("app")
        .join("terragrunt.hcl");

    let output = terrarun()
        .arg("deps")
        .arg(&file)
        .output()
        .expect("terrarun deps");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        tree.root().join("live/vpc").display().to_string()
    );
}

#[test]
fn unknown_command_is_rejected() {
    let output = terrarun()
        .args(["graph", "--command", "destroy", "--changed", "a/b.hcl"])
        .output()
        .expect("terrarun graph");
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn invalid_settings_exit_with_invalid_code() {
    let tree = ModuleTree::new().expect("tree");
    fs::write(tree.root().join(".terrarun.toml"), "fetch_attempts = 0\n").expect("settings");

    let status = terrarun()
        .arg("--work-dir")
        .arg(tree.root())
        .args(["graph", "--command", "plan", "--changed", "a/b.hcl"])
        .status()
        .expect("terrarun graph");
    assert_eq!(status.code(), Some(exit_codes::INVALID));
}

#[test]
fn missing_repo_url_without_changed_files_is_invalid() {
    let tree = ModuleTree::new().expect("tree");
    let status = terrarun()
        .arg("--work-dir")
        .arg(tree.root())
        .args(["graph", "--command", "plan"])
        .status()
        .expect("terrarun graph");
    assert_eq!(status.code(), Some(exit_codes::INVALID));
}

#[cfg(unix)]
#[test]
fn run_executes_tool_and_writes_report() {
    let tree = ModuleTree::new().expect("tree");
    tree.module("live/a", "").expect("a");
    // `sh plan` runs the script named `plan` in the module directory.
    tree.write(
        "live/a/plan",
        "echo 'Refreshing state...'\necho 'Plan: 2 to add, 0 to change, 0 to destroy.'\n",
    )
    .expect("script");
    tree.write(".terrarun.toml", "tool = \"sh\"\necho_output = false\n")
        .expect("settings");
    let report_path = tree.root().join("out/report.txt");

    let output = terrarun()
        .arg("--work-dir")
        .arg(tree.root())
        .args(["run", "--command", "plan"])
        .args(["--changed", "live/a/terragrunt.hcl"])
        .arg("--report-file")
        .arg(&report_path)
        .output()
        .expect("terrarun run");

    assert_eq!(
        output.status.code(),
        Some(exit_codes::OK),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report = fs::read_to_string(&report_path).expect("report");
    assert!(report.contains("TERRAGRUNT PLAN"));
    assert!(report.contains("> Plan: 2 to add, 0 to change, 0 to destroy."));
    assert!(!report.contains("Refreshing"));
}

#[cfg(unix)]
#[test]
fn failing_tool_exits_with_failure() {
    let tree = ModuleTree::new().expect("tree");
    tree.module("live/a", "").expect("a");
    tree.write("live/a/validate", "echo 'Error: bad block'\nexit 1\n")
        .expect("script");
    tree.write(".terrarun.toml", "tool = \"sh\"\necho_output = false\n")
        .expect("settings");

    let output = terrarun()
        .arg("--work-dir")
        .arg(tree.root())
        .args(["run", "--command", "validate"])
        .args(["--changed", "live/a/terragrunt.hcl"])
        .output()
        .expect("terrarun run");

    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("running validate in"));
}
