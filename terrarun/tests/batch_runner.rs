//! Runner scenarios: plans built from real module trees, executed against a
//! scripted repository and a recording executor.

use terrarun::batch::{BatchRunner, RunStatus};
use terrarun::cancel::CancellationToken;
use terrarun::core::summary::report;
use terrarun::core::types::{Command, OperationKind, OperationPlan};
use terrarun::error::Error;
use terrarun::io::git::CodeRepository;
use terrarun::planner::OperationPlanner;
use terrarun::test_support::{
    EventLog, ModuleTree, RecordingExecutor, ScriptedRepository, dependency_block,
};

const PLAN_OUTPUT: &str = "\
Initializing...
Terraform will perform the following actions:
  # aws_vpc.main will be created
  + resource \"aws_vpc\" \"main\" {
Plan: 1 to add, 0 to change, 0 to destroy.
";

const APPLY_OUTPUT: &str = "\
Plan: 0 to add, 0 to change, 3 to destroy.
Apply complete! Resources: 0 added, 0 changed, 3 destroyed.
";

/// Tree with `live/a` changed and `live/old` removed from the working tree
/// but still present on the base branch.
fn tree_with_deleted_module(command: Command) -> (ModuleTree, OperationPlan, ScriptedRepository) {
    let tree = ModuleTree::new().expect("tree");
    tree.module("live/a", "").expect("a");
    tree.module("live/old", "").expect("old");
    tree.remove("live/old").expect("remove old");
    let plan = OperationPlanner::new(tree.root(), command)
        .plan(&["live/a/terragrunt.hcl", "live/old/terragrunt.hcl"])
        .expect("plan");
    let repo = ScriptedRepository::new("feature").with_branch_files(
        "main",
        vec![(
            tree.root().join("live/old/terragrunt.hcl"),
            String::new(),
        )],
    );
    (tree, plan, repo)
}

#[test]
fn plan_skips_destroy_operations() {
    let (tree, plan, repo) = tree_with_deleted_module(Command::Plan);
    let executor = RecordingExecutor::new(PLAN_OUTPUT);

    let mut runner = BatchRunner::new(&plan, &repo, &executor, "main", CancellationToken::new());
    assert_eq!(runner.run().expect("run"), RunStatus::Completed);

    assert_eq!(executor.dirs(), vec![tree.root().join("live/a")]);
    // The destroy batch still switches branches even though nothing runs.
    assert_eq!(repo.checkouts(), vec!["main", "feature"]);
    assert_eq!(repo.current(), "feature");
}

#[test]
fn apply_runs_destroy_on_base_branch_and_restores() {
    let (tree, plan, repo) = tree_with_deleted_module(Command::Apply);
    let log = EventLog::default();
    let repo = repo.with_log(log.clone());
    let executor = RecordingExecutor::new(APPLY_OUTPUT).with_log(log.clone());

    let mut runner = BatchRunner::new(&plan, &repo, &executor, "main", CancellationToken::new());
    assert_eq!(runner.run().expect("run"), RunStatus::Completed);

    let a = tree.root().join("live/a");
    let old = tree.root().join("live/old");
    assert_eq!(
        log.entries(),
        vec![
            format!("apply {}", a.display()),
            "checkout main".to_string(),
            format!("apply {}", old.display()),
            "checkout feature".to_string(),
        ]
    );
    assert_eq!(repo.current(), "feature");
    assert!(!old.exists());
    assert!(runner.results().contains_key(&old));
}

#[test]
fn branch_is_restored_when_destroy_fails() {
    let (tree, plan, repo) = tree_with_deleted_module(Command::Apply);
    let old = tree.root().join("live/old");
    let executor = RecordingExecutor::new("Error: resource in use\n").fail_in(&old);

    let mut runner = BatchRunner::new(&plan, &repo, &executor, "main", CancellationToken::new());
    let err = runner.run().unwrap_err();

    assert!(matches!(err, Error::CommandExecution { ref dir, .. } if *dir == old));
    assert_eq!(repo.checkouts(), vec!["main", "feature"]);
    assert_eq!(repo.current(), "feature");
}

#[test]
fn operation_error_wins_over_restore_error() {
    let (tree, plan, repo) = tree_with_deleted_module(Command::Apply);
    let old = tree.root().join("live/old");
    let repo = repo.fail_checkout("feature");
    let executor = RecordingExecutor::new("").fail_in(&old);

    let mut runner = BatchRunner::new(&plan, &repo, &executor, "main", CancellationToken::new());
    let err = runner.run().unwrap_err();
    assert!(matches!(err, Error::CommandExecution { .. }));
}

#[test]
fn restore_failure_is_surfaced() {
    let (_tree, plan, repo) = tree_with_deleted_module(Command::Apply);
    let repo = repo.fail_checkout("feature");
    let executor = RecordingExecutor::new("");

    let mut runner = BatchRunner::new(&plan, &repo, &executor, "main", CancellationToken::new());
    let err = runner.run().unwrap_err();
    assert!(matches!(err, Error::Checkout { ref branch, .. } if branch == "feature"));
}

#[test]
fn base_checkout_failure_runs_nothing_in_batch() {
    let (tree, plan, repo) = tree_with_deleted_module(Command::Apply);
    let repo = repo.fail_checkout("main");
    let executor = RecordingExecutor::new("");

    let mut runner = BatchRunner::new(&plan, &repo, &executor, "main", CancellationToken::new());
    let err = runner.run().unwrap_err();

    assert!(matches!(err, Error::Checkout { ref branch, .. } if branch == "main"));
    assert_eq!(executor.dirs(), vec![tree.root().join("live/a")]);
}

#[test]
fn failure_in_first_batch_stops_dependents() {
    let tree = ModuleTree::new().expect("tree");
    let a = tree.module("live/a", "").expect("a");
    tree.module("live/b", &dependency_block("a", "../a"))
        .expect("b");
    let repo = ScriptedRepository::new("feature").with_changed(&["live/a/terragrunt.hcl"]);
    let changed = repo.changed_files("main").expect("changed files");
    let plan = OperationPlanner::new(tree.root(), Command::Apply)
        .plan(&changed)
        .expect("plan");
    let executor = RecordingExecutor::new("Error: invalid\n").fail_in(&a);

    let mut runner = BatchRunner::new(&plan, &repo, &executor, "main", CancellationToken::new());
    runner.run().unwrap_err();
    assert_eq!(executor.dirs(), vec![a]);
}

#[test]
fn report_lists_plan_and_results_in_order() {
    let tree = ModuleTree::new().expect("tree");
    tree.module("live/a", "").expect("a");
    tree.module("live/b", &dependency_block("a", "../a"))
        .expect("b");
    let plan = OperationPlanner::new(tree.root(), Command::Plan)
        .plan(&["live/a/terragrunt.hcl"])
        .expect("plan");
    assert!(plan.operations().all(|op| op.kind == OperationKind::Run));
    let repo = ScriptedRepository::new("feature");
    let executor = RecordingExecutor::new(PLAN_OUTPUT);

    let mut runner = BatchRunner::new(&plan, &repo, &executor, "main", CancellationToken::new());
    runner.run().expect("run");

    let text = report(&plan, runner.results());
    assert!(text.contains("TERRAGRUNT PLAN"));
    assert!(text.contains("> Batch #1:"));
    let first = text.find("(in directory a)").expect("a results");
    let second = text.find("(in directory b)").expect("b results");
    assert!(first < second);
    assert!(text.contains("> Plan: 1 to add, 0 to change, 0 to destroy."));
    assert!(!text.contains("Initializing"));
}
