//! Terragrunt change-set runner.
//!
//! Finds the modules touched by the current branch, plans them into
//! dependency-ordered batches and runs the requested command batch by batch.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use terrarun::batch::{BatchRunner, RunStatus};
use terrarun::cancel::{CancellationToken, install_signal_handler};
use terrarun::core::summary::{RULE, plan_summary, report};
use terrarun::core::types::{Command, OperationPlan};
use terrarun::exit_codes;
use terrarun::io::config::{Settings, load_settings};
use terrarun::io::executor::ProcessExecutor;
use terrarun::io::export::{export_envman, write_report};
use terrarun::io::git::{CodeRepository, Git};
use terrarun::io::modules::read_dependencies;
use terrarun::logging;
use terrarun::planner::OperationPlanner;

const SETTINGS_FILE: &str = ".terrarun.toml";

#[derive(Parser)]
#[command(
    name = "terrarun",
    version,
    about = "Plan and run terragrunt commands for the modules touched by a change set"
)]
struct Cli {
    /// Repository checkout holding the modules.
    #[arg(long, env = "work_dir", default_value = ".", global = true)]
    work_dir: PathBuf,

    /// Branch the change set is compared against.
    #[arg(long, env = "base_branch", default_value = "main", global = true)]
    base_branch: String,

    /// Remote the base branch is fetched from.
    #[arg(long, env = "repo_url", global = true)]
    repo_url: Option<String>,

    /// Settings file (defaults to `.terrarun.toml` in the work dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Plan and run the command for every affected module.
    Run {
        #[arg(long)]
        command: Command,
        /// Changed file relative to the work dir; skips git when given.
        #[arg(long = "changed")]
        changed: Vec<String>,
        /// Also write the final report to this file.
        #[arg(long)]
        report_file: Option<PathBuf>,
    },
    /// Print the operation plan without running anything.
    Graph {
        #[arg(long)]
        command: Command,
        #[arg(long = "changed")]
        changed: Vec<String>,
        /// Print the plan as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the dependencies declared by a module file.
    Deps { file: PathBuf },
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_codes::FAILED
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let work_dir = std::path::absolute(&cli.work_dir)
        .with_context(|| format!("resolve work dir {}", cli.work_dir.display()))?;
    let settings_path = cli
        .config
        .clone()
        .unwrap_or_else(|| work_dir.join(SETTINGS_FILE));
    let settings = match load_settings(&settings_path) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("error: {err:#}");
            return Ok(exit_codes::INVALID);
        }
    };

    let git = Git::new(&work_dir, cli.repo_url.clone().unwrap_or_default())
        .with_retry(settings.retry_policy());

    match cli.command {
        CliCommand::Run {
            command,
            changed,
            report_file,
        } => {
            let repo_url = cli.repo_url.as_deref();
            let Some(changed) = changed_files(&git, repo_url, &cli.base_branch, changed)? else {
                return Ok(exit_codes::INVALID);
            };
            cmd_run(
                &work_dir,
                &cli.base_branch,
                command,
                &changed,
                &git,
                &settings,
                report_file.as_deref(),
            )
        }
        CliCommand::Graph {
            command,
            changed,
            json,
        } => {
            let repo_url = cli.repo_url.as_deref();
            let Some(changed) = changed_files(&git, repo_url, &cli.base_branch, changed)? else {
                return Ok(exit_codes::INVALID);
            };
            cmd_graph(&work_dir, command, &changed, json)
        }
        CliCommand::Deps { file } => cmd_deps(&file),
    }
}

/// Changed files from `--changed`, or from git when none were given.
///
/// Returns `None` when git is needed but no repository URL is configured.
fn changed_files(
    git: &Git,
    repo_url: Option<&str>,
    base_branch: &str,
    changed: Vec<String>,
) -> Result<Option<Vec<String>>> {
    if !changed.is_empty() {
        return Ok(Some(changed));
    }
    if repo_url.is_none_or(|url| url.trim().is_empty()) {
        eprintln!("error: --repo-url (or repo_url) is required unless --changed is given");
        return Ok(None);
    }
    let files = git
        .changed_files(base_branch)
        .context("get changed files")?;
    Ok(Some(files))
}

fn plan(work_dir: &Path, command: Command, changed: &[String]) -> Result<OperationPlan> {
    OperationPlanner::new(work_dir, command)
        .plan(changed)
        .context("operation")
}

fn cmd_graph(work_dir: &Path, command: Command, changed: &[String], json: bool) -> Result<i32> {
    let plan = plan(work_dir, command, changed)?;
    if json {
        let payload = serde_json::to_string_pretty(&plan).context("serialize plan json")?;
        println!("{payload}");
    } else {
        println!("{}", plan_summary(&plan));
    }
    Ok(exit_codes::OK)
}

fn cmd_deps(file: &Path) -> Result<i32> {
    for dep in read_dependencies(file)? {
        println!("{}", dep.display());
    }
    Ok(exit_codes::OK)
}

fn cmd_run<R: CodeRepository>(
    work_dir: &Path,
    base_branch: &str,
    command: Command,
    changed: &[String],
    repository: &R,
    settings: &Settings,
    report_file: Option<&Path>,
) -> Result<i32> {
    let plan = plan(work_dir, command, changed)?;
    println!("\n{RULE}\n");
    println!("{}", plan_summary(&plan));

    let cancel = CancellationToken::new();
    install_signal_handler(cancel.clone())?;

    println!("\n{RULE}\n");
    println!("Running operations in order\n");
    let executor = ProcessExecutor::new(&settings.tool).echo(settings.echo_output);
    let mut runner = BatchRunner::new(&plan, repository, &executor, base_branch, cancel);
    let status = runner.run().context("run operation")?;
    if status == RunStatus::Cancelled {
        println!("Operation cancelled.");
    }

    println!("\n{RULE}\n");
    println!("{}", runner.summary());

    let report = report(&plan, runner.results());
    if let Some(path) = report_file {
        write_report(path, &report)?;
    }
    if settings.export.envman {
        export_envman(&settings.export.key, &report)?;
    }
    info!(?status, "done");
    Ok(exit_codes::OK)
}
