//! Human-readable rendering of plans and run results.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::core::types::{OperationBatch, OperationKind, OperationPlan};

pub const RULE: &str = "=================================================";

/// Batch-by-batch listing of the plan.
pub fn plan_summary(plan: &OperationPlan) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "\nOperation plan for command \"{}\" includes {} batches.\nWill be run in the root directory {}.\n\n",
        plan.command,
        plan.batches.len(),
        plan.common_root
    );
    for (idx, batch) in plan.batches.iter().enumerate() {
        let _ = writeln!(out, "\n> Batch #{idx}:");
        out.push_str(&batch_summary(plan, batch));
        out.push('\n');
    }
    out
}

fn batch_summary(plan: &OperationPlan, batch: &OperationBatch) -> String {
    batch
        .operations
        .iter()
        .map(|op| {
            let marker = if op.kind == OperationKind::Destroy {
                " [!!! DESTROY !!!] "
            } else {
                ""
            };
            format!("- {marker}{}", plan.relative(&op.directory))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Summary block for one directory, built from its extracted key lines.
pub fn command_summary(plan: &OperationPlan, directory: &Path, lines: &[String]) -> String {
    format!(
        "### Operation \"{}\" key points:\n(in directory {})\n\n{}\n\n-------------------------------------\n\n",
        plan.command,
        plan.relative(directory),
        lines.join("\n...\n")
    )
}

/// Per-directory results in plan order.
pub fn results_summary(plan: &OperationPlan, results: &HashMap<PathBuf, String>) -> String {
    let mut out = format!(
        "Execution results of command \"{}\":\nRan in the root directory {}.\n\n",
        plan.command, plan.common_root
    );
    for op in plan.operations() {
        if let Some(summary) = results.get(&op.directory) {
            out.push_str(summary);
        }
    }
    out
}

/// Combined report handed to the calling environment.
pub fn report(plan: &OperationPlan, results: &HashMap<PathBuf, String>) -> String {
    format!(
        "\n===================   TERRAGRUNT {}  ========================\n\n{}\n\n=======================  RESULTS  ===========================\n\n{}\n",
        plan.command.as_str().to_uppercase(),
        plan_summary(plan),
        results_summary(plan, results)
    )
}
