//! Implementation of the `postcrew run` command.

use super::Project;
use crate::agent::CommandCapability;
use crate::cli::RunArgs;
use crate::error::{PostcrewError, Result};
use crate::events::EventJournal;
use crate::template::{BoundTask, ParameterSet};
use crate::workflow::{NodeReport, NodeStatus, RunStatus, WorkflowEngine, WorkflowRun};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Execute the `postcrew run` command.
///
/// 1. Parses `-p key=value` parameters
/// 2. Builds the engine from config, agents and catalog
/// 3. Runs the tasks (or prints bound instructions on `--dry-run`)
/// 4. Reports the run and maps its status to the exit code
pub async fn cmd_run(project: Project, args: RunArgs) -> Result<()> {
    let params = ParameterSet::from_assignments(&args.params)?;
    let Project {
        ctx,
        config,
        store,
        agents,
    } = project;

    let capability = CommandCapability::new(agents, ctx.runs_dir.clone(), ctx.root.clone());
    let mut engine = WorkflowEngine::new(Arc::new(store), Arc::new(capability))
        .with_settings(config.engine_settings());
    if config.record_events {
        engine = engine.with_journal(Arc::new(EventJournal::new(ctx.events_file())));
    }

    if args.dry_run {
        let bound = engine.dry_run(&args.tasks, &params)?;
        print_bound(&bound);
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling run");
                cancel.cancel();
            }
        })
    };

    let run = engine
        .run_workflow_with_cancel(&args.tasks, &params, cancel)
        .await;
    interrupt.abort();
    let run = run?;

    if let Some(path) = &args.output {
        write_report(path, &run)?;
    }

    if args.json {
        println!("{}", report_json(&run)?);
    } else {
        print_run(&run);
    }

    match run.status {
        RunStatus::Completed => Ok(()),
        RunStatus::Cancelled => Err(PostcrewError::Cancelled),
        RunStatus::Failed => Err(PostcrewError::WorkflowFailed {
            failed: run.failed_nodes().count(),
        }),
    }
}

fn report_json(run: &WorkflowRun) -> Result<String> {
    run.to_json()
        .map_err(|e| PostcrewError::UserError(format!("failed to serialize run report: {}", e)))
}

fn write_report(path: &Path, run: &WorkflowRun) -> Result<()> {
    let json = report_json(run)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            PostcrewError::UserError(format!(
                "failed to create directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }
    std::fs::write(path, json + "\n").map_err(|e| {
        PostcrewError::UserError(format!(
            "failed to write run report '{}': {}",
            path.display(),
            e
        ))
    })
}

fn print_bound(bound: &[BoundTask]) {
    for (i, task) in bound.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("================================================================================");
        match &task.agent {
            Some(agent) => println!("{} (agent: {})", task.task, agent),
            None => println!("{} (agent: default)", task.task),
        }
        println!("================================================================================");
        println!("{}", task.instruction());
    }
}

fn print_run(run: &WorkflowRun) {
    println!("Run {} {}", run.run_id, run.status);
    println!();

    for node in &run.nodes {
        println!("{}", node_summary(node));
    }

    for node in run.nodes.iter().filter(|n| n.output.is_some()) {
        println!();
        println!("--- {} ---", node.task);
        if let Some(output) = &node.output {
            println!("{}", output.trim_end());
        }
    }
}

fn node_summary(node: &NodeReport) -> String {
    let mut line = format!("  {:<20} {:<9}", node.task, node.status.to_string());
    match node.status {
        NodeStatus::Completed => {
            line.push_str(&format!(" attempts: {}", node.attempts));
            if let Some(words) = node.word_count {
                line.push_str(&format!(", words: {}", words));
            }
            if !node.items.is_empty() {
                line.push_str(&format!(", items: {}", node.items.len()));
            }
            if !node.hashtags.is_empty() {
                line.push_str(&format!(", hashtags: {}", node.hashtags.join(" ")));
            }
        }
        NodeStatus::Failed => {
            if let Some(cause) = &node.cause {
                line.push_str(&format!(" {}", cause));
            }
            if node.retries > 0 {
                line.push_str(&format!(" (after {} retries)", node.retries));
            }
        }
    }
    line
}
