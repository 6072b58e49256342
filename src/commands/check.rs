//! Implementation of the `postcrew check` command.

use super::Project;
use crate::agent::resolve_agent;
use crate::cli::CheckArgs;
use crate::error::{PostcrewError, Result};
use crate::template::ParameterSet;
use crate::workflow::Plan;
use std::path::Path;

/// Execute the `postcrew check` command.
///
/// Loading the project already validated config, agents and catalog. With
/// task names, also resolves each task's agent and checks that the given
/// parameters bind every placeholder.
pub fn cmd_check(project: &Project, args: CheckArgs) -> Result<()> {
    println!("Config:  {}", describe(&project.ctx.config_path(), "defaults"));
    println!(
        "Agents:  {} profile(s) from {}",
        project.agents.iter().count(),
        describe(&project.ctx.agents_path(&project.config), "built-in")
    );
    println!(
        "Catalog: {} task(s) from {}",
        project.store.len(),
        describe(&project.ctx.catalog_path(&project.config), "built-in")
    );

    if args.tasks.is_empty() {
        println!();
        println!("OK");
        return Ok(());
    }

    let params = ParameterSet::from_assignments(&args.params)?;
    let plan = Plan::build(&project.store, &args.tasks)?;
    for node in plan.nodes() {
        let binding = resolve_agent(node.name(), node.definition.agent.as_deref(), &project.agents)?;
        println!("  {:<20} agent: {}", node.name(), binding.agent_id);
    }

    let missing = plan.missing_parameters(&params);
    if !missing.is_empty() {
        return Err(PostcrewError::MissingParameters(missing));
    }

    println!();
    println!("OK: {} task(s) bind with the given parameters", plan.len());
    Ok(())
}

fn describe(path: &Path, fallback: &str) -> String {
    if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (not found, using {})", path.display(), fallback)
    }
}
