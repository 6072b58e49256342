//! Implementation of the `postcrew show` command.
//!
//! Displays the definition of a catalog task: agent, dependencies,
//! placeholders, templates and output contract.

use super::Project;
use crate::cli::ShowArgs;
use crate::error::{PostcrewError, Result};

/// Execute the `postcrew show` command.
pub fn cmd_show(project: &Project, args: ShowArgs) -> Result<()> {
    let def = project.store.get(&args.task)?;

    println!("================================================================================");
    println!("{}", def.name);
    println!("================================================================================");
    println!();

    println!(
        "Agent:        {}",
        def.agent.as_deref().unwrap_or("(default)")
    );
    if !def.depends_on.is_empty() {
        println!("Depends on:   {}", def.depends_on.join(", "));
    }
    if let Some(key) = &def.output_key {
        println!("Output key:   {}", key);
    }

    let placeholders = def.placeholders();
    if !placeholders.is_empty() {
        println!("Placeholders: {}", placeholders.join(", "));
    }
    for (name, value) in &def.defaults {
        println!("Default:      {} = {}", name, value);
    }

    println!();
    println!("Description:");
    println!("{}", def.description.source().trim_end());
    println!();
    println!("Expected output:");
    println!("{}", def.expected_output.source().trim_end());

    let contract = def.contract.spec();
    if !contract.is_empty() {
        println!();
        println!("Contract:");
        let yaml = serde_yaml::to_string(contract).map_err(|e| {
            PostcrewError::UserError(format!("failed to render contract: {}", e))
        })?;
        for line in yaml.lines() {
            println!("  {}", line);
        }
    }

    Ok(())
}
