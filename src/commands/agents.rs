//! Implementation of the `postcrew agents` command.

use super::Project;
use crate::error::Result;

/// List configured agent profiles.
pub fn cmd_agents(project: &Project) -> Result<()> {
    let config = &project.agents;
    if !config.has_agents() {
        println!("No agents configured.");
        return Ok(());
    }

    println!("Configured agents:");
    println!();

    for (id, profile) in config.iter() {
        let default_marker = if profile.default { " (default)" } else { "" };
        println!("  {}{}", id, default_marker);
        if !profile.role.is_empty() {
            println!("    Role:    {}", profile.role);
        }
        if !profile.goal.is_empty() {
            println!("    Goal:    {}", profile.goal);
        }
        println!("    Command: {}", profile.command);
        println!(
            "    Timeout: {}s",
            profile.effective_timeout(&config.defaults)
        );

        let tasks: Vec<&str> = project
            .store
            .iter()
            .filter(|def| match &def.agent {
                Some(agent) => agent == id,
                None => profile.default,
            })
            .map(|def| def.name.as_str())
            .collect();
        if !tasks.is_empty() {
            println!("    Tasks:   {}", tasks.join(", "));
        }
        println!();
    }

    Ok(())
}
