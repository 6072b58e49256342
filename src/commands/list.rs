//! Implementation of the `postcrew list` command.

use super::Project;
use crate::error::Result;

/// List catalog tasks in declaration order with their placeholders.
pub fn cmd_list(project: &Project) -> Result<()> {
    for def in project.store.iter() {
        let placeholders = def.placeholders();
        let mut line = format!("{:<20}", def.name);
        if !placeholders.is_empty() {
            let names: Vec<String> = placeholders.iter().map(|p| format!("{{{}}}", p)).collect();
            line.push_str(&format!(" {}", names.join(" ")));
        }
        if !def.depends_on.is_empty() {
            line.push_str(&format!("  (after {})", def.depends_on.join(", ")));
        }
        println!("{}", line.trim_end());
    }
    Ok(())
}
