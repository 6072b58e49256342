//! Command implementations for postcrew.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations, and the project loading every command shares.

mod agents;
mod check;
mod list;
mod run;
mod show;

use crate::agent::AgentsConfig;
use crate::catalog::TemplateStore;
use crate::cli::Command;
use crate::config::Config;
use crate::context::ProjectContext;
use crate::error::Result;
use std::path::Path;
use tracing::debug;

/// Everything a command needs from the project on disk.
pub struct Project {
    pub ctx: ProjectContext,
    pub config: Config,
    pub store: TemplateStore,
    pub agents: AgentsConfig,
}

impl Project {
    /// Resolve the project and load config, agents and catalog.
    ///
    /// Missing catalog and agent files fall back to the built-in ones. Every
    /// task's agent must exist in the agent profiles.
    pub fn load(root: Option<&Path>) -> Result<Self> {
        let ctx = ProjectContext::resolve(root)?;
        let config = ctx.load_config()?;
        let agents = AgentsConfig::load_or_builtin(ctx.agents_path(&config))?;
        let store = TemplateStore::load_or_builtin(ctx.catalog_path(&config))?;
        store.check_agents(&agents)?;
        debug!(
            root = %ctx.root.display(),
            tasks = store.len(),
            "project loaded"
        );

        Ok(Self {
            ctx,
            config,
            store,
            agents,
        })
    }
}

/// Dispatch a command to its implementation.
pub async fn dispatch(root: Option<&Path>, command: Command) -> Result<()> {
    let project = Project::load(root)?;
    match command {
        Command::Run(args) => run::cmd_run(project, args).await,
        Command::List => list::cmd_list(&project),
        Command::Show(args) => show::cmd_show(&project, args),
        Command::Check(args) => check::cmd_check(&project, args),
        Command::Agents => agents::cmd_agents(&project),
    }
}
