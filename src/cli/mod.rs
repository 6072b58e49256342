//! CLI argument parsing for postcrew.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Postcrew: task templating and workflow engine for a LinkedIn content pipeline.
///
/// Tasks are declared in a YAML catalog with `{placeholder}` templates and an
/// output contract. A run binds the requested tasks, hands them to agents in
/// dependency order, and validates every result before passing it on.
#[derive(Parser, Debug)]
#[command(name = "postcrew")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Project root (default: nearest directory with postcrew.yaml or .postcrew/).
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace). Overridden by RUST_LOG.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for postcrew.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run tasks from the catalog.
    ///
    /// Checks every placeholder first, then runs the tasks in dependency
    /// order. Ctrl-C cancels the run.
    Run(RunArgs),

    /// List catalog tasks in declaration order.
    #[command(alias = "ls")]
    List,

    /// Show the definition of a catalog task.
    Show(ShowArgs),

    /// Validate config, agents and catalog.
    ///
    /// With task names, also checks that the given parameters bind them.
    Check(CheckArgs),

    /// List configured agent profiles.
    Agents,
}

/// Arguments for the `run` command.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Task names to run, e.g. `research_topic create_content`.
    #[arg(required = true)]
    pub tasks: Vec<String>,

    /// Template parameter as key=value (repeatable).
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Print the bound instructions without running any agent.
    #[arg(long)]
    pub dry_run: bool,

    /// Write the run report as JSON to FILE.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Print the run report as JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `show` command.
#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Task name (e.g., research_topic).
    pub task: String,
}

/// Arguments for the `check` command.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Tasks to preflight against the given parameters.
    pub tasks: Vec<String>,

    /// Template parameter as key=value (repeatable).
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_debug_assert() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_run_full() {
        let cli = Cli::try_parse_from([
            "postcrew",
            "run",
            "research_topic",
            "create_content",
            "-p",
            "topic=remote work productivity",
            "--param",
            "tone=casual",
            "--output",
            "run.json",
        ])
        .unwrap();
        if let Command::Run(args) = cli.command {
            assert_eq!(args.tasks, vec!["research_topic", "create_content"]);
            assert_eq!(
                args.params,
                vec!["topic=remote work productivity", "tone=casual"]
            );
            assert_eq!(args.output, Some(PathBuf::from("run.json")));
            assert!(!args.dry_run);
            assert!(!args.json);
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn parse_run_requires_a_task() {
        assert!(Cli::try_parse_from(["postcrew", "run"]).is_err());
    }

    #[test]
    fn parse_run_dry_run_json() {
        let cli =
            Cli::try_parse_from(["postcrew", "run", "daily_summary", "--dry-run", "--json"])
                .unwrap();
        if let Command::Run(args) = cli.command {
            assert!(args.dry_run);
            assert!(args.json);
            assert!(args.params.is_empty());
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn parse_list_and_alias() {
        let cli = Cli::try_parse_from(["postcrew", "list"]).unwrap();
        assert!(matches!(cli.command, Command::List));
        let cli = Cli::try_parse_from(["postcrew", "ls"]).unwrap();
        assert!(matches!(cli.command, Command::List));
    }

    #[test]
    fn parse_show() {
        let cli = Cli::try_parse_from(["postcrew", "show", "find_leads"]).unwrap();
        if let Command::Show(args) = cli.command {
            assert_eq!(args.task, "find_leads");
        } else {
            panic!("Expected Show command");
        }
    }

    #[test]
    fn parse_check_with_tasks() {
        let cli =
            Cli::try_parse_from(["postcrew", "check", "research_topic", "-p", "topic=ai"]).unwrap();
        if let Command::Check(args) = cli.command {
            assert_eq!(args.tasks, vec!["research_topic"]);
            assert_eq!(args.params, vec!["topic=ai"]);
        } else {
            panic!("Expected Check command");
        }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from(["postcrew", "agents", "--root", "/tmp/p", "-vv"]).unwrap();
        assert!(matches!(cli.command, Command::Agents));
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/p")));
        assert_eq!(cli.verbose, 2);
    }
}
