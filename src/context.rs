//! Project context resolution for postcrew.
//!
//! Finds the project root from any working directory and resolves the paths
//! every command works with: `postcrew.yaml`, the catalog and agent files it
//! names, and the `.postcrew/` state directory holding the event journal and
//! per-run agent files.

use crate::config::Config;
use crate::error::{PostcrewError, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Project configuration file name.
pub const CONFIG_FILE: &str = "postcrew.yaml";

/// State directory name relative to the project root.
pub const STATE_DIR: &str = ".postcrew";

/// Resolved paths for a postcrew project. All paths are absolute.
#[derive(Debug, Clone)]
pub struct ProjectContext {
    /// The project root: the nearest ancestor holding `postcrew.yaml` or
    /// `.postcrew/`, else the starting directory.
    pub root: PathBuf,

    /// Absolute path to the state directory (`{root}/.postcrew/`).
    pub state_dir: PathBuf,

    /// Absolute path to per-run agent files (`{root}/.postcrew/runs/`).
    pub runs_dir: PathBuf,
}

impl ProjectContext {
    /// Resolve the project context from `root`, or from the current working
    /// directory when `root` is `None`.
    ///
    /// An explicit root is used as is; it must be an existing directory.
    pub fn resolve(root: Option<&Path>) -> Result<Self> {
        match root {
            Some(root) => {
                if !root.is_dir() {
                    return Err(PostcrewError::UserError(format!(
                        "project root '{}' is not a directory",
                        root.display()
                    )));
                }
                Ok(Self::at(absolute(root)?))
            }
            None => {
                let cwd = env::current_dir().map_err(|e| {
                    PostcrewError::UserError(format!(
                        "failed to get current working directory: {}",
                        e
                    ))
                })?;
                Ok(Self::resolve_from(&cwd))
            }
        }
    }

    /// Resolve the project context by searching upward from `cwd`.
    pub fn resolve_from<P: AsRef<Path>>(cwd: P) -> Self {
        let cwd = cwd.as_ref();
        let root = cwd
            .ancestors()
            .find(|dir| dir.join(CONFIG_FILE).is_file() || dir.join(STATE_DIR).is_dir())
            .unwrap_or(cwd);
        Self::at(root.to_path_buf())
    }

    fn at(root: PathBuf) -> Self {
        let state_dir = root.join(STATE_DIR);
        let runs_dir = state_dir.join("runs");
        Self {
            root,
            state_dir,
            runs_dir,
        }
    }

    /// Get the path to the config file.
    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// Load `postcrew.yaml`, falling back to defaults when absent.
    pub fn load_config(&self) -> Result<Config> {
        Config::load_or_default(self.config_path())
    }

    /// Get the path to the task catalog named by `config`.
    pub fn catalog_path(&self, config: &Config) -> PathBuf {
        self.root.join(&config.catalog)
    }

    /// Get the path to the agent profiles named by `config`.
    pub fn agents_path(&self, config: &Config) -> PathBuf {
        self.root.join(&config.agents)
    }

    /// Get the path to the events directory.
    pub fn events_dir(&self) -> PathBuf {
        self.state_dir.join("events")
    }

    /// Get the path to the main events log file.
    pub fn events_file(&self) -> PathBuf {
        self.events_dir().join("events.ndjson")
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|e| {
        PostcrewError::UserError(format!(
            "failed to resolve project root '{}': {}",
            path.display(),
            e
        ))
    })
}
