//! Run event journal.
//!
//! Every workflow run appends audit events in NDJSON format (one JSON object
//! per line) to `.postcrew/events/events.ndjson`.
//!
//! # Event Format
//!
//! Each event is a JSON object with the following fields:
//! - `ts`: RFC3339 timestamp
//! - `action`: What happened (run_started, attempt_started, node_failed, ...)
//! - `actor`: The owner string (e.g., `user@HOST`)
//! - `run_id`: Run the event belongs to
//! - `task`: Optional task name for node events
//! - `details`: Freeform object with action-specific details
//!
//! # Usage
//!
//! ```no_run
//! use postcrew::events::{Event, EventAction, EventJournal};
//! use serde_json::json;
//!
//! let journal = EventJournal::new(".postcrew/events/events.ndjson");
//! let event = Event::new(EventAction::RunStarted, "20260101T120000-42")
//!     .with_details(json!({"tasks": ["research_topic"]}));
//! journal.append(&event)?;
//! # Ok::<(), postcrew::error::PostcrewError>(())
//! ```

use crate::error::{PostcrewError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Actions that can be logged as events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    RunStarted,
    RunFinished,
    /// A node's templates were resolved.
    NodeBound,
    AttemptStarted,
    /// An attempt's output failed its contract.
    ContractViolation,
    /// An attempt failed in the agent itself.
    AgentFault,
    NodeCompleted,
    NodeFailed,
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventAction::RunStarted => "run_started",
            EventAction::RunFinished => "run_finished",
            EventAction::NodeBound => "node_bound",
            EventAction::AttemptStarted => "attempt_started",
            EventAction::ContractViolation => "contract_violation",
            EventAction::AgentFault => "agent_fault",
            EventAction::NodeCompleted => "node_completed",
            EventAction::NodeFailed => "node_failed",
        };
        f.write_str(name)
    }
}

/// An event record for the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub ts: DateTime<Utc>,
    pub action: EventAction,
    pub actor: String,
    pub run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    pub details: Value,
}

impl Event {
    /// Create a new event stamped with the current time and actor.
    pub fn new(action: EventAction, run_id: impl Into<String>) -> Self {
        Self {
            ts: Utc::now(),
            action,
            actor: get_actor_string(),
            run_id: run_id.into(),
            task: None,
            details: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Serialize the event to a single-line JSON string.
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| PostcrewError::UserError(format!("failed to serialize event to JSON: {}", e)))
    }
}

/// Get the actor string for event metadata.
fn get_actor_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}

/// Append-only NDJSON event file shared by the nodes of a run.
///
/// Appends from concurrent nodes are serialized so lines never interleave.
#[derive(Debug)]
pub struct EventJournal {
    path: PathBuf,
    lock: Mutex<()>,
}

impl EventJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event as a single line.
    ///
    /// The file and its directory are created if missing.
    pub fn append(&self, event: &Event) -> Result<()> {
        let json_line = event.to_ndjson_line()?;
        let _guard = self.lock.lock().unwrap_or_else(|poison| poison.into_inner());

        if let Some(dir) = self.path.parent()
            && !dir.exists()
        {
            fs::create_dir_all(dir).map_err(|e| {
                PostcrewError::UserError(format!(
                    "failed to create events directory '{}': {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                PostcrewError::UserError(format!(
                    "failed to open events file '{}': {}",
                    self.path.display(),
                    e
                ))
            })?;

        writeln!(file, "{}", json_line).map_err(|e| {
            PostcrewError::UserError(format!(
                "failed to write event to '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(())
    }

    /// Read every event back, oldest first.
    pub fn read_all(&self) -> Result<Vec<Event>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path).map_err(|e| {
            PostcrewError::UserError(format!(
                "failed to read events file '{}': {}",
                self.path.display(),
                e
            ))
        })?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| {
                    PostcrewError::UserError(format!("malformed event line: {}", e))
                })
            })
            .collect()
    }
}
