//! Run records: per-node outcomes and the finalized run.

use crate::contract::ContractViolation;
use crate::template::ParameterSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a node failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureCause {
    /// A placeholder had no parameter, upstream result or default.
    UnboundPlaceholder { placeholder: String },
    /// The last attempt's output violated the contract.
    ContractViolation { violations: Vec<ContractViolation> },
    /// The agent failed, timed out or could not be reached.
    AgentUnavailable { message: String },
    /// The run was cancelled before the node finished.
    Cancelled,
    /// A prerequisite failed, so the node never ran.
    DependencyFailed { dependency: String },
}

impl FailureCause {
    /// Whether another attempt with the same bound instruction may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FailureCause::ContractViolation { .. } | FailureCause::AgentUnavailable { .. }
        )
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::UnboundPlaceholder { placeholder } => {
                write!(f, "unbound placeholder '{{{}}}'", placeholder)
            }
            FailureCause::ContractViolation { violations } => {
                write!(f, "output contract violated: ")?;
                for (i, violation) in violations.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{}", violation)?;
                }
                Ok(())
            }
            FailureCause::AgentUnavailable { message } => write!(f, "{}", message),
            FailureCause::Cancelled => write!(f, "cancelled"),
            FailureCause::DependencyFailed { dependency } => {
                write!(f, "dependency '{}' failed", dependency)
            }
        }
    }
}

/// Live state of a node while the run is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Pending,
    Binding,
    Executing,
    Validating,
    Completed,
    Failed,
}

impl NodeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, NodeState::Completed | NodeState::Failed)
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeState::Pending => "pending",
            NodeState::Binding => "binding",
            NodeState::Executing => "executing",
            NodeState::Validating => "validating",
            NodeState::Completed => "completed",
            NodeState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Final status of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Completed,
    Failed,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NodeStatus::Completed => "completed",
            NodeStatus::Failed => "failed",
        })
    }
}

/// Final status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every requested node completed.
    Completed,
    /// At least one node failed.
    Failed,
    /// The run was cancelled.
    Cancelled,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Outcome of one requested task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeReport {
    pub task: String,
    pub status: NodeStatus,

    /// Agent calls made, including the first.
    pub attempts: u32,
    /// Attempts beyond the first.
    pub retries: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<FailureCause>,

    /// Validated output; never present on a failed node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Headlines of the list items found in the output.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<usize>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hashtags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl NodeReport {
    pub fn is_completed(&self) -> bool {
        self.status == NodeStatus::Completed
    }
}

/// Finalized record of one workflow execution.
///
/// Nodes appear in request order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    pub parameters: ParameterSet,
    pub nodes: Vec<NodeReport>,
}

impl WorkflowRun {
    pub fn node(&self, task: &str) -> Option<&NodeReport> {
        self.nodes.iter().find(|n| n.task == task)
    }

    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn failed_nodes(&self) -> impl Iterator<Item = &NodeReport> {
        self.nodes.iter().filter(|n| !n.is_completed())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Generate a run identifier: UTC timestamp plus process id.
pub fn new_run_id() -> String {
    format!("{}-{}", Utc::now().format("%Y%m%dT%H%M%S%3f"), std::process::id())
}
