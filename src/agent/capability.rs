//! The seam between the engine and whatever produces task output.

use crate::agent::TaskResult;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Why an agent call produced no output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentFault {
    /// Transport, process or availability failure.
    #[error("agent unavailable: {0}")]
    Unavailable(String),

    #[error("agent did not answer within {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("agent call was cancelled")]
    Cancelled,
}

/// Everything an agent needs for one attempt at a bound task.
#[derive(Debug, Clone, Copy)]
pub struct AgentRequest<'a> {
    pub run_id: &'a str,
    pub task: &'a str,
    /// Agent profile named by the task definition.
    pub agent: Option<&'a str>,
    /// Bound description followed by the bound expected output.
    pub instruction: &'a str,
    pub description: &'a str,
    pub expected_output: &'a str,
    /// Validated results of the task's prerequisites.
    pub context: &'a [Arc<TaskResult>],
    /// 1-based attempt number.
    pub attempt: u32,
    pub cancel: &'a CancellationToken,
}

/// An external capability that turns an instruction into text.
///
/// Implementations must not interpret or repair content; validation belongs
/// to the output contract.
#[async_trait]
pub trait AgentCapability: Send + Sync {
    async fn run(&self, request: AgentRequest<'_>) -> Result<String, AgentFault>;
}
