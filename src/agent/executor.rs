//! Task execution against an agent capability.

use crate::agent::capability::{AgentCapability, AgentFault, AgentRequest};
use crate::template::BoundTask;
use crate::workflow::FailureCause;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Outcome status of a single execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Succeeded,
    Failed,
}

/// Raw value an agent produced for one bound task.
///
/// A failed result carries a cause and never an output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task: String,
    pub status: ResultStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<FailureCause>,
}

impl TaskResult {
    pub fn succeeded(task: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            status: ResultStatus::Succeeded,
            output: Some(output.into()),
            cause: None,
        }
    }

    pub fn failed(task: impl Into<String>, cause: FailureCause) -> Self {
        Self {
            task: task.into(),
            status: ResultStatus::Failed,
            output: None,
            cause: Some(cause),
        }
    }

    /// Output text, present only on success.
    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Succeeded
    }
}

/// Runs bound tasks through a capability.
///
/// The executor neither interprets content nor retries; both belong to the
/// workflow engine.
#[derive(Clone)]
pub struct TaskExecutor {
    capability: Arc<dyn AgentCapability>,
}

impl TaskExecutor {
    pub fn new(capability: Arc<dyn AgentCapability>) -> Self {
        Self { capability }
    }

    /// Execute one attempt of `bound`.
    pub async fn execute(
        &self,
        run_id: &str,
        bound: &BoundTask,
        attempt: u32,
        cancel: &CancellationToken,
    ) -> TaskResult {
        let instruction = bound.instruction();
        let context = bound.context.results();
        let request = AgentRequest {
            run_id,
            task: &bound.task,
            agent: bound.agent.as_deref(),
            instruction: &instruction,
            description: &bound.description,
            expected_output: &bound.expected_output,
            context: &context,
            attempt,
            cancel,
        };

        // Dropping the capability future on cancellation aborts the call.
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AgentFault::Cancelled),
            outcome = self.capability.run(request) => outcome,
        };

        match outcome {
            Ok(output) => TaskResult::succeeded(&bound.task, output),
            Err(AgentFault::Cancelled) => TaskResult::failed(&bound.task, FailureCause::Cancelled),
            Err(fault) => {
                debug!(task = %bound.task, attempt, error = %fault, "agent call failed");
                TaskResult::failed(
                    &bound.task,
                    FailureCause::AgentUnavailable {
                        message: fault.to_string(),
                    },
                )
            }
        }
    }
}
