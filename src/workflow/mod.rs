//! Workflow execution.
//!
//! - **Graph**: resolves requested task names into a dependency plan
//! - **Engine**: binds, executes and validates nodes as their prerequisites complete
//! - **Retry**: shared retry budget with exponential backoff for agent faults
//! - **Run**: per-node reports and the finalized [`WorkflowRun`]

mod engine;
mod graph;
mod retry;
mod run;

#[cfg(test)]
mod tests;

pub use engine::{EngineSettings, WorkflowEngine};
pub use graph::{Plan, PlanNode};
pub use retry::RetryPolicy;
pub use run::{
    FailureCause, NodeReport, NodeState, NodeStatus, RunStatus, WorkflowRun, new_run_id,
};
