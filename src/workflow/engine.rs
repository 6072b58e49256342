//! Workflow engine: drives requested tasks through bind, execute and validate.
//!
//! # Node Lifecycle
//!
//! ```text
//! Pending -> Binding -> Executing -> Validating -> Completed
//!                \           \            \
//!                 `-----------`------------`----> Failed
//! ```
//!
//! A node is bound only once every dependency is `Completed`. Ready nodes
//! start in request order and run concurrently, bounded by the concurrency
//! limit. A failed node fails its dependents with `DependencyFailed`;
//! independent branches carry on.

use super::graph::Plan;
use super::retry::RetryPolicy;
use super::run::{
    FailureCause, NodeReport, NodeState, NodeStatus, RunStatus, WorkflowRun, new_run_id,
};
use crate::agent::{AgentCapability, TaskExecutor, TaskResult};
use crate::catalog::{TaskDefinition, TemplateStore};
use crate::contract::ValidatedResult;
use crate::error::{PostcrewError, Result};
use crate::events::{Event, EventAction, EventJournal};
use crate::template::{BoundTask, ParameterSet, UpstreamContext, bind};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Engine tuning, normally taken from `postcrew.yaml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub retry: RetryPolicy,
    /// Maximum agent calls in flight at once.
    pub concurrency_limit: usize,
    /// Check every placeholder before any node starts.
    pub preflight: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            concurrency_limit: 2,
            preflight: true,
        }
    }
}

/// Runs workflows over an immutable catalog.
pub struct WorkflowEngine {
    store: Arc<TemplateStore>,
    executor: TaskExecutor,
    settings: EngineSettings,
    journal: Option<Arc<EventJournal>>,
}

/// Mutable bookkeeping for one node, owned by the driver loop.
struct NodeSlot {
    state: NodeState,
    attempts: u32,
    cause: Option<FailureCause>,
    result: Option<Arc<TaskResult>>,
    validated: Option<ValidatedResult>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl NodeSlot {
    fn pending() -> Self {
        Self {
            state: NodeState::Pending,
            attempts: 0,
            cause: None,
            result: None,
            validated: None,
            started_at: None,
            finished_at: None,
        }
    }

    fn fail(&mut self, cause: FailureCause) {
        self.state = NodeState::Failed;
        self.cause = Some(cause);
        self.finished_at = Some(Utc::now());
    }
}

/// What a node's attempts produced.
struct NodeOutcome {
    index: usize,
    attempts: u32,
    result: std::result::Result<(Arc<TaskResult>, ValidatedResult), FailureCause>,
}

impl WorkflowEngine {
    pub fn new(store: Arc<TemplateStore>, capability: Arc<dyn AgentCapability>) -> Self {
        Self {
            store,
            executor: TaskExecutor::new(capability),
            settings: EngineSettings::default(),
            journal: None,
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Record run events to `journal`.
    pub fn with_journal(mut self, journal: Arc<EventJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Check that every placeholder of every requested task can be resolved.
    ///
    /// Returns the complete list of missing parameters at once.
    pub fn preflight<S: AsRef<str>>(&self, tasks: &[S], parameters: &ParameterSet) -> Result<()> {
        let plan = Plan::build(&self.store, tasks)?;
        check_parameters(&plan, parameters)
    }

    /// Bind every requested task without executing anything.
    ///
    /// Outputs of upstream tasks are stood in for by `<output of TASK>`.
    pub fn dry_run<S: AsRef<str>>(
        &self,
        tasks: &[S],
        parameters: &ParameterSet,
    ) -> Result<Vec<BoundTask>> {
        let plan = Plan::build(&self.store, tasks)?;
        check_parameters(&plan, parameters)?;

        plan.nodes()
            .iter()
            .map(|node| {
                let mut upstream = UpstreamContext::new();
                for &j in &node.upstream {
                    let dep = &plan.nodes()[j].definition;
                    upstream.push(
                        dep.output_key.clone(),
                        Arc::new(TaskResult::succeeded(
                            &dep.name,
                            format!("<output of {}>", dep.name),
                        )),
                    );
                }
                bind(&node.definition, parameters, &upstream).map_err(PostcrewError::from)
            })
            .collect()
    }

    /// Run `tasks` to completion.
    pub async fn run_workflow<S: AsRef<str>>(
        &self,
        tasks: &[S],
        parameters: &ParameterSet,
    ) -> Result<WorkflowRun> {
        self.run_workflow_with_cancel(tasks, parameters, CancellationToken::new())
            .await
    }

    /// Run `tasks` until they finish or `cancel` fires.
    ///
    /// Caller errors (unknown or duplicate names, unrequested dependencies,
    /// missing parameters under preflight) are returned before any node
    /// starts. Node failures are recorded in the returned run.
    pub async fn run_workflow_with_cancel<S: AsRef<str>>(
        &self,
        tasks: &[S],
        parameters: &ParameterSet,
        cancel: CancellationToken,
    ) -> Result<WorkflowRun> {
        let plan = Plan::build(&self.store, tasks)?;
        if self.settings.preflight {
            check_parameters(&plan, parameters)?;
        }

        let run_id = new_run_id();
        let started_at = Utc::now();
        let names: Vec<&str> = plan.nodes().iter().map(|n| n.name()).collect();
        info!(run = %run_id, tasks = ?names, "workflow run started");
        self.record(
            Event::new(EventAction::RunStarted, &run_id)
                .with_details(json!({ "tasks": names, "parameters": parameters })),
        );

        let semaphore = Semaphore::new(self.settings.concurrency_limit.max(1));
        let mut slots: Vec<NodeSlot> = (0..plan.len()).map(|_| NodeSlot::pending()).collect();
        let mut in_flight = FuturesUnordered::new();

        loop {
            if !cancel.is_cancelled() {
                for index in 0..slots.len() {
                    if slots[index].state != NodeState::Pending {
                        continue;
                    }
                    let node = &plan.nodes()[index];
                    if !node
                        .depends_on
                        .iter()
                        .all(|&d| slots[d].state == NodeState::Completed)
                    {
                        continue;
                    }

                    let slot = &mut slots[index];
                    slot.state = NodeState::Binding;
                    slot.started_at = Some(Utc::now());
                    debug!(run = %run_id, task = %node.name(), state = %slot.state, "node ready");

                    let mut upstream = UpstreamContext::new();
                    for &j in &node.upstream {
                        if let Some(result) = &slots[j].result {
                            upstream.push(
                                plan.nodes()[j].definition.output_key.clone(),
                                Arc::clone(result),
                            );
                        }
                    }

                    match bind(&node.definition, parameters, &upstream) {
                        Ok(bound) => {
                            self.record(
                                Event::new(EventAction::NodeBound, &run_id)
                                    .with_task(node.name())
                                    .with_details(json!({ "context": upstream.len() })),
                            );
                            slots[index].state = NodeState::Executing;
                            in_flight.push(self.run_node(
                                index,
                                Arc::clone(&node.definition),
                                bound,
                                &run_id,
                                &semaphore,
                                &cancel,
                            ));
                        }
                        Err(err) => {
                            warn!(run = %run_id, task = %node.name(), error = %err, "binding failed");
                            self.finish_failed(
                                &run_id,
                                node.name(),
                                &mut slots[index],
                                FailureCause::UnboundPlaceholder {
                                    placeholder: err.placeholder,
                                },
                            );
                        }
                    }
                }
            }

            // Once cancelled, pending nodes are swept up as cancelled below.
            if !cancel.is_cancelled() {
                self.propagate_failures(&plan, &mut slots, &run_id);
            }

            match in_flight.next().await {
                Some(outcome) => self.apply_outcome(&plan, &mut slots, outcome, &run_id),
                None => break,
            }
        }
        drop(in_flight);

        for (index, slot) in slots.iter_mut().enumerate() {
            if !slot.state.is_terminal() {
                let name = plan.nodes()[index].name();
                self.finish_failed(&run_id, name, slot, FailureCause::Cancelled);
            }
        }

        let nodes: Vec<NodeReport> = plan
            .nodes()
            .iter()
            .zip(slots)
            .map(|(node, slot)| report(node.name(), slot))
            .collect();

        let status = if nodes.iter().all(NodeReport::is_completed) {
            RunStatus::Completed
        } else if cancel.is_cancelled() {
            RunStatus::Cancelled
        } else {
            RunStatus::Failed
        };

        let failed = nodes.iter().filter(|n| !n.is_completed()).count();
        info!(run = %run_id, status = %status, failed, "workflow run finished");
        self.record(
            Event::new(EventAction::RunFinished, &run_id)
                .with_details(json!({ "status": status, "failed": failed })),
        );

        Ok(WorkflowRun {
            run_id,
            started_at,
            finished_at: Utc::now(),
            status,
            parameters: parameters.clone(),
            nodes,
        })
    }

    /// Execute and validate one bound node, retrying within budget.
    async fn run_node(
        &self,
        index: usize,
        definition: Arc<TaskDefinition>,
        bound: BoundTask,
        run_id: &str,
        semaphore: &Semaphore,
        cancel: &CancellationToken,
    ) -> NodeOutcome {
        let policy = self.settings.retry;
        let task = definition.name.as_str();
        let mut attempt: u32 = 0;

        loop {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = semaphore.acquire() => permit.ok(),
            };
            let Some(permit) = permit else {
                return NodeOutcome {
                    index,
                    attempts: attempt,
                    result: Err(FailureCause::Cancelled),
                };
            };

            attempt += 1;
            debug!(run = %run_id, task, attempt, state = %NodeState::Executing, "attempt started");
            self.record(
                Event::new(EventAction::AttemptStarted, run_id)
                    .with_task(task)
                    .with_details(json!({ "attempt": attempt })),
            );

            let result = self.executor.execute(run_id, &bound, attempt, cancel).await;
            drop(permit);

            let retries = attempt - 1;
            let cause = match result.cause.clone() {
                None => {
                    debug!(run = %run_id, task, attempt, state = %NodeState::Validating, "validating output");
                    match definition.contract.validate(&bound, &result) {
                        Ok(validated) => {
                            return NodeOutcome {
                                index,
                                attempts: attempt,
                                result: Ok((Arc::new(result), validated)),
                            };
                        }
                        Err(err) => {
                            warn!(run = %run_id, task, attempt, error = %err, "output violates contract");
                            self.record(
                                Event::new(EventAction::ContractViolation, run_id)
                                    .with_task(task)
                                    .with_details(json!({
                                        "attempt": attempt,
                                        "violations": err.violations,
                                    })),
                            );
                            FailureCause::ContractViolation {
                                violations: err.violations,
                            }
                        }
                    }
                }
                Some(FailureCause::AgentUnavailable { message }) => {
                    warn!(run = %run_id, task, attempt, error = %message, "agent call failed");
                    self.record(
                        Event::new(EventAction::AgentFault, run_id)
                            .with_task(task)
                            .with_details(json!({ "attempt": attempt, "message": message })),
                    );
                    FailureCause::AgentUnavailable { message }
                }
                Some(cause) => cause,
            };

            if !cause.is_retryable() || !policy.allows(retries) {
                return NodeOutcome {
                    index,
                    attempts: attempt,
                    result: Err(cause),
                };
            }

            if matches!(cause, FailureCause::AgentUnavailable { .. }) {
                let delay = policy.backoff(retries + 1);
                debug!(run = %run_id, task, delay_ms = delay.as_millis() as u64, "backing off");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        return NodeOutcome {
                            index,
                            attempts: attempt,
                            result: Err(FailureCause::Cancelled),
                        };
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    /// Write a node's outcome into its slot.
    fn apply_outcome(
        &self,
        plan: &Plan,
        slots: &mut [NodeSlot],
        outcome: NodeOutcome,
        run_id: &str,
    ) {
        let name = plan.nodes()[outcome.index].name();
        let slot = &mut slots[outcome.index];
        slot.attempts = outcome.attempts;

        match outcome.result {
            Ok((result, validated)) => {
                slot.state = NodeState::Completed;
                slot.finished_at = Some(Utc::now());
                info!(run = %run_id, task = %name, attempts = outcome.attempts, "task completed");
                self.record(
                    Event::new(EventAction::NodeCompleted, run_id)
                        .with_task(name)
                        .with_details(json!({
                            "attempts": outcome.attempts,
                            "word_count": validated.word_count,
                            "items": validated.items.len(),
                        })),
                );
                slot.result = Some(result);
                slot.validated = Some(validated);
            }
            Err(cause) => self.finish_failed(run_id, name, slot, cause),
        }
    }

    /// Fail every pending node downstream of a failed one.
    fn propagate_failures(&self, plan: &Plan, slots: &mut [NodeSlot], run_id: &str) {
        let mut failed: Vec<usize> = (0..slots.len())
            .filter(|&i| slots[i].state == NodeState::Failed)
            .collect();

        while let Some(index) = failed.pop() {
            for dependent in plan.dependents(index) {
                if slots[dependent].state != NodeState::Pending {
                    continue;
                }
                self.finish_failed(
                    run_id,
                    plan.nodes()[dependent].name(),
                    &mut slots[dependent],
                    FailureCause::DependencyFailed {
                        dependency: plan.nodes()[index].name().to_string(),
                    },
                );
                failed.push(dependent);
            }
        }
    }

    fn finish_failed(&self, run_id: &str, task: &str, slot: &mut NodeSlot, cause: FailureCause) {
        warn!(run = %run_id, task, attempts = slot.attempts, cause = %cause, "task failed");
        self.record(
            Event::new(EventAction::NodeFailed, run_id)
                .with_task(task)
                .with_details(json!({ "attempts": slot.attempts, "cause": cause })),
        );
        slot.fail(cause);
    }

    fn record(&self, event: Event) {
        if let Some(journal) = &self.journal
            && let Err(e) = journal.append(&event)
        {
            warn!(action = %event.action, error = %e, "failed to record event");
        }
    }
}

fn check_parameters(plan: &Plan, parameters: &ParameterSet) -> Result<()> {
    let missing = plan.missing_parameters(parameters);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PostcrewError::MissingParameters(missing))
    }
}

fn report(task: &str, slot: NodeSlot) -> NodeReport {
    let retries = slot.attempts.saturating_sub(1);
    let completed = slot.state == NodeState::Completed;
    let validated = slot.validated.filter(|_| completed);

    NodeReport {
        task: task.to_string(),
        status: if completed {
            NodeStatus::Completed
        } else {
            NodeStatus::Failed
        },
        attempts: slot.attempts,
        retries,
        cause: slot.cause,
        output: validated.as_ref().map(|v| v.output.clone()),
        word_count: validated.as_ref().map(|v| v.word_count),
        items: validated.as_ref().map(|v| v.items.clone()).unwrap_or_default(),
        hashtags: validated.map(|v| v.hashtags).unwrap_or_default(),
        started_at: slot.started_at,
        finished_at: slot.finished_at,
    }
}
