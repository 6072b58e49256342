//! Scripted agent capability for engine tests.

use crate::agent::{AgentCapability, AgentFault, AgentRequest};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// One recorded agent call.
#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub task: String,
    pub attempt: u32,
    pub instruction: String,
    /// Task names of the results handed in as context.
    pub context: Vec<String>,
}

/// Replies with queued responses per task, recording every call.
///
/// When a task's queue runs dry its last response repeats. Unknown tasks
/// fail with `AgentFault::Unavailable`.
#[derive(Default)]
pub(crate) struct ScriptedCapability {
    scripts: Mutex<HashMap<String, VecDeque<Result<String, AgentFault>>>>,
    last: Mutex<HashMap<String, Result<String, AgentFault>>>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<Call>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poison| poison.into_inner())
}

impl ScriptedCapability {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply for `task`.
    pub(crate) fn reply(self, task: &str, output: impl Into<String>) -> Self {
        self.push(task, Ok(output.into()))
    }

    /// Queue a fault for `task`.
    pub(crate) fn fault(self, task: &str, fault: AgentFault) -> Self {
        self.push(task, Err(fault))
    }

    /// Make every call for `task` take `delay`.
    pub(crate) fn delay(mut self, task: &str, delay: Duration) -> Self {
        self.delays.insert(task.to_string(), delay);
        self
    }

    fn push(self, task: &str, response: Result<String, AgentFault>) -> Self {
        lock(&self.scripts)
            .entry(task.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    pub(crate) fn calls_for(&self, task: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.task == task).collect()
    }

    /// Highest number of calls that were in flight at once.
    pub(crate) fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn next_response(&self, task: &str) -> Result<String, AgentFault> {
        let queued = lock(&self.scripts).get_mut(task).and_then(VecDeque::pop_front);
        match queued {
            Some(response) => {
                lock(&self.last).insert(task.to_string(), response.clone());
                response
            }
            None => lock(&self.last).get(task).cloned().unwrap_or_else(|| {
                Err(AgentFault::Unavailable(format!("no script for task '{}'", task)))
            }),
        }
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AgentCapability for ScriptedCapability {
    async fn run(&self, request: AgentRequest<'_>) -> Result<String, AgentFault> {
        lock(&self.calls).push(Call {
            task: request.task.to_string(),
            attempt: request.attempt,
            instruction: request.instruction.to_string(),
            context: request.context.iter().map(|r| r.task.clone()).collect(),
        });

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _active = ActiveGuard(&self.active);

        let delay = self
            .delays
            .get(request.task)
            .copied()
            .unwrap_or(Duration::from_millis(1));
        tokio::time::sleep(delay).await;

        self.next_response(request.task)
    }
}
