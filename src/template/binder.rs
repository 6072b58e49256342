//! Parameter binding: turns a task definition into concrete instruction text.
//!
//! # Resolution Order
//!
//! For every `{name}` in the description and expected-output templates:
//!
//! 1. The run's [`ParameterSet`]
//! 2. A completed upstream result whose task name or `output_key` is `name`
//! 3. A default declared on the task definition
//! 4. Otherwise binding fails with [`UnboundPlaceholderError`]
//!
//! Substitution is literal; resolved values are never re-scanned.

use crate::agent::TaskResult;
use crate::catalog::TaskDefinition;
use crate::error::{PostcrewError, Result};
use crate::template::TemplateError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// A placeholder nothing in the run could resolve.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "task '{task}' references placeholder '{{{placeholder}}}' but no parameter, upstream result, or default supplies it"
)]
pub struct UnboundPlaceholderError {
    /// Task whose template references the placeholder.
    pub task: String,
    /// The unresolved placeholder name.
    pub placeholder: String,
}

impl UnboundPlaceholderError {
    pub fn new(task: impl Into<String>, placeholder: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            placeholder: placeholder.into(),
        }
    }
}

/// Runtime parameters for one workflow run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    values: BTreeMap<String, String>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a parameter.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parse `key=value` assignments as supplied on the command line.
    ///
    /// Only the first `=` splits; the value may itself contain `=`.
    pub fn from_assignments<I, S>(assignments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut params = Self::new();
        for assignment in assignments {
            let assignment = assignment.as_ref();
            let Some((name, value)) = assignment.split_once('=') else {
                return Err(PostcrewError::UserError(format!(
                    "invalid parameter '{}': expected key=value",
                    assignment
                )));
            };
            let name = name.trim();
            if name.is_empty() {
                return Err(PostcrewError::UserError(format!(
                    "invalid parameter '{}': name cannot be empty",
                    assignment
                )));
            }
            params.insert(name, value);
        }
        Ok(params)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParameterSet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// One prior result visible to a dependent task.
#[derive(Debug, Clone)]
struct ContextEntry {
    /// The producing task's declared `output_key`, if any.
    role: Option<String>,
    /// The validated result, shared read-only.
    result: Arc<TaskResult>,
}

/// Results of completed prerequisites, in request order.
///
/// Entries are only ever appended; the results behind them are immutable.
#[derive(Debug, Clone, Default)]
pub struct UpstreamContext {
    entries: Vec<ContextEntry>,
}

impl UpstreamContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: Option<String>, result: Arc<TaskResult>) {
        self.entries.push(ContextEntry { role, result });
    }

    /// Output text of the entry whose task name or role equals `name`.
    ///
    /// Failed results never supply a value.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.result.task == name || e.role.as_deref() == Some(name))
            .and_then(|e| e.result.output())
    }

    pub fn results(&self) -> Vec<Arc<TaskResult>> {
        self.entries.iter().map(|e| Arc::clone(&e.result)).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A task with every placeholder resolved, ready for one execution.
#[derive(Debug, Clone)]
pub struct BoundTask {
    /// Name of the originating task definition.
    pub task: String,
    /// Agent profile requested by the definition.
    pub agent: Option<String>,
    /// Resolved description.
    pub description: String,
    /// Resolved expected-output text.
    pub expected_output: String,
    /// Upstream results this task may read.
    pub context: UpstreamContext,
}

impl BoundTask {
    /// The full instruction handed to the agent capability.
    pub fn instruction(&self) -> String {
        format!(
            "{}\n\nExpected output:\n{}",
            self.description.trim_end(),
            self.expected_output.trim_end()
        )
    }
}

/// Bind a task definition against parameters and upstream context.
pub fn bind(
    definition: &TaskDefinition,
    parameters: &ParameterSet,
    upstream: &UpstreamContext,
) -> std::result::Result<BoundTask, UnboundPlaceholderError> {
    let lookup = |name: &str| {
        parameters
            .get(name)
            .or_else(|| upstream.lookup(name))
            .or_else(|| definition.defaults.get(name).map(String::as_str))
    };

    let to_unbound = |err: TemplateError| match err {
        TemplateError::UndefinedVariable { name, .. } => {
            UnboundPlaceholderError::new(&definition.name, name)
        }
        // Syntax errors are rejected when the catalog loads.
        other => UnboundPlaceholderError::new(&definition.name, other.to_string()),
    };

    let description = definition.description.render_with(lookup).map_err(to_unbound)?;
    let expected_output = definition
        .expected_output
        .render_with(lookup)
        .map_err(to_unbound)?;

    Ok(BoundTask {
        task: definition.name.clone(),
        agent: definition.agent.clone(),
        description,
        expected_output,
        context: upstream.clone(),
    })
}

/// List every placeholder of `definition` that cannot be resolved.
///
/// `upstream_roles` are the names (task names and output keys) that completed
/// prerequisites will supply at bind time.
pub fn missing_placeholders(
    definition: &TaskDefinition,
    parameters: &ParameterSet,
    upstream_roles: &[&str],
) -> Vec<UnboundPlaceholderError> {
    definition
        .placeholders()
        .into_iter()
        .filter(|name| {
            !parameters.contains(name)
                && !upstream_roles.contains(name)
                && !definition.defaults.contains_key(*name)
        })
        .map(|name| UnboundPlaceholderError::new(&definition.name, name))
        .collect()
}
