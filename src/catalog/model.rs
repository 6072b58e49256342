//! Task definition model and catalog entry parsing.

use crate::contract::{ContractSpec, OutputContract};
use crate::template::Template;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("Invalid name regex"));

/// A task template as declared in the catalog.
///
/// Immutable once loaded; shared across runs through `Arc`.
#[derive(Debug, Clone)]
pub struct TaskDefinition {
    /// Unique task name (the catalog key).
    pub name: String,

    /// Agent profile that should execute this task.
    pub agent: Option<String>,

    /// Tasks whose validated output this task consumes.
    pub depends_on: Vec<String>,

    /// Extra name under which dependents can reference this task's output.
    pub output_key: Option<String>,

    /// Fallback values for placeholders.
    pub defaults: BTreeMap<String, String>,

    pub description: Template,
    pub expected_output: Template,

    /// Structural contract for the task's output.
    pub contract: OutputContract,
}

impl TaskDefinition {
    /// Distinct placeholders of the description and expected output, in order.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names = self.description.placeholders();
        for name in self.expected_output.placeholders() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Names under which this task's output is visible to dependents.
    pub fn roles(&self) -> Vec<&str> {
        let mut roles = vec![self.name.as_str()];
        if let Some(key) = &self.output_key {
            roles.push(key);
        }
        roles
    }
}

/// One catalog entry as written in YAML.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct CatalogEntry {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    expected_output: Option<String>,
    #[serde(default)]
    agent: Option<String>,
    #[serde(default)]
    depends_on: Vec<String>,
    #[serde(default)]
    output_key: Option<String>,
    #[serde(default)]
    defaults: BTreeMap<String, String>,
    #[serde(default)]
    contract: ContractSpec,
}

impl CatalogEntry {
    /// Check one entry in isolation and compile its templates and contract.
    ///
    /// Cross-entry checks (dependencies, cycles, role clashes) happen in the store.
    pub(super) fn into_definition(self, name: &str) -> Result<TaskDefinition, String> {
        if !NAME.is_match(name) {
            return Err(format!(
                "task name '{}' is invalid (use letters, digits, '_' or '-')",
                name
            ));
        }

        let description = required(name, "description", self.description)?;
        let expected_output = required(name, "expected_output", self.expected_output)?;

        let description = Template::parse(&description)
            .map_err(|e| format!("task '{}' description: {}", name, e))?;
        let expected_output = Template::parse(&expected_output)
            .map_err(|e| format!("task '{}' expected_output: {}", name, e))?;

        if let Some(key) = &self.output_key
            && !NAME.is_match(key)
        {
            return Err(format!("task '{}' has invalid output_key '{}'", name, key));
        }
        if let Some(agent) = &self.agent
            && agent.trim().is_empty()
        {
            return Err(format!("task '{}' has an empty agent reference", name));
        }

        let mut depends_on: Vec<String> = Vec::with_capacity(self.depends_on.len());
        for dep in self.depends_on {
            if depends_on.contains(&dep) {
                return Err(format!("task '{}' lists dependency '{}' twice", name, dep));
            }
            depends_on.push(dep);
        }

        let contract = OutputContract::compile(self.contract)
            .map_err(|e| format!("task '{}': {}", name, e))?;

        Ok(TaskDefinition {
            name: name.to_string(),
            agent: self.agent,
            depends_on,
            output_key: self.output_key,
            defaults: self.defaults,
            description,
            expected_output,
            contract,
        })
    }
}

fn required(task: &str, field: &str, value: Option<String>) -> Result<String, String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        Some(_) => Err(format!("task '{}' has an empty '{}'", task, field)),
        None => Err(format!("task '{}' is missing required field '{}'", task, field)),
    }
}
