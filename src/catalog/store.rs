//! The immutable task catalog.

use super::model::{CatalogEntry, TaskDefinition};
use crate::agent::AgentsConfig;
use crate::error::{PostcrewError, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Catalog shipped with the binary, used when no catalog file exists.
pub const BUILTIN_CATALOG: &str = include_str!("../../config/tasks.yaml");

/// Read-only collection of task definitions, in declaration order.
///
/// Loading validates the whole catalog; once built a store never changes and
/// can be shared freely between runs and threads.
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    tasks: Vec<Arc<TaskDefinition>>,
    index: HashMap<String, usize>,
}

impl TemplateStore {
    /// Parse and validate a catalog from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let root: serde_yaml::Value = serde_yaml::from_str(yaml)
            .map_err(|e| PostcrewError::TemplateLoad(format!("failed to parse YAML: {}", e)))?;

        let mapping = match root {
            serde_yaml::Value::Mapping(mapping) => mapping,
            serde_yaml::Value::Null => serde_yaml::Mapping::new(),
            _ => {
                return Err(PostcrewError::TemplateLoad(
                    "catalog must be a mapping of task name to definition".to_string(),
                ));
            }
        };

        let mut tasks = Vec::with_capacity(mapping.len());
        for (key, value) in mapping {
            let Some(name) = key.as_str().map(str::to_string) else {
                return Err(PostcrewError::TemplateLoad(format!(
                    "task names must be strings, found {:?}",
                    key
                )));
            };
            let entry: CatalogEntry = serde_yaml::from_value(value).map_err(|e| {
                PostcrewError::TemplateLoad(format!("task '{}': {}", name, e))
            })?;
            let definition = entry
                .into_definition(&name)
                .map_err(PostcrewError::TemplateLoad)?;
            tasks.push(definition);
        }

        Self::from_definitions(tasks)
    }

    /// Build a store from already-parsed definitions, running catalog-wide checks.
    pub fn from_definitions(definitions: Vec<TaskDefinition>) -> Result<Self> {
        let mut index = HashMap::with_capacity(definitions.len());
        for (i, def) in definitions.iter().enumerate() {
            if index.insert(def.name.clone(), i).is_some() {
                return Err(PostcrewError::TemplateLoad(format!(
                    "task '{}' is declared twice",
                    def.name
                )));
            }
        }

        check_roles(&definitions)?;

        for def in &definitions {
            for dep in &def.depends_on {
                if !index.contains_key(dep) {
                    return Err(PostcrewError::TemplateLoad(format!(
                        "task '{}' depends on unknown task '{}'",
                        def.name, dep
                    )));
                }
            }
        }

        check_cycles(&definitions, &index)?;

        Ok(Self {
            tasks: definitions.into_iter().map(Arc::new).collect(),
            index,
        })
    }

    /// Load a catalog file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PostcrewError::TemplateLoad(format!(
                "failed to read catalog '{}': {}",
                path.display(),
                e
            ))
        })?;
        let store = Self::from_yaml(&content)?;
        debug!(path = %path.display(), tasks = store.len(), "loaded task catalog");
        Ok(store)
    }

    /// Load `path` if it exists, otherwise the built-in catalog.
    pub fn load_or_builtin<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "catalog file not found, using built-in catalog");
            Self::builtin()
        }
    }

    /// The built-in LinkedIn content catalog.
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_CATALOG)
    }

    /// Look up a task definition by name.
    pub fn get(&self, name: &str) -> Result<Arc<TaskDefinition>> {
        self.index
            .get(name)
            .map(|&i| Arc::clone(&self.tasks[i]))
            .ok_or_else(|| PostcrewError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Task names in declaration order.
    pub fn list(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TaskDefinition>> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Check that every agent reference names a configured profile.
    ///
    /// Tasks without an agent are fine as long as a default profile exists.
    pub fn check_agents(&self, agents: &AgentsConfig) -> Result<()> {
        for def in &self.tasks {
            match &def.agent {
                Some(agent) if agents.get(agent).is_none() => {
                    return Err(PostcrewError::TemplateLoad(format!(
                        "task '{}' references unknown agent '{}' (configured: {})",
                        def.name,
                        agent,
                        agents.available_agents()
                    )));
                }
                None if agents.default_agent().is_none() => {
                    return Err(PostcrewError::TemplateLoad(format!(
                        "task '{}' has no agent and no default agent is configured",
                        def.name
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Every task name and output key must identify exactly one task.
fn check_roles(definitions: &[TaskDefinition]) -> Result<()> {
    let mut owners: HashMap<&str, &str> = HashMap::new();
    for def in definitions {
        for role in def.roles() {
            if let Some(owner) = owners.insert(role, &def.name)
                && owner != def.name
            {
                return Err(PostcrewError::TemplateLoad(format!(
                    "name '{}' is used by both task '{}' and task '{}'",
                    role, owner, def.name
                )));
            }
        }
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

fn check_cycles(definitions: &[TaskDefinition], index: &HashMap<String, usize>) -> Result<()> {
    fn visit(
        i: usize,
        definitions: &[TaskDefinition],
        index: &HashMap<String, usize>,
        marks: &mut [Mark],
        path: &mut Vec<usize>,
    ) -> Result<()> {
        match marks[i] {
            Mark::Done => return Ok(()),
            Mark::InProgress => {
                let start = path.iter().position(|&p| p == i).unwrap_or(0);
                let mut cycle: Vec<&str> = path[start..]
                    .iter()
                    .map(|&p| definitions[p].name.as_str())
                    .collect();
                cycle.push(&definitions[i].name);
                return Err(PostcrewError::TemplateLoad(format!(
                    "dependency cycle: {}",
                    cycle.join(" -> ")
                )));
            }
            Mark::Unvisited => {}
        }

        marks[i] = Mark::InProgress;
        path.push(i);
        for dep in &definitions[i].depends_on {
            if let Some(&j) = index.get(dep) {
                visit(j, definitions, index, marks, path)?;
            }
        }
        path.pop();
        marks[i] = Mark::Done;
        Ok(())
    }

    let mut marks = vec![Mark::Unvisited; definitions.len()];
    let mut path = Vec::new();
    for i in 0..definitions.len() {
        visit(i, definitions, index, &mut marks, &mut path)?;
    }
    Ok(())
}
