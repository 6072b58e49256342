//! Execution plan for a set of requested tasks.

use crate::catalog::{TaskDefinition, TemplateStore};
use crate::error::{PostcrewError, Result};
use crate::template::{ParameterSet, UnboundPlaceholderError, missing_placeholders};
use std::sync::Arc;

/// One requested task and its position in the dependency graph.
#[derive(Debug, Clone)]
pub struct PlanNode {
    pub definition: Arc<TaskDefinition>,
    /// Indices of direct dependencies.
    pub depends_on: Vec<usize>,
    /// Indices of every transitive dependency, in request order.
    pub upstream: Vec<usize>,
}

impl PlanNode {
    pub fn name(&self) -> &str {
        &self.definition.name
    }
}

/// Requested tasks in request order, with dependency edges resolved.
#[derive(Debug, Clone)]
pub struct Plan {
    nodes: Vec<PlanNode>,
}

impl Plan {
    /// Resolve `tasks` against the catalog.
    ///
    /// # Errors
    ///
    /// - `NotFound` for a name missing from the catalog
    /// - `UserError` for an empty request, a duplicate name, or a task whose
    ///   dependency was not requested
    pub fn build<S: AsRef<str>>(store: &TemplateStore, tasks: &[S]) -> Result<Self> {
        if tasks.is_empty() {
            return Err(PostcrewError::UserError(
                "no tasks requested; run `postcrew list` to see the catalog".to_string(),
            ));
        }

        let mut definitions: Vec<Arc<TaskDefinition>> = Vec::with_capacity(tasks.len());
        for name in tasks {
            let name = name.as_ref();
            if definitions.iter().any(|d| d.name == name) {
                return Err(PostcrewError::UserError(format!(
                    "task '{}' is requested more than once",
                    name
                )));
            }
            definitions.push(store.get(name)?);
        }

        let position = |name: &str| definitions.iter().position(|d| d.name == name);

        let mut nodes: Vec<PlanNode> = Vec::with_capacity(definitions.len());
        for def in &definitions {
            let mut depends_on = Vec::with_capacity(def.depends_on.len());
            for dep in &def.depends_on {
                match position(dep) {
                    Some(i) => depends_on.push(i),
                    None => {
                        return Err(PostcrewError::UserError(format!(
                            "task '{}' depends on '{}', which was not requested.\n\
                             Fix: add '{}' to the run, before or after '{}'.",
                            def.name, dep, dep, def.name
                        )));
                    }
                }
            }
            nodes.push(PlanNode {
                definition: Arc::clone(def),
                depends_on,
                upstream: Vec::new(),
            });
        }

        for i in 0..nodes.len() {
            let mut reached = vec![false; nodes.len()];
            let mut stack = nodes[i].depends_on.clone();
            while let Some(j) = stack.pop() {
                if !reached[j] {
                    reached[j] = true;
                    stack.extend(nodes[j].depends_on.iter().copied());
                }
            }
            nodes[i].upstream = (0..nodes.len()).filter(|&j| reached[j]).collect();
        }

        Ok(Self { nodes })
    }

    pub fn nodes(&self) -> &[PlanNode] {
        &self.nodes
    }

    /// Number of requested tasks; never zero.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Indices of nodes that directly depend on `index`.
    pub fn dependents(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, n)| n.depends_on.contains(&index))
            .map(|(i, _)| i)
    }

    /// Names that completed upstream nodes of `index` will supply at bind time.
    pub fn upstream_roles(&self, index: usize) -> Vec<&str> {
        self.nodes[index]
            .upstream
            .iter()
            .flat_map(|&j| self.nodes[j].definition.roles())
            .collect()
    }

    /// Every placeholder of every node that nothing in the run can supply.
    pub fn missing_parameters(&self, parameters: &ParameterSet) -> Vec<UnboundPlaceholderError> {
        (0..self.nodes.len())
            .flat_map(|i| {
                missing_placeholders(
                    &self.nodes[i].definition,
                    parameters,
                    &self.upstream_roles(i),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> TemplateStore {
        TemplateStore::builtin().unwrap()
    }

    #[test]
    fn test_plan_resolves_edges_in_request_order() {
        let plan = Plan::build(&store(), &["create_content", "research_topic"]).unwrap();
        assert_eq!(plan.nodes()[0].name(), "create_content");
        assert_eq!(plan.nodes()[0].depends_on, vec![1]);
        assert_eq!(plan.nodes()[0].upstream, vec![1]);
        assert!(plan.nodes()[1].depends_on.is_empty());
        assert_eq!(plan.dependents(1).collect::<Vec<_>>(), vec![0]);
        assert_eq!(plan.upstream_roles(0), vec!["research_topic", "research"]);
    }

    #[test]
    fn test_transitive_upstream() {
        let store = TemplateStore::from_yaml(
            "a:\n  description: a\n  expected_output: a\n\
             b:\n  depends_on: [a]\n  description: b\n  expected_output: b\n\
             c:\n  depends_on: [b]\n  description: c\n  expected_output: c\n",
        )
        .unwrap();
        let plan = Plan::build(&store, &["c", "a", "b"]).unwrap();
        assert_eq!(plan.nodes()[0].upstream, vec![1, 2]);
        assert_eq!(plan.nodes()[2].upstream, vec![1]);
    }

    #[test]
    fn test_unrequested_dependency_is_caller_error() {
        let err = Plan::build(&store(), &["create_content"]).unwrap_err();
        assert!(matches!(err, PostcrewError::UserError(_)));
        assert!(err.to_string().contains("depends on 'research_topic', which was not requested"));
    }

    #[test]
    fn test_unknown_and_duplicate_names() {
        assert!(matches!(
            Plan::build(&store(), &["post_to_linkedin"]),
            Err(PostcrewError::NotFound(_))
        ));
        assert!(matches!(
            Plan::build(&store(), &["find_leads", "find_leads"]),
            Err(PostcrewError::UserError(_))
        ));
        assert!(matches!(
            Plan::build::<&str>(&store(), &[]),
            Err(PostcrewError::UserError(_))
        ));
    }

    #[test]
    fn test_missing_parameters_lists_everything() {
        let plan = Plan::build(&store(), &["research_topic", "create_content"]).unwrap();

        let missing = plan.missing_parameters(&ParameterSet::new());
        assert_eq!(
            missing,
            vec![
                UnboundPlaceholderError::new("research_topic", "topic"),
                UnboundPlaceholderError::new("create_content", "topic"),
            ]
        );

        let params = ParameterSet::new().with("topic", "remote work productivity");
        assert!(plan.missing_parameters(&params).is_empty());
    }
}
