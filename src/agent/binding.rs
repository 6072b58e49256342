//! Task-agent binding resolution.
//!
//! # Resolution Order
//!
//! 1. The agent named by the task definition
//! 2. The default agent from agents.yaml
//! 3. Error if no agent can be resolved

use crate::agent::config::{AgentProfile, AgentsConfig};
use crate::error::{PostcrewError, Result};

/// Resolved agent binding for a task.
#[derive(Debug, Clone)]
pub struct AgentBinding<'a> {
    pub profile: &'a AgentProfile,
    pub agent_id: &'a str,
    pub binding_source: BindingSource,
}

/// How an agent binding was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingSource {
    /// The task definition names the agent.
    Explicit,
    /// Using default agent from agents.yaml.
    Default,
}

/// Resolve which agent should execute `task`.
///
/// # Errors
///
/// - The task references a non-existent agent
/// - No agent is named and no default is configured
pub fn resolve_agent<'a>(
    task: &str,
    requested: Option<&'a str>,
    config: &'a AgentsConfig,
) -> Result<AgentBinding<'a>> {
    if let Some(agent_id) = requested {
        return match config.get(agent_id) {
            Some(profile) => Ok(AgentBinding {
                profile,
                agent_id,
                binding_source: BindingSource::Explicit,
            }),
            None => Err(PostcrewError::UserError(format!(
                "task '{}' is assigned to agent '{}', but this agent is not configured in agents.yaml.\n\
                 Available agents: {}",
                task,
                agent_id,
                config.available_agents()
            ))),
        };
    }

    match config.default_agent() {
        Some((agent_id, profile)) => Ok(AgentBinding {
            profile,
            agent_id,
            binding_source: BindingSource::Default,
        }),
        None if config.has_agents() => Err(PostcrewError::UserError(format!(
            "task '{}' has no agent assigned and no default agent is configured.\n\
             Either name an agent in the catalog or mark one as default in agents.yaml.\n\
             Available agents: {}",
            task,
            config.available_agents()
        ))),
        None => Err(PostcrewError::UserError(format!(
            "task '{}' has no agent assigned and no agents are configured.\n\
             Create config/agents.yaml with at least one agent profile.\n\n\
             Example agents.yaml:\n\
             agents:\n  \
               writer:\n    \
                 role: \"LinkedIn Content Creator\"\n    \
                 command: \"llm -m gpt-4o-mini\"\n    \
                 default: true",
            task
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config_with_agents(agents: &[(&str, bool)]) -> AgentsConfig {
        let mut config = AgentsConfig::default();
        for (name, is_default) in agents {
            config.agents.insert(
                name.to_string(),
                AgentProfile {
                    role: name.to_string(),
                    command: format!("echo {}", name),
                    default: *is_default,
                    ..Default::default()
                },
            );
        }
        config
    }

    #[test]
    fn test_resolve_explicit_agent() {
        let config = make_config_with_agents(&[("researcher", false), ("other", true)]);

        let binding = resolve_agent("research_topic", Some("researcher"), &config).unwrap();

        assert_eq!(binding.agent_id, "researcher");
        assert_eq!(binding.binding_source, BindingSource::Explicit);
        assert_eq!(binding.profile.command, "echo researcher");
    }

    #[test]
    fn test_resolve_default_agent() {
        let config = make_config_with_agents(&[("agent1", false), ("agent2", true)]);

        let binding = resolve_agent("daily_summary", None, &config).unwrap();

        assert_eq!(binding.agent_id, "agent2");
        assert_eq!(binding.binding_source, BindingSource::Default);
    }

    #[test]
    fn test_resolve_unknown_explicit_agent_error() {
        let config = make_config_with_agents(&[("agent1", true)]);

        let err = resolve_agent("find_leads", Some("nonexistent"), &config)
            .unwrap_err()
            .to_string();

        assert!(err.contains("nonexistent"));
        assert!(err.contains("not configured"));
        assert!(err.contains("agent1"));
    }

    #[test]
    fn test_resolve_no_default_error() {
        let config = make_config_with_agents(&[("agent1", false), ("agent2", false)]);

        let err = resolve_agent("t", None, &config).unwrap_err().to_string();
        assert!(err.contains("no default agent"));
    }

    #[test]
    fn test_resolve_no_agents_error() {
        let err = resolve_agent("t", None, &AgentsConfig::default())
            .unwrap_err()
            .to_string();
        assert!(err.contains("no agents are configured"));
        assert!(err.contains("Example agents.yaml"));
    }
}
