//! Agent profile configuration.
//!
//! This module defines the `agents.yaml` file format: the personas that
//! execute catalog tasks and the command used to reach each one.
//!
//! # File Format
//!
//! ```yaml
//! agents:
//!   researcher:
//!     role: "LinkedIn Content Researcher"
//!     goal: "Research trending topics for LinkedIn posts"
//!     backstory: "You are an expert LinkedIn content researcher."
//!     command: "llm -m gpt-4o-mini"
//!     timeout_seconds: 300
//!     environment:
//!       LLM_USER_PATH: ".llm"
//!     default: true
//!
//!   content_creator:
//!     role: "LinkedIn Content Creator"
//!     command: "./scripts/write.sh {prompt_file}"
//!     prompt_template: terse
//!
//! defaults:
//!   timeout_seconds: 600
//!
//! prompt_templates:
//!   terse: |
//!     {instruction}
//! ```
//!
//! # Command Placeholders
//!
//! - `{prompt_file}` - Path to the rendered prompt; when the command does not
//!   reference it, the prompt is written to the command's stdin instead
//! - `{task}` - Task name
//! - `{agent}` - Agent identifier
//! - `{run_id}` - Workflow run identifier
//! - `{attempt}` - Attempt number, starting at 1

use crate::error::{PostcrewError, Result};
use crate::template::Template;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Default timeout for agent execution in seconds.
const DEFAULT_TIMEOUT_SECONDS: u64 = 600;

/// Agent profiles shipped with the binary.
pub const BUILTIN_AGENTS: &str = include_str!("../../config/agents.yaml");

/// Configuration for all agents, loaded from `agents.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    /// Agent profiles keyed by identifier.
    #[serde(default)]
    pub agents: BTreeMap<String, AgentProfile>,

    /// Default settings applied to all agents.
    #[serde(default)]
    pub defaults: AgentDefaults,

    /// Prompt templates keyed by name.
    #[serde(default)]
    pub prompt_templates: BTreeMap<String, String>,

    /// Unknown fields preserved for forward compatibility.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Default settings for agent execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentDefaults {
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    #[serde(default = "default_prompt_template")]
    pub prompt_template: String,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            prompt_template: default_prompt_template(),
            extra: BTreeMap::new(),
        }
    }
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_prompt_template() -> String {
    "default".to_string()
}

/// Persona and transport for a single agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentProfile {
    /// What the agent is, e.g. "LinkedIn Content Researcher".
    #[serde(default)]
    pub role: String,

    /// What the agent is trying to achieve.
    #[serde(default)]
    pub goal: String,

    /// Persona background handed to the model.
    #[serde(default)]
    pub backstory: String,

    /// Command template; see the module docs for placeholders.
    pub command: String,

    /// Timeout in seconds (overrides default if set).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,

    /// Environment variables to set for the agent process.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub environment: HashMap<String, String>,

    /// Whether this agent runs tasks that name no agent.
    #[serde(default)]
    pub default: bool,

    /// Prompt template to use (overrides default if set).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_template: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl AgentProfile {
    /// Get the effective timeout for this agent.
    pub fn effective_timeout(&self, defaults: &AgentDefaults) -> u64 {
        self.timeout_seconds.unwrap_or(defaults.timeout_seconds)
    }

    /// Get the effective prompt template name for this agent.
    pub fn effective_prompt_template<'a>(&'a self, defaults: &'a AgentDefaults) -> &'a str {
        self.prompt_template
            .as_deref()
            .unwrap_or(&defaults.prompt_template)
    }
}

impl AgentsConfig {
    /// Load agents config from a YAML file.
    ///
    /// Returns `Ok(None)` if the file does not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            PostcrewError::ConfigError(format!(
                "failed to read agents config '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config = Self::from_yaml(&content)?;
        Ok(Some(config))
    }

    /// Load `path` if it exists, otherwise the built-in profiles.
    pub fn load_or_builtin<P: AsRef<Path>>(path: P) -> Result<Self> {
        match Self::load(path)? {
            Some(config) => Ok(config),
            None => Self::builtin(),
        }
    }

    /// The built-in profiles for the four content agents.
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_AGENTS)
    }

    /// Parse agents config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: AgentsConfig = serde_yaml::from_str(yaml)
            .map_err(|e| PostcrewError::ConfigError(format!("failed to parse agents.yaml: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the agents configuration.
    ///
    /// Validation rules:
    /// - Agent identifiers and command templates must not be empty
    /// - Command and prompt templates must parse
    /// - At most one agent can be marked as default
    /// - Timeouts must be positive
    /// - Prompt template references must exist
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| {
            Err(PostcrewError::ConfigError(format!(
                "agents.yaml validation failed: {}",
                msg
            )))
        };

        if self.defaults.timeout_seconds == 0 {
            return fail("defaults.timeout_seconds must be greater than 0".to_string());
        }

        let default_count = self.agents.values().filter(|a| a.default).count();
        if default_count > 1 {
            return fail("at most one agent can be marked as default".to_string());
        }

        for (name, template) in &self.prompt_templates {
            if let Err(e) = Template::parse(template) {
                return fail(format!("prompt template '{}': {}", name, e));
            }
        }

        let default_template = &self.defaults.prompt_template;
        if default_template != "default" && !self.prompt_templates.contains_key(default_template) {
            return fail(format!(
                "defaults.prompt_template references unknown template '{}'",
                default_template
            ));
        }

        for (id, agent) in &self.agents {
            if id.is_empty() {
                return fail("agent identifier cannot be empty".to_string());
            }

            if agent.command.trim().is_empty() {
                return fail(format!("agent '{}' has empty command", id));
            }

            if let Err(e) = Template::parse(&agent.command) {
                return fail(format!("agent '{}' command: {}", id, e));
            }

            if let Some(timeout) = agent.timeout_seconds
                && timeout == 0
            {
                return fail(format!("agent '{}' has timeout_seconds of 0", id));
            }

            if let Some(ref template) = agent.prompt_template
                && template != "default"
                && !self.prompt_templates.contains_key(template)
            {
                return fail(format!(
                    "agent '{}' references unknown prompt_template '{}'",
                    id, template
                ));
            }
        }

        Ok(())
    }

    /// Get the default agent, if one is configured.
    pub fn default_agent(&self) -> Option<(&str, &AgentProfile)> {
        self.agents
            .iter()
            .find(|(_, a)| a.default)
            .map(|(id, a)| (id.as_str(), a))
    }

    /// Get an agent by identifier.
    pub fn get(&self, id: &str) -> Option<&AgentProfile> {
        self.agents.get(id)
    }

    /// Get the prompt template text for `name`.
    ///
    /// `default` resolves to the built-in template unless overridden.
    pub fn prompt_template(&self, name: &str) -> Option<&str> {
        match self.prompt_templates.get(name) {
            Some(template) => Some(template),
            None if name == "default" => Some(default_prompt_template_content()),
            None => None,
        }
    }

    /// Check if any agents are configured.
    pub fn has_agents(&self) -> bool {
        !self.agents.is_empty()
    }

    /// Iterate over all agents.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AgentProfile)> {
        self.agents.iter().map(|(id, a)| (id.as_str(), a))
    }

    /// Comma-separated agent identifiers for error messages.
    pub fn available_agents(&self) -> String {
        if self.agents.is_empty() {
            "(none)".to_string()
        } else {
            self.agents
                .keys()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        }
    }
}

/// Default prompt template content.
///
/// Variables: `{role}`, `{goal}`, `{backstory}`, `{task}`, `{description}`,
/// `{expected_output}`, `{instruction}`, `{context}`.
pub fn default_prompt_template_content() -> &'static str {
    r#"You are {role}.

{backstory}

Your goal: {goal}

# Task: {task}

{description}

## Expected Output
{expected_output}

## Context From Previous Tasks
{context}
"#
}
