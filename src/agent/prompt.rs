//! Prompt rendering for command agents.
//!
//! A prompt template sees the agent persona and the bound task:
//!
//! - `{role}`, `{goal}`, `{backstory}` - From the agent profile
//! - `{task}` - Task name
//! - `{description}`, `{expected_output}` - Bound task text
//! - `{instruction}` - Description and expected output together
//! - `{context}` - Upstream results, one `###` block per task, or `(none)`

use crate::agent::capability::AgentRequest;
use crate::agent::config::{AgentProfile, AgentsConfig};
use crate::template::{TemplateError, render_template, vars};

/// Render the prompt for one request.
pub fn render_prompt(
    config: &AgentsConfig,
    profile: &AgentProfile,
    request: &AgentRequest<'_>,
) -> Result<String, String> {
    let name = profile.effective_prompt_template(&config.defaults);
    let template = config
        .prompt_template(name)
        .ok_or_else(|| format!("prompt template '{}' is not defined", name))?;

    let context = format_context(request);
    let variables = vars([
        ("role", profile.role.as_str()),
        ("goal", profile.goal.as_str()),
        ("backstory", profile.backstory.as_str()),
        ("task", request.task),
        ("description", request.description),
        ("expected_output", request.expected_output),
        ("instruction", request.instruction),
        ("context", context.as_str()),
    ]);

    render_template(template, &variables).map_err(|e| match e {
        TemplateError::UndefinedVariable { name: variable, .. } => format!(
            "prompt template '{}' references unknown variable '{}'",
            name, variable
        ),
        other => format!("prompt template '{}': {}", name, other),
    })
}

fn format_context(request: &AgentRequest<'_>) -> String {
    let blocks: Vec<String> = request
        .context
        .iter()
        .filter_map(|result| {
            result
                .output()
                .map(|output| format!("### {}\n\n{}", result.task, output.trim_end()))
        })
        .collect();

    if blocks.is_empty() {
        "(none)".to_string()
    } else {
        blocks.join("\n\n")
    }
}
