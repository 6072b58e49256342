//! Agent execution subsystem.
//!
//! - **Capability**: the async seam every agent backend implements
//! - **Executor**: runs one attempt of a bound task and tags the raw result
//! - **Config**: agent personas and commands (`agents.yaml`)
//! - **Binding**: which agent profile runs a task
//! - **Command**: subprocess agents with timeout and cancellation
//!
//! Agents are reached through configurable command templates, so any CLI
//! that reads a prompt and prints an answer can serve as a content agent.
//! Agents never judge output; the output contract does.

mod binding;
mod capability;
mod command;
mod config;
mod executor;
mod prompt;

pub use binding::{AgentBinding, BindingSource, resolve_agent};
pub use capability::{AgentCapability, AgentFault, AgentRequest};
pub use command::CommandCapability;
pub use config::{AgentDefaults, AgentProfile, AgentsConfig, default_prompt_template_content};
pub use executor::{ResultStatus, TaskExecutor, TaskResult};
pub use prompt::render_prompt;
