//! Postcrew: task templating and workflow engine for a LinkedIn content pipeline.
//!
//! Tasks live in a YAML catalog ([`catalog::TemplateStore`]). Each carries
//! `{placeholder}` templates bound by [`template::bind`] and an output
//! contract ([`contract::OutputContract`]). The [`workflow::WorkflowEngine`]
//! runs requested tasks in dependency order through an injected
//! [`agent::AgentCapability`], validating every result before a dependent
//! task sees it.
//!
//! ```no_run
//! use postcrew::agent::{AgentsConfig, CommandCapability};
//! use postcrew::catalog::TemplateStore;
//! use postcrew::template::ParameterSet;
//! use postcrew::workflow::WorkflowEngine;
//! use std::sync::Arc;
//!
//! # async fn demo() -> postcrew::error::Result<()> {
//! let store = Arc::new(TemplateStore::builtin()?);
//! let capability = CommandCapability::new(AgentsConfig::builtin()?, ".postcrew/runs".into(), ".".into());
//! let engine = WorkflowEngine::new(store, Arc::new(capability));
//!
//! let params = ParameterSet::new().with("topic", "remote work productivity");
//! let run = engine
//!     .run_workflow(&["research_topic", "create_content"], &params)
//!     .await?;
//! println!("{}", run.status);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod catalog;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod contract;
pub mod error;
pub mod events;
pub mod exit_codes;
pub mod template;
pub mod workflow;

#[cfg(test)]
pub(crate) mod test_support;
