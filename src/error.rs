//! Error types for postcrew.
//!
//! Uses thiserror for derive macros and provides user-actionable error messages.
//! Node-local failures inside a run are not errors at this level: they are
//! recorded on the finalized `WorkflowRun` as a [`FailureCause`](crate::workflow::FailureCause).

use crate::exit_codes;
use crate::template::UnboundPlaceholderError;
use thiserror::Error;

/// Main error type for postcrew operations.
#[derive(Error, Debug)]
pub enum PostcrewError {
    /// User provided invalid arguments or requested an impossible task set.
    #[error("{0}")]
    UserError(String),

    /// The task catalog is malformed. Fatal at startup.
    #[error("task catalog is invalid: {0}")]
    TemplateLoad(String),

    /// `postcrew.yaml` or `agents.yaml` is malformed.
    #[error("configuration is invalid: {0}")]
    ConfigError(String),

    /// No task of this name exists in the catalog.
    #[error("task '{0}' not found in catalog")]
    NotFound(String),

    /// A single placeholder could not be resolved.
    #[error(transparent)]
    UnboundPlaceholder(#[from] UnboundPlaceholderError),

    /// Preflight found placeholders that nothing in the run can supply.
    #[error("missing parameters:\n{}", format_missing(.0))]
    MissingParameters(Vec<UnboundPlaceholderError>),

    /// The run finished but some tasks failed.
    #[error("workflow finished with {failed} failed task(s)")]
    WorkflowFailed { failed: usize },

    /// The run was cancelled by the caller.
    #[error("workflow run was cancelled")]
    Cancelled,
}

impl PostcrewError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            PostcrewError::UserError(_)
            | PostcrewError::NotFound(_)
            | PostcrewError::UnboundPlaceholder(_)
            | PostcrewError::MissingParameters(_) => exit_codes::USER_ERROR,
            PostcrewError::TemplateLoad(_) | PostcrewError::ConfigError(_) => {
                exit_codes::LOAD_FAILURE
            }
            PostcrewError::WorkflowFailed { .. } => exit_codes::WORKFLOW_FAILURE,
            PostcrewError::Cancelled => exit_codes::CANCELLED,
        }
    }
}

fn format_missing(missing: &[UnboundPlaceholderError]) -> String {
    missing
        .iter()
        .map(|m| format!("  - {{{}}} (task '{}')", m.placeholder, m.task))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Result type alias for postcrew operations.
pub type Result<T> = std::result::Result<T, PostcrewError>;
