//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};

/// Configuration for postcrew runs.
///
/// This struct represents the contents of `postcrew.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Engine settings
    // =========================================================================
    /// Retries per task, shared between contract violations and agent faults.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Maximum agent calls in flight at once.
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    /// First backoff delay after an agent fault, doubled per retry.
    #[serde(default = "default_backoff_initial_ms")]
    pub backoff_initial_ms: u64,

    /// Upper bound for the backoff delay.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Check every placeholder of every requested task before starting.
    #[serde(default = "default_true")]
    pub preflight: bool,

    // =========================================================================
    // Files
    // =========================================================================
    /// Task catalog, relative to the project root. The built-in catalog is
    /// used when the file does not exist.
    #[serde(default = "default_catalog")]
    pub catalog: String,

    /// Agent profiles, relative to the project root.
    #[serde(default = "default_agents")]
    pub agents: String,

    /// Append run events to `.postcrew/events/events.ndjson`.
    #[serde(default = "default_true")]
    pub record_events: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            concurrency_limit: default_concurrency_limit(),
            backoff_initial_ms: default_backoff_initial_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            preflight: default_true(),
            catalog: default_catalog(),
            agents: default_agents(),
            record_events: default_true(),
        }
    }
}
