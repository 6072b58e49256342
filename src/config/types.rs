//! Defaults for the Config struct.

pub(crate) fn default_max_retries() -> u32 {
    2
}
pub(crate) fn default_concurrency_limit() -> usize {
    2
}
pub(crate) fn default_backoff_initial_ms() -> u64 {
    500
}
pub(crate) fn default_backoff_max_ms() -> u64 {
    8000
}
pub(crate) fn default_catalog() -> String {
    "config/tasks.yaml".to_string()
}
pub(crate) fn default_agents() -> String {
    "config/agents.yaml".to_string()
}
pub(crate) fn default_true() -> bool {
    true
}
