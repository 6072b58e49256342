//! Exit code constants for the postcrew CLI.
//!
//! - 0: Success (every requested task completed)
//! - 1: User error (bad args, unknown task, missing parameters)
//! - 2: Load failure (malformed catalog, config, or agents file)
//! - 3: Workflow failure (run finished with at least one failed task)
//! - 4: Cancelled (run interrupted by the caller)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, unknown task, or missing parameters.
pub const USER_ERROR: i32 = 1;

/// Load failure: catalog, config, or agents file is malformed.
pub const LOAD_FAILURE: i32 = 2;

/// Workflow failure: the run was finalized with failed tasks.
pub const WORKFLOW_FAILURE: i32 = 3;

/// The run was cancelled before every task finished.
pub const CANCELLED: i32 = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [SUCCESS, USER_ERROR, LOAD_FAILURE, WORKFLOW_FAILURE, CANCELLED];
        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Exit codes must be distinct");
                }
            }
        }
    }
}
