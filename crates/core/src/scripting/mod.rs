//! Interpreter process execution.
//!
//! [`executor::ScriptExecutor`] is the two-method contract shared by the
//! real `osascript` executor, the retry decorator that wraps it, and the
//! in-memory stub used by tests and front ends.

pub mod executor;
pub mod osascript;
pub mod retry;
pub mod stub;
pub mod subprocess;

/// Shared test helpers for executor tests.
#[cfg(test)]
pub(crate) mod test_helpers {
    use super::osascript::InterpreterConfig;

    /// An interpreter config that runs scripts with `bash -c` instead of
    /// `osascript`, so process tests work on any Unix host.
    pub fn bash_interpreter() -> InterpreterConfig {
        InterpreterConfig {
            program: "bash".to_string(),
            args: vec!["-c".to_string()],
        }
    }
}
