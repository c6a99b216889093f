//! Classified errors for the script bridge.
//!
//! Every failure is tagged with exactly one [`BridgeError`] variant at the
//! point where it occurs and travels unchanged to the caller.

use std::time::Duration;

/// A failure from any stage of a bridge call.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// A caller-supplied parameter failed its validation policy.
    #[error("Invalid parameter '{parameter}': {reason}")]
    Validation { parameter: String, reason: String },

    /// No script template is registered under the requested name.
    #[error("Script template not found: {0}")]
    TemplateNotFound(String),

    /// A template contains bad placeholder syntax or an unresolved hole.
    #[error("Script template '{template}' is malformed: {reason}")]
    TemplateMalformed { template: String, reason: String },

    /// The interpreter binary is missing or cannot be launched.
    #[error("Script interpreter '{0}' not found; install or enable it")]
    InterpreterNotFound(String),

    /// The interpreter exceeded its deadline and was killed.
    #[error("Script timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// The interpreter exited with a non-zero code.
    #[error("Script failed with exit code {exit_code}: {stderr}")]
    ExecutionFailed { exit_code: i32, stderr: String },

    /// The host application is not running.
    #[error("Host application is not running")]
    NotAvailable,

    /// The host application reported an error in its response.
    #[error("Application error: {0}")]
    ApplicationReported(String),

    /// The interpreter's stdout was not a valid response envelope.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The caller cancelled the call before it completed.
    #[error("Script execution cancelled")]
    Cancelled,

    /// Any other OS error while spawning or talking to the interpreter.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Build a [`BridgeError::Validation`] for `parameter`.
    pub fn validation(parameter: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }

    /// Build a [`BridgeError::TemplateMalformed`] for `template`.
    pub fn malformed(template: &str, reason: impl Into<String>) -> Self {
        Self::TemplateMalformed {
            template: template.to_string(),
            reason: reason.into(),
        }
    }

    /// Build a [`BridgeError::Timeout`] from an elapsed duration.
    pub fn timeout(elapsed: Duration) -> Self {
        Self::Timeout {
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    /// Whether the retry decorator may retry this failure.
    ///
    /// Only timeouts qualify; everything else is deterministic.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Invalid configuration values supplied to the bridge.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid retry policy: {0}")]
    RetryPolicy(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Convenience alias for bridge results.
pub type BridgeResult<T> = Result<T, BridgeError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_validation_names_parameter() {
        let err = BridgeError::validation("TaskID", "contains whitespace");
        assert_eq!(
            err.to_string(),
            "Invalid parameter 'TaskID': contains whitespace"
        );
    }

    #[test]
    fn display_timeout() {
        let err = BridgeError::timeout(Duration::from_millis(5000));
        assert_eq!(err.to_string(), "Script timed out after 5000ms");
    }

    #[test]
    fn display_execution_failed() {
        let err = BridgeError::ExecutionFailed {
            exit_code: 1,
            stderr: "execution error: -1743".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Script failed with exit code 1: execution error: -1743"
        );
    }

    #[test]
    fn only_timeout_is_retryable() {
        assert!(BridgeError::Timeout { elapsed_ms: 1 }.is_retryable());
        assert!(!BridgeError::NotAvailable.is_retryable());
        assert!(!BridgeError::Cancelled.is_retryable());
        assert!(!BridgeError::InterpreterNotFound("osascript".into()).is_retryable());
        assert!(!BridgeError::ExecutionFailed {
            exit_code: 2,
            stderr: String::new()
        }
        .is_retryable());
    }

    #[test]
    fn io_error_keeps_source() {
        let err = BridgeError::from(std::io::Error::other("boom"));
        assert!(
            std::error::Error::source(&err).is_some(),
            "Io variant should have a source"
        );
        assert!(err.to_string().contains("boom"));
    }
}
