//! Unified script execution interface and shared types.
//!
//! Defines [`ScriptExecutor`], the trait that the subprocess executor, the
//! retry decorator, and the stub all implement, along with
//! [`ScriptOutput`].

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// Captured output from a successful interpreter run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptOutput {
    /// Complete stdout captured from the process.
    pub stdout: String,
    /// Complete stderr captured from the process (diagnostic only).
    pub stderr: String,
    /// Process exit code. Always `0` for a successful run.
    pub exit_code: i32,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl ScriptOutput {
    /// Output with the given stdout and nothing else, as a stub would return.
    pub fn from_stdout(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
            duration_ms: 0,
        }
    }
}

/// Trait implemented by everything that can run rendered script text.
///
/// Implementations spawn (or pretend to spawn) one interpreter per call and
/// classify failures into [`BridgeError`] variants. No state is carried
/// between calls.
pub trait ScriptExecutor: Send + Sync {
    /// Timeout applied by [`ScriptExecutor::execute`].
    fn default_timeout(&self) -> Duration;

    /// Run `script`, killing the interpreter if it outlives `timeout`.
    fn execute_with_timeout(
        &self,
        script: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<ScriptOutput, BridgeError>> + Send;

    /// Run `script` with the executor's default timeout.
    fn execute(
        &self,
        script: &str,
    ) -> impl Future<Output = Result<ScriptOutput, BridgeError>> + Send {
        self.execute_with_timeout(script, self.default_timeout())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
