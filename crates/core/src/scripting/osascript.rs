//! `osascript` executor.
//!
//! Spawns the interpreter with fixed dialect flags and the rendered script
//! as its final argument. stdout is the result channel; stderr is only
//! surfaced inside [`BridgeError::ExecutionFailed`].

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::executor::{ScriptExecutor, ScriptOutput};
use super::subprocess;
use crate::error::BridgeError;

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Interpreter program and the flags placed before the script text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for InterpreterConfig {
    /// `osascript -l JavaScript -e <script>`.
    fn default() -> Self {
        Self {
            program: "osascript".to_string(),
            args: vec!["-l".to_string(), "JavaScript".to_string(), "-e".to_string()],
        }
    }
}

/// Executor that runs each script in a fresh interpreter process.
pub struct OsascriptExecutor {
    interpreter: InterpreterConfig,
    default_timeout: Duration,
    cancel: CancellationToken,
}

impl OsascriptExecutor {
    pub fn new(interpreter: InterpreterConfig, default_timeout: Duration) -> Self {
        Self {
            interpreter,
            default_timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// Kill in-flight interpreters when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl Default for OsascriptExecutor {
    fn default() -> Self {
        Self::new(InterpreterConfig::default(), DEFAULT_TIMEOUT)
    }
}

impl ScriptExecutor for OsascriptExecutor {
    fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    async fn execute_with_timeout(
        &self,
        script: &str,
        timeout: Duration,
    ) -> Result<ScriptOutput, BridgeError> {
        let mut cmd = tokio::process::Command::new(&self.interpreter.program);
        cmd.args(&self.interpreter.args).arg(script);
        subprocess::run_command(&mut cmd, &self.interpreter.program, timeout, &self.cancel).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use assert_matches::assert_matches;

    use super::*;
    use crate::scripting::test_helpers::bash_interpreter;

    fn bash_executor() -> OsascriptExecutor {
        OsascriptExecutor::new(bash_interpreter(), Duration::from_secs(5))
    }

    #[test]
    fn default_interpreter_is_jxa() {
        let cfg = InterpreterConfig::default();
        assert_eq!(cfg.program, "osascript");
        assert_eq!(cfg.args, vec!["-l", "JavaScript", "-e"]);
    }

    #[tokio::test]
    async fn script_is_passed_as_single_argument() {
        let out = bash_executor()
            .execute(r#"echo '{"tasks": []}'"#)
            .await
            .expect("execute");
        assert_eq!(out.stdout.trim(), r#"{"tasks": []}"#);
    }

    #[tokio::test]
    async fn nonzero_exit_is_execution_failed() {
        let result = bash_executor()
            .execute("echo 'execution error: -1728' >&2; exit 1")
            .await;
        assert_matches!(
            result,
            Err(BridgeError::ExecutionFailed { exit_code: 1, ref stderr })
                if stderr.contains("-1728")
        );
    }

    #[tokio::test]
    async fn missing_interpreter_is_not_execution_failed() {
        let executor = OsascriptExecutor::new(
            InterpreterConfig {
                program: "/nonexistent/osascript".to_string(),
                args: vec![],
            },
            Duration::from_secs(5),
        );
        let result = executor.execute("1").await;
        assert_matches!(
            result,
            Err(BridgeError::InterpreterNotFound(ref p)) if p == "/nonexistent/osascript"
        );
    }

    #[tokio::test]
    async fn timeout_kills_long_running_script() {
        let start = Instant::now();
        let result = bash_executor()
            .execute_with_timeout("sleep 3", Duration::from_millis(100))
            .await;
        assert_matches!(result, Err(BridgeError::Timeout { .. }));
        assert!(
            start.elapsed() < Duration::from_secs(2),
            "timeout should fire well before the script finishes (took {:?})",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn timeout_covers_descendant_holding_stdout() {
        let start = Instant::now();
        let result = bash_executor()
            .execute_with_timeout("sleep 3 & echo '{}'", Duration::from_millis(100))
            .await;
        assert_matches!(result, Err(BridgeError::Timeout { .. }));
        assert!(
            start.elapsed() < Duration::from_secs(2),
            "an exited interpreter must not wait on its descendants (took {:?})",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn cancellation_kills_in_flight_script() {
        let cancel = CancellationToken::new();
        let executor = bash_executor().with_cancellation(cancel.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        });

        let start = Instant::now();
        let result = executor
            .execute_with_timeout("sleep 3", Duration::from_secs(10))
            .await;
        canceller.await.expect("canceller task");

        assert_matches!(result, Err(BridgeError::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn cancellation_covers_descendant_holding_stdout() {
        let cancel = CancellationToken::new();
        let executor = bash_executor().with_cancellation(cancel.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        });

        let start = Instant::now();
        let result = executor
            .execute_with_timeout("sleep 3 & echo '{}'", Duration::from_secs(10))
            .await;
        canceller.await.expect("canceller task");

        assert_matches!(result, Err(BridgeError::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
