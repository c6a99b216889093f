//! Timeout-only retry decorator with bounded exponential backoff.
//!
//! [`RetryingExecutor`] wraps any [`ScriptExecutor`] and re-runs a script
//! only when the previous attempt timed out. Every other failure is
//! deterministic and is returned on the first attempt.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::executor::{ScriptExecutor, ScriptOutput};
use crate::error::{BridgeError, ConfigError};

/// Attempt budget and backoff bounds. Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_wait: Duration,
    max_wait: Duration,
}

impl RetryPolicy {
    /// Build a policy, rejecting `max_attempts == 0`, a zero initial wait,
    /// or a `max_wait` below `initial_wait`.
    pub fn new(
        max_attempts: u32,
        initial_wait: Duration,
        max_wait: Duration,
    ) -> Result<Self, ConfigError> {
        if max_attempts == 0 {
            return Err(ConfigError::RetryPolicy(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if initial_wait.is_zero() {
            return Err(ConfigError::RetryPolicy(
                "initial_wait must be greater than zero".to_string(),
            ));
        }
        if max_wait < initial_wait {
            return Err(ConfigError::RetryPolicy(format!(
                "max_wait ({}ms) must not be below initial_wait ({}ms)",
                max_wait.as_millis(),
                initial_wait.as_millis()
            )));
        }
        Ok(Self {
            max_attempts,
            initial_wait,
            max_wait,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn initial_wait(&self) -> Duration {
        self.initial_wait
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// The wait after `current`: doubled, clamped to `max_wait`.
    pub fn next_wait(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_wait)
    }

    /// Upper bound on total backoff sleep across all attempts.
    pub fn max_total_wait(&self) -> Duration {
        self.max_wait.saturating_mul(self.max_attempts - 1)
    }
}

impl Default for RetryPolicy {
    /// 3 attempts, 100ms initial wait, 2s cap.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_wait: Duration::from_millis(100),
            max_wait: Duration::from_secs(2),
        }
    }
}

/// Decorator that retries timed-out attempts of the wrapped executor.
pub struct RetryingExecutor<E> {
    inner: E,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl<E: ScriptExecutor> RetryingExecutor<E> {
    pub fn new(inner: E, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort pending backoff sleeps when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }
}

impl<E: ScriptExecutor> ScriptExecutor for RetryingExecutor<E> {
    fn default_timeout(&self) -> Duration {
        self.inner.default_timeout()
    }

    async fn execute_with_timeout(
        &self,
        script: &str,
        timeout: Duration,
    ) -> Result<ScriptOutput, BridgeError> {
        let mut wait = self.policy.initial_wait;
        let mut attempt = 1u32;

        loop {
            let err = match self.inner.execute_with_timeout(script, timeout).await {
                Ok(output) => {
                    if attempt > 1 {
                        tracing::info!(attempt, "Script succeeded after retry");
                    }
                    return Ok(output);
                }
                Err(e) => e,
            };

            if !err.is_retryable() {
                return Err(err);
            }
            if attempt >= self.policy.max_attempts {
                tracing::warn!(
                    attempts = attempt,
                    "Script timed out on every attempt, giving up",
                );
                return Err(err);
            }

            tracing::warn!(
                attempt,
                wait_ms = wait.as_millis() as u64,
                error = %err,
                "Script attempt timed out, retrying",
            );

            // Wait before the next attempt, respecting cancellation.
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(BridgeError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }

            wait = self.policy.next_wait(wait);
            attempt += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use tokio::time::Instant;

    use super::*;
    use crate::scripting::stub::StubExecutor;

    fn timeout_err() -> BridgeError {
        BridgeError::Timeout { elapsed_ms: 50 }
    }

    fn ok(stdout: &str) -> Result<ScriptOutput, BridgeError> {
        Ok(ScriptOutput::from_stdout(stdout))
    }

    #[test]
    fn default_policy_values() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts(), 3);
        assert_eq!(p.initial_wait(), Duration::from_millis(100));
        assert_eq!(p.max_wait(), Duration::from_secs(2));
    }

    #[test]
    fn policy_rejects_invalid_bounds() {
        assert!(RetryPolicy::new(0, Duration::from_millis(10), Duration::from_secs(1)).is_err());
        assert!(RetryPolicy::new(3, Duration::ZERO, Duration::from_secs(1)).is_err());
        assert!(
            RetryPolicy::new(3, Duration::from_secs(2), Duration::from_secs(1)).is_err()
        );
        assert!(RetryPolicy::new(1, Duration::from_secs(1), Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn next_wait_doubles_then_clamps() {
        let p = RetryPolicy::default();
        let mut wait = p.initial_wait();
        let expected_ms = [100, 200, 400, 800, 1600, 2000, 2000];
        for &ms in &expected_ms {
            assert_eq!(wait, Duration::from_millis(ms));
            wait = p.next_wait(wait);
        }
    }

    #[test]
    fn max_total_wait_is_bounded_by_cap() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_total_wait(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_n_timeouts() {
        let stub = StubExecutor::new(vec![
            Err(timeout_err()),
            Err(timeout_err()),
            ok("{\"tasks\":[]}"),
        ]);
        let policy =
            RetryPolicy::new(4, Duration::from_millis(100), Duration::from_millis(150))
                .expect("policy");
        let executor = RetryingExecutor::new(stub, policy);

        let start = Instant::now();
        let out = executor.execute("script").await.expect("should succeed");
        let elapsed = start.elapsed();

        assert_eq!(out.stdout, "{\"tasks\":[]}");
        assert_eq!(executor.inner().calls(), 3);
        // 100ms, then min(200ms, 150ms).
        assert!(
            elapsed >= Duration::from_millis(250),
            "expected at least 250ms of backoff, got {elapsed:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn non_timeout_failure_is_not_retried() {
        let stub = StubExecutor::new(vec![
            Err(BridgeError::ExecutionFailed {
                exit_code: 1,
                stderr: "syntax error".to_string(),
            }),
            ok("unreachable"),
        ]);
        let executor = RetryingExecutor::new(stub, RetryPolicy::default());

        let result = executor.execute("script").await;

        assert_matches!(
            result,
            Err(BridgeError::ExecutionFailed { exit_code: 1, ref stderr }) if stderr == "syntax error"
        );
        assert_eq!(executor.inner().calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn interpreter_not_found_is_not_retried() {
        let stub = StubExecutor::new(vec![Err(BridgeError::InterpreterNotFound(
            "osascript".to_string(),
        ))]);
        let executor = RetryingExecutor::new(stub, RetryPolicy::default());

        let result = executor.execute("script").await;

        assert_matches!(result, Err(BridgeError::InterpreterNotFound(_)));
        assert_eq!(executor.inner().calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_attempts_return_timeout() {
        let stub = StubExecutor::new(vec![
            Err(timeout_err()),
            Err(timeout_err()),
            Err(timeout_err()),
            ok("unreachable"),
        ]);
        let executor = RetryingExecutor::new(stub, RetryPolicy::default());

        let result = executor.execute("script").await;

        assert_matches!(result, Err(BridgeError::Timeout { .. }));
        assert_eq!(executor.inner().calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_policy_never_sleeps() {
        let stub = StubExecutor::new(vec![Err(timeout_err()), ok("unreachable")]);
        let policy = RetryPolicy::new(1, Duration::from_secs(5), Duration::from_secs(5))
            .expect("policy");
        let executor = RetryingExecutor::new(stub, policy);

        let start = Instant::now();
        let result = executor.execute("script").await;

        assert_matches!(result, Err(BridgeError::Timeout { .. }));
        assert_eq!(executor.inner().calls(), 1);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_short_circuits_backoff() {
        let stub = StubExecutor::new(vec![Err(timeout_err()), ok("unreachable")]);
        let policy = RetryPolicy::new(3, Duration::from_secs(60), Duration::from_secs(60))
            .expect("policy");
        let cancel = CancellationToken::new();
        let executor = RetryingExecutor::new(stub, policy).with_cancellation(cancel.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancel.cancel();
        });

        let start = Instant::now();
        let result = executor.execute("script").await;
        canceller.await.expect("canceller task");

        assert_matches!(result, Err(BridgeError::Cancelled));
        assert_eq!(executor.inner().calls(), 1);
        assert!(start.elapsed() < Duration::from_secs(60));
    }
}
