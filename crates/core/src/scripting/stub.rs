//! In-memory executor that replays canned results.
//!
//! Used by the retry and bridge tests, and by front ends that want to
//! exercise their rendering without OmniFocus installed.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::executor::{ScriptExecutor, ScriptOutput};
use crate::error::BridgeError;

/// Executor that returns queued results in order, one per call.
///
/// When the queue runs dry every further call fails with
/// [`BridgeError::ExecutionFailed`]. An optional per-call delay simulates a
/// slow interpreter; the delay is cut short by the call's timeout.
pub struct StubExecutor {
    responses: Mutex<VecDeque<Result<ScriptOutput, BridgeError>>>,
    scripts: Mutex<Vec<String>>,
    calls: AtomicUsize,
    delay: Duration,
    default_timeout: Duration,
}

impl StubExecutor {
    pub fn new(responses: Vec<Result<ScriptOutput, BridgeError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            scripts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            default_timeout: Duration::from_secs(30),
        }
    }

    /// A stub that answers every queued call with the given stdout.
    pub fn replying(stdout: &[&str]) -> Self {
        Self::new(
            stdout
                .iter()
                .map(|s| Ok(ScriptOutput::from_stdout(*s)))
                .collect(),
        )
    }

    /// Sleep for `delay` before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of calls received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Scripts received so far, in call order.
    pub fn scripts(&self) -> Vec<String> {
        self.scripts
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    fn next_response(&self) -> Result<ScriptOutput, BridgeError> {
        let next = self
            .responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());
        next.unwrap_or_else(|| {
            Err(BridgeError::ExecutionFailed {
                exit_code: -1,
                stderr: "stub executor has no queued response".to_string(),
            })
        })
    }
}

impl ScriptExecutor for StubExecutor {
    fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    async fn execute_with_timeout(
        &self,
        script: &str,
        timeout: Duration,
    ) -> Result<ScriptOutput, BridgeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.push(script.to_string());
        }

        if !self.delay.is_zero() {
            let start = Instant::now();
            if tokio::time::timeout(timeout, tokio::time::sleep(self.delay))
                .await
                .is_err()
            {
                return Err(BridgeError::timeout(start.elapsed()));
            }
        }

        self.next_response()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test]
    async fn replays_in_order_then_fails() {
        let stub = StubExecutor::replying(&["first", "second"]);
        assert_eq!(stub.execute("a").await.expect("first").stdout, "first");
        assert_eq!(stub.execute("b").await.expect("second").stdout, "second");
        assert_matches!(
            stub.execute("c").await,
            Err(BridgeError::ExecutionFailed { .. })
        );
        assert_eq!(stub.calls(), 3);
        assert_eq!(stub.scripts(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn slow_stub_times_out_at_the_deadline() {
        let stub = StubExecutor::replying(&["{}"]).with_delay(Duration::from_secs(3));

        let start = Instant::now();
        let result = stub
            .execute_with_timeout("script", Duration::from_millis(100))
            .await;

        assert_matches!(result, Err(BridgeError::Timeout { .. }));
        assert!(
            start.elapsed() < Duration::from_secs(1),
            "timeout should fire near 100ms, took {:?}",
            start.elapsed()
        );
    }
}
