//! Shared subprocess management utilities.
//!
//! Provides [`run_command`]: spawn, capture stdout/stderr, and enforce a
//! deadline and a cancellation token. Executors build a
//! [`tokio::process::Command`] for their interpreter and delegate here.

use std::io::ErrorKind;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use super::executor::ScriptOutput;
use crate::error::BridgeError;

/// Maximum stdout or stderr size captured per stream (10 MiB).
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Spawn `cmd`, capture its output, and wait at most `timeout` for it to
/// exit and close both pipes.
///
/// `program` is only used to label [`BridgeError::InterpreterNotFound`].
/// The child runs in its own process group. On timeout or cancellation the
/// whole group is killed and the child reaped before returning, so neither
/// the interpreter nor anything it backgrounded outlives the call.
pub async fn run_command(
    cmd: &mut Command,
    program: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<ScriptOutput, BridgeError> {
    // `kill_on_drop(true)` covers the case where the caller drops this future.
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    if cancel.is_cancelled() {
        return Err(BridgeError::Cancelled);
    }

    let start = Instant::now();
    let deadline = tokio::time::Instant::now() + timeout;
    let mut child = cmd.spawn().map_err(|e| classify_spawn_error(program, e))?;
    let pid = child.id();
    tracing::debug!(program, pid, "Spawned interpreter");

    // Drain both pipes concurrently so a chatty child cannot block on a full
    // pipe while we wait for it.
    let mut stdout_task = tokio::spawn(read_stream(child.stdout.take()));
    let mut stderr_task = tokio::spawn(read_stream(child.stderr.take()));

    // The deadline covers the drains too: a backgrounded descendant can hold
    // a pipe open long after the interpreter itself has exited.
    let waited = tokio::select! {
        result = tokio::time::timeout_at(
            deadline,
            wait_and_drain(&mut child, &mut stdout_task, &mut stderr_task),
        ) => Some(result),
        _ = cancel.cancelled() => None,
    };

    let (status, stdout_bytes, stderr_bytes) = match waited {
        Some(Ok(collected)) => collected?,
        Some(Err(_elapsed)) => {
            stdout_task.abort();
            stderr_task.abort();
            kill_and_reap(&mut child, pid, program).await;
            tracing::warn!(
                program,
                timeout_ms = timeout.as_millis() as u64,
                "Interpreter timed out and was killed",
            );
            return Err(BridgeError::timeout(start.elapsed()));
        }
        None => {
            stdout_task.abort();
            stderr_task.abort();
            kill_and_reap(&mut child, pid, program).await;
            tracing::info!(program, "Interpreter cancelled and was killed");
            return Err(BridgeError::Cancelled);
        }
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    let stdout = String::from_utf8_lossy(&stdout_bytes).into_owned();
    let stderr = String::from_utf8_lossy(&stderr_bytes).into_owned();
    // `-1` when the child was killed by a signal.
    let exit_code = status.code().unwrap_or(-1);

    tracing::debug!(program, exit_code, duration_ms, "Interpreter exited");

    if exit_code != 0 {
        return Err(BridgeError::ExecutionFailed {
            exit_code,
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(ScriptOutput {
        stdout,
        stderr,
        exit_code,
        duration_ms,
    })
}

/// Wait for the child to exit and for both readers to reach end of stream.
async fn wait_and_drain(
    child: &mut Child,
    stdout_task: &mut JoinHandle<Vec<u8>>,
    stderr_task: &mut JoinHandle<Vec<u8>>,
) -> Result<(ExitStatus, Vec<u8>, Vec<u8>), BridgeError> {
    let status = child.wait().await?;
    let stdout = stdout_task.await.map_err(reader_failed)?;
    let stderr = stderr_task.await.map_err(reader_failed)?;
    Ok((status, stdout, stderr))
}

fn reader_failed(err: JoinError) -> BridgeError {
    BridgeError::Io(std::io::Error::other(err))
}

/// Map a spawn failure to its classified error.
///
/// A missing or non-launchable binary is an environment problem distinct
/// from every other OS error.
fn classify_spawn_error(program: &str, err: std::io::Error) -> BridgeError {
    match err.kind() {
        ErrorKind::NotFound | ErrorKind::PermissionDenied => {
            BridgeError::InterpreterNotFound(program.to_string())
        }
        _ => BridgeError::Io(err),
    }
}

/// Force-kill the child's process group and wait for the child so it does
/// not linger as a zombie.
async fn kill_and_reap(child: &mut Child, pid: Option<u32>, program: &str) {
    #[cfg(unix)]
    if let Some(pid) = pid.and_then(|p| libc::pid_t::try_from(p).ok()) {
        // Safety: `killpg` has no memory-safety preconditions; the group id
        // is the pid of a child we spawned with `process_group(0)`.
        let ret = unsafe { libc::killpg(pid, libc::SIGKILL) };
        if ret != 0 {
            tracing::debug!(program, pid, "Process group already gone");
        }
    }
    #[cfg(not(unix))]
    let _ = pid;

    // The child may already have exited while a descendant held the pipes.
    if child.try_wait().ok().flatten().is_none() {
        if let Err(e) = child.kill().await {
            tracing::warn!(program, error = %e, "Failed to kill interpreter");
        }
    }
}

/// Read an entire output stream into a byte buffer, capped at [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
