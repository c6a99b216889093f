//! Environment configuration for the `focusbridge` binary.

use std::time::Duration;

use focusbridge_core::response::DEFAULT_NOT_RUNNING_MESSAGE;
use focusbridge_core::scripting::osascript::{InterpreterConfig, DEFAULT_TIMEOUT};
use focusbridge_core::scripting::retry::RetryPolicy;
use focusbridge_core::{BridgeSettings, ConfigError};

/// Bridge configuration loaded from environment variables.
///
/// Every field has a default suitable for a stock macOS install.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub settings: BridgeSettings,
}

impl CliConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                            | Default                      |
    /// |------------------------------------|------------------------------|
    /// | `FOCUSBRIDGE_INTERPRETER`          | `osascript -l JavaScript -e` |
    /// | `FOCUSBRIDGE_TIMEOUT_MS`           | `30000`                      |
    /// | `FOCUSBRIDGE_RETRY_MAX_ATTEMPTS`   | `3`                          |
    /// | `FOCUSBRIDGE_RETRY_INITIAL_WAIT_MS`| `100`                        |
    /// | `FOCUSBRIDGE_RETRY_MAX_WAIT_MS`    | `2000`                       |
    /// | `FOCUSBRIDGE_NOT_RUNNING_MESSAGE`  | `OmniFocus is not running`   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let interpreter = match lookup("FOCUSBRIDGE_INTERPRETER") {
            Some(line) => parse_interpreter(&line)?,
            None => InterpreterConfig::default(),
        };

        let timeout = duration_ms(&lookup, "FOCUSBRIDGE_TIMEOUT_MS", DEFAULT_TIMEOUT)?;
        if timeout.is_zero() {
            return Err(invalid("FOCUSBRIDGE_TIMEOUT_MS", "must be greater than zero"));
        }

        let defaults = RetryPolicy::default();
        let max_attempts: u32 = match lookup("FOCUSBRIDGE_RETRY_MAX_ATTEMPTS") {
            Some(v) => v
                .trim()
                .parse()
                .map_err(|_| invalid("FOCUSBRIDGE_RETRY_MAX_ATTEMPTS", "must be a valid u32"))?,
            None => defaults.max_attempts(),
        };
        let retry = RetryPolicy::new(
            max_attempts,
            duration_ms(
                &lookup,
                "FOCUSBRIDGE_RETRY_INITIAL_WAIT_MS",
                defaults.initial_wait(),
            )?,
            duration_ms(&lookup, "FOCUSBRIDGE_RETRY_MAX_WAIT_MS", defaults.max_wait())?,
        )?;

        let not_running_message = lookup("FOCUSBRIDGE_NOT_RUNNING_MESSAGE")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_NOT_RUNNING_MESSAGE.into());

        Ok(Self {
            settings: BridgeSettings {
                interpreter,
                timeout,
                retry,
                not_running_message,
            },
        })
    }
}

/// Split `program arg arg ...` on whitespace.
fn parse_interpreter(line: &str) -> Result<InterpreterConfig, ConfigError> {
    let mut parts = line.split_whitespace().map(str::to_string);
    let program = parts
        .next()
        .ok_or_else(|| invalid("FOCUSBRIDGE_INTERPRETER", "must name a program"))?;
    Ok(InterpreterConfig {
        program,
        args: parts.collect(),
    })
}

fn duration_ms(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match lookup(key) {
        Some(v) => v
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| invalid(key, "must be a whole number of milliseconds")),
        None => Ok(default),
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
