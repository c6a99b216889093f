//! `focusbridge` -- command-line front end for the OmniFocus script bridge.
//!
//! Each subcommand runs one bridge operation and prints its payload as
//! pretty JSON on stdout. Failures go to stderr with a non-zero exit.
//! Configuration comes from `FOCUSBRIDGE_*` environment variables (see
//! [`config::CliConfig::from_env`]); a `.env` file is honoured.

mod cli;
mod config;

use clap::Parser;
use focusbridge_core::{BridgeError, ScriptBridge};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;
use crate::config::CliConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "focusbridge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Cli::parse();
    let config = CliConfig::from_env()?;

    tracing::debug!(
        interpreter = %config.settings.interpreter.program,
        timeout_ms = config.settings.timeout.as_millis() as u64,
        max_attempts = config.settings.retry.max_attempts(),
        max_backoff_ms = config.settings.retry.max_total_wait().as_millis() as u64,
        "Loaded configuration",
    );

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, cancelling");
                cancel.cancel();
            }
        }
    });

    let bridge = ScriptBridge::from_settings(&config.settings, cancel);
    let command = args.command;
    let name = command.name();

    match cli::dispatch(&bridge, command).await {
        Ok(payload) => {
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(())
        }
        Err(BridgeError::NotAvailable) => {
            anyhow::bail!("OmniFocus is not running; start it and try again")
        }
        Err(e @ BridgeError::InterpreterNotFound(_)) => {
            Err(anyhow::Error::new(e)
                .context("osascript is required; set FOCUSBRIDGE_INTERPRETER to override"))
        }
        Err(e) => Err(anyhow::Error::new(e).context(format!("`{name}` failed"))),
    }
}
