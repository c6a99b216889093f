//! `focusbridge-core` -- the script execution bridge.
//!
//! Renders parameterized JXA templates, runs them through `osascript` with
//! an enforced timeout, retries timeouts with bounded backoff, and decodes
//! the interpreter's JSON stdout into typed payloads or classified errors.
//!
//! The per-operation entry point is [`bridge::ScriptBridge`].

pub mod bridge;
pub mod error;
pub mod response;
pub mod scripting;
pub mod templates;
pub mod types;

pub use bridge::{BridgeSettings, Operation, Payload, ScriptBridge};
pub use error::{BridgeError, BridgeResult, ConfigError};
