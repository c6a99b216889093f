//! Parameter validation for script placeholders.
//!
//! Parameter values are spliced verbatim into JXA source, so each value is
//! checked against an allow-list before rendering. Identifiers get a strict
//! character class; free text may contain spaces and punctuation but none
//! of the characters that could close a string literal or reach a shell.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::BridgeError;

/// Maximum parameter length in characters (inclusive).
pub const MAX_PARAM_LENGTH: usize = 100;

/// Full-match pattern for identifier values.
pub const IDENTIFIER_PATTERN: &str = r"^[A-Za-z0-9_-]+$";

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(IDENTIFIER_PATTERN).expect("valid regex"));

/// Characters rejected in free-text values.
pub const FREE_TEXT_FORBIDDEN: &[char] = &[';', '|', '&', '$', '`', '"', '\'', '\\'];

/// Validation policy applied to one placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamPolicy {
    /// `[A-Za-z0-9_-]{1,100}`.
    Identifier,
    /// 1-100 characters, no control characters, nothing from
    /// [`FREE_TEXT_FORBIDDEN`].
    FreeText,
}

impl ParamPolicy {
    /// Choose a policy from the placeholder name: names ending in `ID` or
    /// `id` are identifiers, everything else is free text.
    pub fn infer(name: &str) -> Self {
        if name.ends_with("ID") || name.ends_with("id") {
            Self::Identifier
        } else {
            Self::FreeText
        }
    }
}

/// Validate `value` for the placeholder `name`, inferring the policy from
/// the name.
pub fn validate(name: &str, value: &str) -> Result<(), BridgeError> {
    validate_with(name, value, ParamPolicy::infer(name))
}

/// Validate `value` for the placeholder `name` under an explicit policy.
pub fn validate_with(name: &str, value: &str, policy: ParamPolicy) -> Result<(), BridgeError> {
    let len = value.chars().count();
    if len == 0 {
        return Err(BridgeError::validation(name, "must not be empty"));
    }
    if len > MAX_PARAM_LENGTH {
        return Err(BridgeError::validation(
            name,
            format!("exceeds maximum length of {MAX_PARAM_LENGTH} characters (got {len})"),
        ));
    }

    match policy {
        ParamPolicy::Identifier => {
            if IDENTIFIER_RE.is_match(value) {
                return Ok(());
            }
            let bad = value
                .chars()
                .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
                .unwrap_or('?');
            Err(BridgeError::validation(
                name,
                format!(
                    "contains disallowed character {bad:?}; identifiers may only use A-Z, a-z, 0-9, '_' and '-'"
                ),
            ))
        }
        ParamPolicy::FreeText => {
            if let Some(c) = value.chars().find(|c| c.is_control()) {
                return Err(BridgeError::validation(
                    name,
                    format!("contains control character {c:?}"),
                ));
            }
            if let Some(c) = value.chars().find(|c| FREE_TEXT_FORBIDDEN.contains(c)) {
                return Err(BridgeError::validation(
                    name,
                    format!("contains disallowed character {c:?}"),
                ));
            }
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
