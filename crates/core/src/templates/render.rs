//! Template rendering: validated, non-evaluating placeholder substitution.
//!
//! A placeholder is `{{Name}}` (optionally padded with spaces inside the
//! braces). Substitution is a single regex pass that copies each validated
//! value in literally; nothing in a value is ever interpreted.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::store::{ScriptStore, ScriptTemplate};
use super::validate::validate_with;
use crate::error::BridgeError;

/// Placeholder name -> value for one render call.
pub type ParameterSet = BTreeMap<String, String>;

/// Regex pattern matching a well-formed `{{Name}}` placeholder.
pub const PLACEHOLDER_PATTERN: &str = r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}";

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PLACEHOLDER_PATTERN).expect("valid regex"));

/// Look up `template_name` in `store` and render it with `params`.
pub fn render(
    store: &ScriptStore,
    template_name: &str,
    params: &ParameterSet,
) -> Result<String, BridgeError> {
    let template = store.get(template_name)?;
    render_template(template, params)
}

/// Render `template` with `params`.
///
/// An empty parameter set returns the text unchanged. Otherwise every
/// parameter is validated before any substitution happens, so a single bad
/// value aborts the whole render.
pub fn render_template(
    template: &ScriptTemplate,
    params: &ParameterSet,
) -> Result<String, BridgeError> {
    if params.is_empty() {
        return Ok(template.text().to_string());
    }

    for (name, value) in params {
        validate_with(name, value, template.policy_for(name))?;
    }

    check_syntax(template)?;

    let mut unresolved: Vec<String> = Vec::new();
    let text = PLACEHOLDER_RE
        .replace_all(template.text(), |caps: &Captures| {
            let key = &caps[1];
            match params.get(key) {
                Some(value) => value.clone(),
                None => {
                    unresolved.push(key.to_string());
                    String::new()
                }
            }
        })
        .into_owned();

    if !unresolved.is_empty() {
        unresolved.sort();
        unresolved.dedup();
        return Err(BridgeError::malformed(
            template.name(),
            format!("unresolved placeholders: {}", unresolved.join(", ")),
        ));
    }

    let used = placeholders(template.text());
    for name in params.keys().filter(|k| !used.contains(*k)) {
        tracing::debug!(template = template.name(), parameter = %name, "Unused parameter");
    }

    Ok(text)
}

/// Sorted, de-duplicated placeholder names appearing in `text`.
pub fn placeholders(text: &str) -> Vec<String> {
    let mut names: Vec<String> = PLACEHOLDER_RE
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Every `{{` must open a well-formed placeholder.
fn check_syntax(template: &ScriptTemplate) -> Result<(), BridgeError> {
    let text = template.text();
    let well_formed: Vec<usize> = PLACEHOLDER_RE.find_iter(text).map(|m| m.start()).collect();
    if let Some((offset, _)) = text
        .match_indices("{{")
        .find(|(offset, _)| !well_formed.contains(offset))
    {
        return Err(BridgeError::malformed(
            template.name(),
            format!("bad placeholder syntax at byte {offset}"),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
