//! Named, immutable script templates.
//!
//! The built-in bundle is compiled into the binary from `scripts/*.js` and
//! assembled once, on first use. Each asset is prefixed with the shared
//! prelude (JSON serializers and the not-running guard).

use std::collections::HashMap;
use std::sync::LazyLock;

use super::validate::ParamPolicy;
use crate::error::BridgeError;

/// Version of the embedded script bundle. Bump when any asset changes.
pub const BUNDLE_VERSION: &str = "1";

const PRELUDE: &str = include_str!("../../scripts/prelude.js");

/// `(name, body)` for every built-in script.
const ASSETS: &[(&str, &str)] = &[
    ("list_tasks", include_str!("../../scripts/list_tasks.js")),
    ("get_task", include_str!("../../scripts/get_task.js")),
    ("create_task", include_str!("../../scripts/create_task.js")),
    ("modify_task", include_str!("../../scripts/modify_task.js")),
    ("complete_task", include_str!("../../scripts/complete_task.js")),
    ("delete_task", include_str!("../../scripts/delete_task.js")),
    ("list_projects", include_str!("../../scripts/list_projects.js")),
    ("get_project", include_str!("../../scripts/get_project.js")),
    ("list_tags", include_str!("../../scripts/list_tags.js")),
    ("get_tag", include_str!("../../scripts/get_tag.js")),
    ("task_counts", include_str!("../../scripts/task_counts.js")),
];

/// Placeholders whose policy is pinned rather than inferred from the name.
const POLICY_OVERRIDES: &[(&str, ParamPolicy)] = &[("Flagged", ParamPolicy::Identifier)];

static BUILTIN: LazyLock<ScriptStore> = LazyLock::new(ScriptStore::load_builtin);

/// A named script with `{{Placeholder}}` holes.
#[derive(Debug, Clone)]
pub struct ScriptTemplate {
    name: String,
    text: String,
    policies: HashMap<String, ParamPolicy>,
}

impl ScriptTemplate {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            policies: HashMap::new(),
        }
    }

    /// Pin the validation policy for one placeholder.
    pub fn with_policy(mut self, placeholder: impl Into<String>, policy: ParamPolicy) -> Self {
        self.policies.insert(placeholder.into(), policy);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Policy for `placeholder`: the pinned one if any, else inferred.
    pub fn policy_for(&self, placeholder: &str) -> ParamPolicy {
        self.policies
            .get(placeholder)
            .copied()
            .unwrap_or_else(|| ParamPolicy::infer(placeholder))
    }
}

/// Read-only lookup of templates by name.
#[derive(Debug, Clone, Default)]
pub struct ScriptStore {
    templates: HashMap<String, ScriptTemplate>,
}

impl ScriptStore {
    /// The embedded bundle, assembled on first access.
    pub fn builtin() -> &'static ScriptStore {
        &BUILTIN
    }

    /// Build a store from arbitrary templates. Later duplicates win.
    pub fn from_templates(templates: impl IntoIterator<Item = ScriptTemplate>) -> Self {
        Self {
            templates: templates
                .into_iter()
                .map(|t| (t.name.clone(), t))
                .collect(),
        }
    }

    fn load_builtin() -> Self {
        Self::from_templates(ASSETS.iter().map(|(name, body)| {
            POLICY_OVERRIDES.iter().fold(
                ScriptTemplate::new(*name, format!("{PRELUDE}\n{body}")),
                |t, (placeholder, policy)| t.with_policy(*placeholder, *policy),
            )
        }))
    }

    pub fn get(&self, name: &str) -> Result<&ScriptTemplate, BridgeError> {
        self.templates
            .get(name)
            .ok_or_else(|| BridgeError::TemplateNotFound(name.to_string()))
    }

    /// Template names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn builtin_bundle_has_every_asset() {
        let store = ScriptStore::builtin();
        assert_eq!(store.names().len(), ASSETS.len());
        for (name, _) in ASSETS {
            assert!(store.get(name).is_ok(), "missing {name}");
        }
    }

    #[test]
    fn builtin_assets_carry_the_prelude() {
        let template = ScriptStore::builtin().get("list_tags").expect("list_tags");
        assert!(template.text().starts_with(PRELUDE));
        assert!(template.text().contains("OmniFocus is not running"));
    }

    #[test]
    fn builtin_is_assembled_once() {
        let a = ScriptStore::builtin() as *const ScriptStore;
        let b = ScriptStore::builtin() as *const ScriptStore;
        assert_eq!(a, b);
    }

    #[test]
    fn unknown_template_is_not_found() {
        assert_matches!(
            ScriptStore::builtin().get("launch_missiles"),
            Err(BridgeError::TemplateNotFound(ref n)) if n == "launch_missiles"
        );
    }

    #[test]
    fn pinned_policy_wins_over_inference() {
        let template = ScriptStore::builtin().get("create_task").expect("create_task");
        assert_eq!(template.policy_for("Flagged"), ParamPolicy::Identifier);
        assert_eq!(template.policy_for("Name"), ParamPolicy::FreeText);
        assert_eq!(template.policy_for("ProjectID"), ParamPolicy::Identifier);
    }

    #[test]
    fn names_are_sorted() {
        let store = ScriptStore::from_templates([
            ScriptTemplate::new("b", ""),
            ScriptTemplate::new("a", ""),
        ]);
        assert_eq!(store.names(), vec!["a", "b"]);
    }
}
