//! Script templates: the embedded asset store, the parameter validator,
//! and the renderer that merges one into the other.

pub mod render;
pub mod store;
pub mod validate;

pub use render::{render, render_template, ParameterSet};
pub use store::{ScriptStore, ScriptTemplate};
pub use validate::{validate, validate_with, ParamPolicy};
