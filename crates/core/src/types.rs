//! Typed payloads decoded from interpreter responses.
//!
//! Field names follow the wire format (camelCase). Every collection,
//! including nested child collections, decodes to an empty `Vec` when the
//! field is absent or `null`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// An OmniFocus action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub note: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub flagged: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub completed: bool,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub defer_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completion_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub estimated_minutes: Option<u32>,
    /// Sub-actions, nested to the depth the script serialized.
    #[serde(default, deserialize_with = "null_as_default")]
    pub children: Vec<Task>,
}

/// An OmniFocus project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub note: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub flagged: bool,
    #[serde(default)]
    pub folder_name: Option<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub defer_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub task_count: u32,
    /// Only populated by `get_project`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub tasks: Vec<Task>,
}

/// An OmniFocus tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub task_count: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub children: Vec<Tag>,
}

/// Result of a create/modify/complete/delete operation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OperationAck {
    pub success: bool,
    pub id: String,
    pub message: String,
}

/// Named task counts (`total`, `available`, `flagged`, ...).
pub type TaskCounts = BTreeMap<String, i64>;

/// Deserialize `null` the same way as an absent field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn minimal_task_fills_defaults() {
        let task: Task = serde_json::from_str(r#"{"id":"t1","name":"Buy milk"}"#).expect("decode");
        assert_eq!(task.id, "t1");
        assert!(task.note.is_empty());
        assert!(!task.flagged);
        assert!(task.tags.is_empty());
        assert!(task.children.is_empty());
        assert_eq!(task.due_date, None);
    }

    #[test]
    fn null_collections_decode_empty() {
        let task: Task = serde_json::from_str(
            r#"{"id":"t1","name":"x","tags":null,"children":null,"note":null}"#,
        )
        .expect("decode");
        assert!(task.tags.is_empty());
        assert!(task.children.is_empty());
        assert!(task.note.is_empty());
    }

    #[test]
    fn dates_accept_fractional_utc() {
        let task: Task = serde_json::from_str(
            r#"{"id":"t1","name":"x","dueDate":"2026-10-16T09:30:00.000Z","deferDate":null}"#,
        )
        .expect("decode");
        assert_eq!(
            task.due_date,
            Some(Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap())
        );
        assert_eq!(task.defer_date, None);
    }

    #[test]
    fn serializes_camel_case() {
        let tag = Tag {
            id: "g1".into(),
            name: "Errands".into(),
            status: "active".into(),
            task_count: 4,
            children: vec![],
        };
        let json = serde_json::to_value(&tag).expect("encode");
        assert_eq!(json["taskCount"], 4);
        assert!(json["children"].as_array().expect("array").is_empty());
    }
}
