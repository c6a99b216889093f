//! Command-line surface and dispatch onto the bridge.

use clap::{Parser, Subcommand, ValueEnum};
use focusbridge_core::bridge::{NewTask, TaskChanges, TaskFilter, TaskQuery};
use focusbridge_core::scripting::executor::ScriptExecutor;
use focusbridge_core::{BridgeResult, Payload, ScriptBridge};

#[derive(Parser, Debug)]
#[command(
    name = "focusbridge",
    version,
    about = "Query and update OmniFocus through osascript"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List tasks
    Tasks {
        /// Only tasks in this project
        #[arg(long)]
        project: Option<String>,
        /// Only tasks with this tag name
        #[arg(long, conflicts_with = "project")]
        tag: Option<String>,
        #[arg(long, value_enum, default_value_t = FilterArg::Available)]
        filter: FilterArg,
    },
    /// Show one task and its sub-tasks
    Task { id: String },
    /// Create a task (in the inbox unless --project is given)
    Add {
        name: String,
        #[arg(long)]
        note: Option<String>,
        #[arg(long)]
        project: Option<String>,
        /// RFC3339 due date
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        flagged: bool,
    },
    /// Change fields of an existing task
    Modify {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        note: Option<String>,
        /// RFC3339 due date, or `clear`
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        flagged: Option<bool>,
    },
    /// Mark a task complete
    Complete { id: String },
    /// Delete a task
    Delete { id: String },
    /// List projects
    Projects {
        /// active, on-hold, done or dropped
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one project and its tasks
    Project { id: String },
    /// List tags
    Tags,
    /// Show one tag
    Tag { id: String },
    /// Show task counts
    Counts,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterArg {
    Available,
    Flagged,
    Completed,
    All,
}

impl From<FilterArg> for TaskFilter {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::Available => TaskFilter::Available,
            FilterArg::Flagged => TaskFilter::Flagged,
            FilterArg::Completed => TaskFilter::Completed,
            FilterArg::All => TaskFilter::All,
        }
    }
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tasks { .. } => "tasks",
            Self::Task { .. } => "task",
            Self::Add { .. } => "add",
            Self::Modify { .. } => "modify",
            Self::Complete { .. } => "complete",
            Self::Delete { .. } => "delete",
            Self::Projects { .. } => "projects",
            Self::Project { .. } => "project",
            Self::Tags => "tags",
            Self::Tag { .. } => "tag",
            Self::Counts => "counts",
        }
    }
}

/// Run one command against `bridge`.
pub async fn dispatch<E: ScriptExecutor>(
    bridge: &ScriptBridge<E>,
    command: Command,
) -> BridgeResult<Payload> {
    match command {
        Command::Tasks {
            project,
            tag,
            filter,
        } => {
            let query = TaskQuery {
                project_id: project,
                tag_name: tag,
                filter: filter.into(),
            };
            bridge.list_tasks(&query).await.map(Payload::Tasks)
        }
        Command::Task { id } => bridge.get_task(&id).await.map(Payload::Task),
        Command::Add {
            name,
            note,
            project,
            due,
            flagged,
        } => {
            let task = NewTask {
                name,
                note,
                project_id: project,
                due_date: due,
                flagged: flagged.then_some(true),
            };
            bridge.create_task(&task).await.map(Payload::Ack)
        }
        Command::Modify {
            id,
            name,
            note,
            due,
            flagged,
        } => {
            let changes = TaskChanges {
                name,
                note,
                due_date: due,
                flagged,
            };
            bridge.modify_task(&id, &changes).await.map(Payload::Ack)
        }
        Command::Complete { id } => bridge.complete_task(&id).await.map(Payload::Ack),
        Command::Delete { id } => bridge.delete_task(&id).await.map(Payload::Ack),
        Command::Projects { status } => bridge
            .list_projects(status.as_deref())
            .await
            .map(Payload::Projects),
        Command::Project { id } => bridge.get_project(&id).await.map(Payload::Project),
        Command::Tags => bridge.list_tags().await.map(Payload::Tags),
        Command::Tag { id } => bridge.get_tag(&id).await.map(Payload::Tag),
        Command::Counts => bridge.task_counts().await.map(Payload::Counts),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use focusbridge_core::response::ResponseParser;
    use focusbridge_core::scripting::stub::StubExecutor;
    use focusbridge_core::BridgeError;

    use super::*;

    fn parse(args: &[&str]) -> Command {
        Cli::try_parse_from(std::iter::once("focusbridge").chain(args.iter().copied()))
            .expect("valid arguments")
            .command
    }

    fn bridge(stdout: &[&str]) -> ScriptBridge<StubExecutor> {
        ScriptBridge::new(
            StubExecutor::replying(stdout),
            ResponseParser::default(),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn parses_task_listing_flags() {
        assert_eq!(
            parse(&["tasks", "--tag", "Errands", "--filter", "flagged"]),
            Command::Tasks {
                project: None,
                tag: Some("Errands".into()),
                filter: FilterArg::Flagged,
            }
        );
    }

    #[test]
    fn project_and_tag_scopes_conflict() {
        let result = Cli::try_parse_from(["focusbridge", "tasks", "--project", "p1", "--tag", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn parses_modify_with_optional_flag() {
        assert_eq!(
            parse(&["modify", "t1", "--flagged", "false", "--due", "clear"]),
            Command::Modify {
                id: "t1".into(),
                name: None,
                note: None,
                due: Some("clear".into()),
                flagged: Some(false),
            }
        );
    }

    #[tokio::test]
    async fn counts_dispatches_to_task_counts() {
        let b = bridge(&[r#"{"counts":{"inbox":4}}"#]);
        let payload = dispatch(&b, Command::Counts).await.expect("counts");
        assert_matches!(payload, Payload::Counts(ref c) if c.get("inbox") == Some(&4));
    }

    #[tokio::test]
    async fn unflagged_add_leaves_flag_unset() {
        let b = bridge(&[r#"{"success":true,"id":"n1","message":"Created task: Milk"}"#]);
        let cmd = parse(&["add", "Milk"]);
        dispatch(&b, cmd).await.expect("add");
        let script = &b.executor().scripts()[0];
        assert!(script.contains(r#"const flagged = optional("false", "none")"#));
    }

    #[tokio::test]
    async fn errors_pass_through_unchanged() {
        let b = bridge(&[r#"{"error":"OmniFocus is not running"}"#]);
        assert_matches!(
            dispatch(&b, Command::Tags).await,
            Err(BridgeError::NotAvailable)
        );
    }
}
