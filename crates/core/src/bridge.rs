//! Per-operation entry point.
//!
//! [`ScriptBridge`] composes the pieces for one call:
//! store lookup -> render -> (retrying) execute -> parse.
//! It holds no mutable state, so one bridge can serve concurrent callers.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::{BridgeError, BridgeResult};
use crate::response::{ResponseParser, DEFAULT_NOT_RUNNING_MESSAGE};
use crate::scripting::executor::ScriptExecutor;
use crate::scripting::osascript::{InterpreterConfig, OsascriptExecutor, DEFAULT_TIMEOUT};
use crate::scripting::retry::{RetryPolicy, RetryingExecutor};
use crate::templates::store::BUNDLE_VERSION;
use crate::templates::{render, ParameterSet, ScriptStore};
use crate::types::{OperationAck, Project, Tag, Task, TaskCounts};

/// Filler sent for optional parameters the caller left out. Scripts ignore
/// it because the parameter's presence flag is `false`.
pub const ABSENT: &str = "none";

/// Name of the presence flag paired with optional parameter `name`.
pub fn presence_flag(name: &str) -> String {
    format!("Has{name}")
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Everything the bridge needs, passed explicitly at construction.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub interpreter: InterpreterConfig,
    /// Per-attempt timeout used by the typed helpers.
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub not_running_message: String,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            interpreter: InterpreterConfig::default(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            not_running_message: DEFAULT_NOT_RUNNING_MESSAGE.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// A supported bridge operation. Each maps to one script template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListTasks,
    GetTask,
    CreateTask,
    ModifyTask,
    CompleteTask,
    DeleteTask,
    ListProjects,
    GetProject,
    ListTags,
    GetTag,
    TaskCounts,
}

/// Payload shape an operation's script prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Tasks,
    Task,
    Projects,
    Project,
    Tags,
    Tag,
    Ack,
    Counts,
}

impl Operation {
    pub const ALL: [Operation; 11] = [
        Self::ListTasks,
        Self::GetTask,
        Self::CreateTask,
        Self::ModifyTask,
        Self::CompleteTask,
        Self::DeleteTask,
        Self::ListProjects,
        Self::GetProject,
        Self::ListTags,
        Self::GetTag,
        Self::TaskCounts,
    ];

    /// Operation name, which is also its template name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListTasks => "list_tasks",
            Self::GetTask => "get_task",
            Self::CreateTask => "create_task",
            Self::ModifyTask => "modify_task",
            Self::CompleteTask => "complete_task",
            Self::DeleteTask => "delete_task",
            Self::ListProjects => "list_projects",
            Self::GetProject => "get_project",
            Self::ListTags => "list_tags",
            Self::GetTag => "get_tag",
            Self::TaskCounts => "task_counts",
        }
    }

    /// Look up an operation by name. Unknown names have no template.
    pub fn parse(name: &str) -> Result<Self, BridgeError> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == name)
            .ok_or_else(|| BridgeError::TemplateNotFound(name.to_string()))
    }

    pub fn shape(&self) -> Shape {
        match self {
            Self::ListTasks => Shape::Tasks,
            Self::GetTask => Shape::Task,
            Self::CreateTask | Self::ModifyTask | Self::CompleteTask | Self::DeleteTask => {
                Shape::Ack
            }
            Self::ListProjects => Shape::Projects,
            Self::GetProject => Shape::Project,
            Self::ListTags => Shape::Tags,
            Self::GetTag => Shape::Tag,
            Self::TaskCounts => Shape::Counts,
        }
    }

    /// Parameters the caller must supply.
    pub fn required_params(&self) -> &'static [&'static str] {
        match self {
            Self::GetTask | Self::ModifyTask | Self::CompleteTask | Self::DeleteTask => {
                &["TaskID"]
            }
            Self::CreateTask => &["Name"],
            Self::GetProject => &["ProjectID"],
            Self::GetTag => &["TagID"],
            Self::ListTasks | Self::ListProjects | Self::ListTags | Self::TaskCounts => &[],
        }
    }

    /// Parameters the caller may omit. Each is paired with a
    /// [`presence_flag`] so an omitted value never looks like a supplied one.
    pub fn optional_params(&self) -> &'static [&'static str] {
        match self {
            Self::ListTasks => &["ProjectID", "TagName", "Filter"],
            Self::CreateTask => &["Note", "ProjectID", "DueDate", "Flagged"],
            Self::ModifyTask => &["Name", "Note", "DueDate", "Flagged"],
            Self::ListProjects => &["Status"],
            _ => &[],
        }
    }

    /// Complete `params` for this operation: check required parameters,
    /// set every presence flag and fill omitted optional ones.
    fn prepare(&self, mut params: ParameterSet) -> Result<ParameterSet, BridgeError> {
        for name in self.required_params() {
            if !params.contains_key(*name) {
                return Err(BridgeError::validation(name, "is required"));
            }
        }
        for name in self.optional_params() {
            let present = params.contains_key(*name);
            params.insert(presence_flag(name), present.to_string());
            if !present {
                params.insert(name.to_string(), ABSENT.to_string());
            }
        }
        Ok(params)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Typed result of [`ScriptBridge::run`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Tasks(Vec<Task>),
    Task(Task),
    Projects(Vec<Project>),
    Project(Project),
    Tags(Vec<Tag>),
    Tag(Tag),
    Ack(OperationAck),
    Counts(TaskCounts),
}

// ---------------------------------------------------------------------------
// Bridge
// ---------------------------------------------------------------------------

/// Runs operations against the host application through an executor.
pub struct ScriptBridge<E> {
    store: &'static ScriptStore,
    executor: E,
    parser: ResponseParser,
    timeout: Duration,
}

impl ScriptBridge<RetryingExecutor<OsascriptExecutor>> {
    /// The production wiring: `osascript` wrapped in the retry decorator,
    /// both stopping when `cancel` fires.
    pub fn from_settings(settings: &BridgeSettings, cancel: CancellationToken) -> Self {
        let executor = OsascriptExecutor::new(settings.interpreter.clone(), settings.timeout)
            .with_cancellation(cancel.clone());
        let executor = RetryingExecutor::new(executor, settings.retry).with_cancellation(cancel);
        Self::new(
            executor,
            ResponseParser::new(settings.not_running_message.clone()),
            settings.timeout,
        )
    }
}

impl<E: ScriptExecutor> ScriptBridge<E> {
    pub fn new(executor: E, parser: ResponseParser, timeout: Duration) -> Self {
        Self {
            store: ScriptStore::builtin(),
            executor,
            parser,
            timeout,
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Run `operation` with `params`, allowing each attempt `timeout`.
    pub async fn run(
        &self,
        operation: Operation,
        params: ParameterSet,
        timeout: Duration,
    ) -> BridgeResult<Payload> {
        let stdout = self.exec(operation, params, timeout).await?;
        let p = &self.parser;
        match operation.shape() {
            Shape::Tasks => p.parse_tasks(&stdout).map(Payload::Tasks),
            Shape::Task => p.parse_task(&stdout).map(Payload::Task),
            Shape::Projects => p.parse_projects(&stdout).map(Payload::Projects),
            Shape::Project => p.parse_project(&stdout).map(Payload::Project),
            Shape::Tags => p.parse_tags(&stdout).map(Payload::Tags),
            Shape::Tag => p.parse_tag(&stdout).map(Payload::Tag),
            Shape::Ack => p.parse_ack(&stdout).map(Payload::Ack),
            Shape::Counts => p.parse_counts(&stdout).map(Payload::Counts),
        }
    }

    /// [`ScriptBridge::run`] with the operation given by name.
    pub async fn run_named(
        &self,
        operation: &str,
        params: ParameterSet,
        timeout: Duration,
    ) -> BridgeResult<Payload> {
        self.run(Operation::parse(operation)?, params, timeout).await
    }

    pub async fn list_tasks(&self, query: &TaskQuery) -> BridgeResult<Vec<Task>> {
        let stdout = self
            .exec(Operation::ListTasks, query.to_params(), self.timeout)
            .await?;
        self.parser.parse_tasks(&stdout)
    }

    pub async fn get_task(&self, task_id: &str) -> BridgeResult<Task> {
        let stdout = self
            .exec(Operation::GetTask, single("TaskID", task_id), self.timeout)
            .await?;
        self.parser.parse_task(&stdout)
    }

    pub async fn create_task(&self, task: &NewTask) -> BridgeResult<OperationAck> {
        self.ack(Operation::CreateTask, task.to_params()).await
    }

    pub async fn modify_task(
        &self,
        task_id: &str,
        changes: &TaskChanges,
    ) -> BridgeResult<OperationAck> {
        let mut params = changes.to_params();
        params.insert("TaskID".to_string(), task_id.to_string());
        self.ack(Operation::ModifyTask, params).await
    }

    pub async fn complete_task(&self, task_id: &str) -> BridgeResult<OperationAck> {
        self.ack(Operation::CompleteTask, single("TaskID", task_id))
            .await
    }

    pub async fn delete_task(&self, task_id: &str) -> BridgeResult<OperationAck> {
        self.ack(Operation::DeleteTask, single("TaskID", task_id)).await
    }

    pub async fn list_projects(&self, status: Option<&str>) -> BridgeResult<Vec<Project>> {
        let mut params = ParameterSet::new();
        if let Some(status) = status {
            params.insert("Status".to_string(), status.to_string());
        }
        let stdout = self
            .exec(Operation::ListProjects, params, self.timeout)
            .await?;
        self.parser.parse_projects(&stdout)
    }

    pub async fn get_project(&self, project_id: &str) -> BridgeResult<Project> {
        let stdout = self
            .exec(Operation::GetProject, single("ProjectID", project_id), self.timeout)
            .await?;
        self.parser.parse_project(&stdout)
    }

    pub async fn list_tags(&self) -> BridgeResult<Vec<Tag>> {
        let stdout = self
            .exec(Operation::ListTags, ParameterSet::new(), self.timeout)
            .await?;
        self.parser.parse_tags(&stdout)
    }

    pub async fn get_tag(&self, tag_id: &str) -> BridgeResult<Tag> {
        let stdout = self
            .exec(Operation::GetTag, single("TagID", tag_id), self.timeout)
            .await?;
        self.parser.parse_tag(&stdout)
    }

    pub async fn task_counts(&self) -> BridgeResult<TaskCounts> {
        let stdout = self
            .exec(Operation::TaskCounts, ParameterSet::new(), self.timeout)
            .await?;
        self.parser.parse_counts(&stdout)
    }

    async fn ack(&self, operation: Operation, params: ParameterSet) -> BridgeResult<OperationAck> {
        let stdout = self.exec(operation, params, self.timeout).await?;
        self.parser.parse_ack(&stdout)
    }

    /// Render and execute `operation`, returning raw stdout.
    async fn exec(
        &self,
        operation: Operation,
        params: ParameterSet,
        timeout: Duration,
    ) -> BridgeResult<String> {
        let params = operation.prepare(params)?;
        let script = render(self.store, operation.as_str(), &params)?;

        tracing::debug!(
            operation = operation.as_str(),
            bundle = BUNDLE_VERSION,
            timeout_ms = timeout.as_millis() as u64,
            "Running operation",
        );

        match self.executor.execute_with_timeout(&script, timeout).await {
            Ok(output) => {
                tracing::debug!(
                    operation = operation.as_str(),
                    duration_ms = output.duration_ms,
                    "Operation finished",
                );
                Ok(output.stdout)
            }
            Err(e) => {
                tracing::warn!(operation = operation.as_str(), error = %e, "Operation failed");
                Err(e)
            }
        }
    }
}

fn single(name: &str, value: &str) -> ParameterSet {
    ParameterSet::from([(name.to_string(), value.to_string())])
}

// ---------------------------------------------------------------------------
// Typed request parameters
// ---------------------------------------------------------------------------

/// Which tasks `list_tasks` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskFilter {
    /// Incomplete and not blocked.
    #[default]
    Available,
    Flagged,
    Completed,
    All,
}

impl TaskFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Flagged => "flagged",
            Self::Completed => "completed",
            Self::All => "all",
        }
    }
}

/// Scope and filter for `list_tasks`.
#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    pub project_id: Option<String>,
    pub tag_name: Option<String>,
    pub filter: TaskFilter,
}

impl TaskQuery {
    fn to_params(&self) -> ParameterSet {
        let mut params = single("Filter", self.filter.as_str());
        insert_opt(&mut params, "ProjectID", self.project_id.as_deref());
        insert_opt(&mut params, "TagName", self.tag_name.as_deref());
        params
    }
}

/// Fields for `create_task`.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub name: String,
    pub note: Option<String>,
    pub project_id: Option<String>,
    /// RFC3339 due date.
    pub due_date: Option<String>,
    pub flagged: Option<bool>,
}

impl NewTask {
    fn to_params(&self) -> ParameterSet {
        let mut params = single("Name", &self.name);
        insert_opt(&mut params, "Note", self.note.as_deref());
        insert_opt(&mut params, "ProjectID", self.project_id.as_deref());
        insert_opt(&mut params, "DueDate", self.due_date.as_deref());
        insert_opt(&mut params, "Flagged", self.flagged.map(bool_str));
        params
    }
}

/// Fields changed by `modify_task`; `None` leaves a field as it is.
#[derive(Debug, Clone, Default)]
pub struct TaskChanges {
    pub name: Option<String>,
    pub note: Option<String>,
    /// RFC3339 due date, or `clear` to remove it.
    pub due_date: Option<String>,
    pub flagged: Option<bool>,
}

impl TaskChanges {
    fn to_params(&self) -> ParameterSet {
        let mut params = ParameterSet::new();
        insert_opt(&mut params, "Name", self.name.as_deref());
        insert_opt(&mut params, "Note", self.note.as_deref());
        insert_opt(&mut params, "DueDate", self.due_date.as_deref());
        insert_opt(&mut params, "Flagged", self.flagged.map(bool_str));
        params
    }
}

fn insert_opt(params: &mut ParameterSet, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        params.insert(name.to_string(), value.to_string());
    }
}

fn bool_str(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
