use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::ArborError;
use crate::id::{ContainerId, DependencyId, TaskId};

/// Workflow status label.
///
/// The set is open (custom kanban columns are allowed), but a few labels carry
/// readiness meaning: `done`/`completed` satisfy prerequisites and
/// `todo`/`backlog` mean the task has not started.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Status(String);

impl Status {
    pub const TODO: &'static str = "todo";
    pub const BACKLOG: &'static str = "backlog";
    pub const IN_PROGRESS: &'static str = "in_progress";
    pub const REVIEW: &'static str = "review";
    pub const DONE: &'static str = "done";
    pub const COMPLETED: &'static str = "completed";
    pub const BLOCKED: &'static str = "blocked";

    pub fn new(label: impl Into<String>) -> Result<Self, ArborError> {
        let label = label.into();
        let trimmed = label.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(ArborError::InvalidStatus(label));
        }
        Ok(Self(trimmed.to_lowercase()))
    }

    pub fn todo() -> Self {
        Self(Self::TODO.to_string())
    }

    pub fn done() -> Self {
        Self(Self::DONE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `done` or `completed`
    pub fn is_done(&self) -> bool {
        matches!(self.0.as_str(), Self::DONE | Self::COMPLETED)
    }

    /// `todo` or `backlog`
    pub fn is_not_started(&self) -> bool {
        matches!(self.0.as_str(), Self::TODO | Self::BACKLOG)
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::todo()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Status {
    type Err = ArborError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl ToSql for Status {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.as_str()))
    }
}

impl FromSql for Status {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(Self(value.as_str()?.to_string()))
    }
}

/// Temporal relationship between a dependent task and its prerequisite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// Dependent may start once the prerequisite is done.
    #[default]
    FinishToStart,
    /// Dependent may start once the prerequisite has started.
    StartToStart,
    /// Dependent may finish once the prerequisite is done.
    FinishToFinish,
    /// Dependent may finish once the prerequisite has started.
    StartToFinish,
}

impl DependencyKind {
    pub const ALL: [DependencyKind; 4] = [
        DependencyKind::FinishToStart,
        DependencyKind::StartToStart,
        DependencyKind::FinishToFinish,
        DependencyKind::StartToFinish,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyKind::FinishToStart => "finish_to_start",
            DependencyKind::StartToStart => "start_to_start",
            DependencyKind::FinishToFinish => "finish_to_finish",
            DependencyKind::StartToFinish => "start_to_finish",
        }
    }

    /// Short form used by the CLI (`fs`, `ss`, `ff`, `sf`).
    pub fn short(&self) -> &'static str {
        match self {
            DependencyKind::FinishToStart => "fs",
            DependencyKind::StartToStart => "ss",
            DependencyKind::FinishToFinish => "ff",
            DependencyKind::StartToFinish => "sf",
        }
    }

    /// Whether an edge of this kind keeps the dependent from starting, given
    /// the prerequisite's current status.
    ///
    /// Finish-side kinds constrain completion of the dependent and never gate
    /// its start.
    pub fn blocks_start(&self, prerequisite: &Status) -> bool {
        match self {
            DependencyKind::FinishToStart => !prerequisite.is_done(),
            DependencyKind::StartToStart => prerequisite.is_not_started(),
            DependencyKind::FinishToFinish | DependencyKind::StartToFinish => false,
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependencyKind {
    type Err = ArborError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        DependencyKind::ALL
            .into_iter()
            .find(|k| {
                k.as_str() == normalized
                    || k.short() == normalized
                    || k.as_str().replace('_', "") == normalized
            })
            .ok_or_else(|| ArborError::InvalidDependencyKind(s.to_string()))
    }
}

impl ToSql for DependencyKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for DependencyKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        s.parse()
            .map_err(|e: ArborError| FromSqlError::Other(e.to_string().into()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub id: ContainerId,
    pub name: String,
    pub owner: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub container_id: ContainerId,
    pub parent_id: Option<TaskId>,
    pub title: String,
    pub status: Status,
    /// Slot among all siblings under the same parent (tree/list view).
    pub position: i64,
    /// Slot among siblings sharing this task's status (kanban column).
    pub column_position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// This task's slot in the sequence `key` orders.
    pub fn slot_in(&self, key: &GroupKey) -> i64 {
        if key.is_column() {
            self.column_position
        } else {
            self.position
        }
    }
}

/// Directed edge: `from_id` depends on `to_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyEdge {
    pub id: DependencyId,
    pub from_id: TaskId,
    pub to_id: TaskId,
    pub kind: DependencyKind,
    pub created_at: DateTime<Utc>,
}

/// Which sibling dimension positions are dense over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Grouping {
    /// Siblings under the same parent (tree/list view)
    #[default]
    Parent,
    /// Siblings under the same parent with the same status (kanban column)
    ParentAndStatus,
}

/// Concrete ordering group: every task matching it shares one dense sequence
/// of positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupKey {
    pub container_id: ContainerId,
    pub parent_id: Option<TaskId>,
    pub status: Option<Status>,
}

impl GroupKey {
    pub fn for_task(task: &Task, grouping: Grouping) -> Self {
        Self {
            container_id: task.container_id.clone(),
            parent_id: task.parent_id.clone(),
            status: match grouping {
                Grouping::Parent => None,
                Grouping::ParentAndStatus => Some(task.status.clone()),
            },
        }
    }

    pub fn siblings(container_id: &ContainerId, parent_id: Option<&TaskId>) -> Self {
        Self {
            container_id: container_id.clone(),
            parent_id: parent_id.cloned(),
            status: None,
        }
    }

    pub fn column(container_id: &ContainerId, parent_id: Option<&TaskId>, status: &Status) -> Self {
        Self {
            status: Some(status.clone()),
            ..Self::siblings(container_id, parent_id)
        }
    }

    /// Kanban columns keep their own sequence (`column_position`), so a
    /// column reorder never disturbs the sibling order.
    pub fn is_column(&self) -> bool {
        self.status.is_some()
    }
}

/// A prerequisite currently keeping a task from starting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockingEntry {
    pub dependency_id: DependencyId,
    pub prerequisite_id: TaskId,
    pub prerequisite_title: String,
    pub prerequisite_status: Status,
    pub kind: DependencyKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Readiness {
    pub can_start: bool,
    #[serde(default)]
    pub blocking: Vec<BlockingEntry>,
}

impl Readiness {
    pub fn ready() -> Self {
        Self {
            can_start: true,
            blocking: Vec::new(),
        }
    }

    /// Result reported for a task that no longer exists.
    pub fn missing() -> Self {
        Self {
            can_start: false,
            blocking: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateTaskInput {
    pub container_id: ContainerId,
    pub parent_id: Option<TaskId>,
    pub status: Option<Status>,
    pub title: String,
}

/// Field-level patch applied by the task store. `None` leaves a field as is;
/// `parent_id: Some(None)` clears the parent.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub container_id: Option<ContainerId>,
    pub parent_id: Option<Option<TaskId>>,
    pub title: Option<String>,
    pub status: Option<Status>,
    pub position: Option<i64>,
    pub column_position: Option<i64>,
}

impl TaskPatch {
    pub fn position(position: i64) -> Self {
        Self {
            position: Some(position),
            ..Default::default()
        }
    }

    /// Patch writing `slot` into whichever sequence `key` orders.
    pub fn slot(key: &GroupKey, slot: i64) -> Self {
        if key.is_column() {
            Self {
                column_position: Some(slot),
                ..Default::default()
            }
        } else {
            Self::position(slot)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.container_id.is_none()
            && self.parent_id.is_none()
            && self.title.is_none()
            && self.status.is_none()
            && self.position.is_none()
            && self.column_position.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListTasksFilter {
    pub container_id: Option<ContainerId>,
    pub parent_id: Option<TaskId>,
    /// Only tasks without a parent
    pub roots_only: bool,
    pub status: Option<Status>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTree {
    pub task: Task,
    pub children: Vec<TaskTree>,
}
