use thiserror::Error;

use crate::id::{ContainerId, DependencyId, TaskId};
use crate::types::BlockingEntry;

#[derive(Error, Debug)]
pub enum ArborError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Parent task not found: {0}")]
    ParentNotFound(TaskId),

    #[error("Container not found: {0}")]
    ContainerNotFound(ContainerId),

    #[error("Dependency not found: {0}")]
    DependencyNotFound(DependencyId),

    #[error("A task cannot depend on itself")]
    SelfDependency,

    #[error("Tasks {from} and {to} belong to different containers")]
    CrossContainer { from: TaskId, to: TaskId },

    #[error("Dependency {from} -> {to} already exists")]
    DuplicateDependency { from: TaskId, to: TaskId },

    #[error("Adding dependency {from} -> {to} would create a cycle")]
    CircularDependency { from: TaskId, to: TaskId },

    #[error("Cannot move {task_id} under {new_parent_id}: it is the task itself or one of its descendants")]
    CyclicHierarchy {
        task_id: TaskId,
        new_parent_id: TaskId,
    },

    #[error("Task {task_id} is already in container {container_id}")]
    SameContainer {
        task_id: TaskId,
        container_id: ContainerId,
    },

    #[error("Cannot reorder {task_id} relative to {target_id}: tasks have different parents")]
    NotSiblings { task_id: TaskId, target_id: TaskId },

    #[error("Task {task_id} is blocked by {} prerequisite(s)", blocking.len())]
    NotReady {
        task_id: TaskId,
        blocking: Vec<BlockingEntry>,
    },

    #[error("Invalid dependency kind: {0} (expected fs, ss, ff or sf)")]
    InvalidDependencyKind(String),

    #[error("Invalid status label: {0:?}")]
    InvalidStatus(String),

    #[error("Invalid title: must not be empty")]
    EmptyTitle,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ArborError {
    /// Stale reference: the entity was deleted or never existed.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ArborError::TaskNotFound(_)
                | ArborError::ParentNotFound(_)
                | ArborError::ContainerNotFound(_)
                | ArborError::DependencyNotFound(_)
        )
    }

    /// Rejected input that may succeed once corrected. Circular dependencies
    /// are excluded: the same arguments will always fail.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ArborError::SelfDependency
                | ArborError::CrossContainer { .. }
                | ArborError::DuplicateDependency { .. }
                | ArborError::CyclicHierarchy { .. }
                | ArborError::SameContainer { .. }
                | ArborError::NotSiblings { .. }
                | ArborError::NotReady { .. }
                | ArborError::InvalidDependencyKind(_)
                | ArborError::InvalidStatus(_)
                | ArborError::EmptyTitle
        )
    }
}

pub type Result<T> = std::result::Result<T, ArborError>;
