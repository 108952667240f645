use std::collections::HashMap;

use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info};

use crate::core::cascade::{CascadeCoordinator, DeleteSummary};
use crate::core::graph::DependencyGraph;
use crate::core::ordering::OrderingEngine;
use crate::core::readiness::ReadinessEvaluator;
use crate::db::{self, container_repo, dependency_repo, task_repo};
use crate::error::{ArborError, Result};
use crate::id::{ContainerId, DependencyId, TaskId};
use crate::types::{
    Container, CreateTaskInput, DependencyEdge, DependencyKind, GroupKey, Grouping,
    ListTasksFilter, Readiness, Status, Task, TaskPatch, TaskTree,
};

/// Everything stored for one container.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerSnapshot {
    pub container: Container,
    pub tasks: Vec<Task>,
    pub dependencies: Vec<DependencyEdge>,
}

/// Entry point for callers. Each mutating method is one atomic write unit.
pub struct TaskService<'a> {
    conn: &'a Connection,
}

impl<'a> TaskService<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    // Containers

    pub fn create_container(&self, name: &str, owner: &str) -> Result<Container> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ArborError::EmptyTitle);
        }
        let container = container_repo::create_container(self.conn, name, owner)?;
        info!(id = %container.id, name = %container.name, "container created");
        Ok(container)
    }

    pub fn get_container(&self, id: &ContainerId) -> Result<Container> {
        container_repo::get_container(self.conn, id)?
            .ok_or_else(|| ArborError::ContainerNotFound(id.clone()))
    }

    pub fn list_containers(&self) -> Result<Vec<Container>> {
        container_repo::list_containers(self.conn)
    }

    // Tasks

    pub fn create_task(&self, input: &CreateTaskInput) -> Result<Task> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(ArborError::EmptyTitle);
        }

        db::write_transaction(self.conn, |tx| {
            if !container_repo::container_exists(tx, &input.container_id)? {
                return Err(ArborError::ContainerNotFound(input.container_id.clone()));
            }
            if let Some(ref parent_id) = input.parent_id {
                let parent = task_repo::get_task(tx, parent_id)?
                    .ok_or_else(|| ArborError::ParentNotFound(parent_id.clone()))?;
                if parent.container_id != input.container_id {
                    return Err(ArborError::ParentNotFound(parent_id.clone()));
                }
            }

            let status = input.status.clone().unwrap_or_default();
            let ordering = OrderingEngine::new(tx);
            let position = ordering.next_position(&GroupKey::siblings(
                &input.container_id,
                input.parent_id.as_ref(),
            ))?;
            let column_position = ordering.next_position(&GroupKey::column(
                &input.container_id,
                input.parent_id.as_ref(),
                &status,
            ))?;
            let now = chrono::Utc::now();
            let task = Task {
                id: TaskId::new(),
                container_id: input.container_id.clone(),
                parent_id: input.parent_id.clone(),
                title: title.to_string(),
                status,
                position,
                column_position,
                created_at: now,
                updated_at: now,
            };
            task_repo::insert_task(tx, &task)?;

            info!(id = %task.id, container = %task.container_id, position, "task created");
            Ok(task)
        })
    }

    pub fn get(&self, id: &TaskId) -> Result<Task> {
        task_repo::require_task(self.conn, id)
    }

    pub fn list(&self, filter: &ListTasksFilter) -> Result<Vec<Task>> {
        task_repo::list_tasks(self.conn, filter)
    }

    /// Nested view of a container, roots and children in position order.
    pub fn tree(&self, container_id: &ContainerId) -> Result<Vec<TaskTree>> {
        self.get_container(container_id)?;
        let tasks = task_repo::list_tasks(
            self.conn,
            &ListTasksFilter {
                container_id: Some(container_id.clone()),
                ..Default::default()
            },
        )?;

        let mut by_parent: HashMap<Option<TaskId>, Vec<Task>> = HashMap::new();
        for task in tasks {
            by_parent.entry(task.parent_id.clone()).or_default().push(task);
        }

        fn build(task: Task, by_parent: &mut HashMap<Option<TaskId>, Vec<Task>>) -> TaskTree {
            let children = by_parent
                .remove(&Some(task.id.clone()))
                .unwrap_or_default()
                .into_iter()
                .map(|child| build(child, by_parent))
                .collect();
            TaskTree { task, children }
        }

        let roots = by_parent.remove(&None).unwrap_or_default();
        Ok(roots
            .into_iter()
            .map(|root| build(root, &mut by_parent))
            .collect())
    }

    /// Change a task's status label. Sibling position is left as is; the task
    /// moves to the end of its new kanban column and the old column closes up.
    ///
    /// With `enforce_readiness`, leaving a not-started label for a started one
    /// is refused while prerequisites still block.
    pub fn set_status(&self, id: &TaskId, status: Status, enforce_readiness: bool) -> Result<Task> {
        db::write_transaction(self.conn, |tx| {
            let task = task_repo::require_task(tx, id)?;
            if task.status == status {
                return Ok(task);
            }

            if enforce_readiness && task.status.is_not_started() && !status.is_not_started() {
                let readiness = ReadinessEvaluator::new(tx).can_start(id)?;
                if !readiness.can_start {
                    return Err(ArborError::NotReady {
                        task_id: id.clone(),
                        blocking: readiness.blocking,
                    });
                }
            }

            // Sibling position stays; the task joins the end of its new column
            let ordering = OrderingEngine::new(tx);
            let column_position = ordering.next_position(&GroupKey::column(
                &task.container_id,
                task.parent_id.as_ref(),
                &status,
            ))?;
            let updated = task_repo::patch_task(
                tx,
                id,
                &TaskPatch {
                    status: Some(status),
                    column_position: Some(column_position),
                    ..Default::default()
                },
            )?;
            ordering.renumber(&GroupKey::for_task(&task, Grouping::ParentAndStatus))?;
            info!(id = %id, from = %task.status, to = %updated.status, "status changed");
            Ok(updated)
        })
    }

    pub fn rename(&self, id: &TaskId, title: &str) -> Result<Task> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ArborError::EmptyTitle);
        }
        db::write_transaction(self.conn, |tx| {
            let task = task_repo::patch_task(
                tx,
                id,
                &TaskPatch {
                    title: Some(title.to_string()),
                    ..Default::default()
                },
            )?;
            info!(id = %id, "task renamed");
            Ok(task)
        })
    }

    pub fn delete_task(&self, id: &TaskId) -> Result<DeleteSummary> {
        CascadeCoordinator::new(self.conn).delete_task(id)
    }

    // Dependencies

    pub fn add_dependency(
        &self,
        from_id: &TaskId,
        to_id: &TaskId,
        kind: DependencyKind,
    ) -> Result<DependencyEdge> {
        db::write_transaction(self.conn, |tx| {
            DependencyGraph::new(tx).add_dependency(from_id, to_id, kind)
        })
    }

    pub fn remove_dependency(&self, id: &DependencyId) -> Result<()> {
        db::write_transaction(self.conn, |tx| DependencyGraph::new(tx).remove_dependency(id))
    }

    pub fn get_dependency(&self, id: &DependencyId) -> Result<DependencyEdge> {
        DependencyGraph::new(self.conn).get(id)
    }

    pub fn dependencies_of(&self, task_id: &TaskId) -> Result<Vec<DependencyEdge>> {
        task_repo::require_task(self.conn, task_id)?;
        DependencyGraph::new(self.conn).dependencies_of(task_id)
    }

    pub fn dependents_of(&self, task_id: &TaskId) -> Result<Vec<DependencyEdge>> {
        task_repo::require_task(self.conn, task_id)?;
        DependencyGraph::new(self.conn).dependents_of(task_id)
    }

    pub fn list_dependencies(&self, container_id: &ContainerId) -> Result<Vec<DependencyEdge>> {
        self.get_container(container_id)?;
        dependency_repo::list_for_container(self.conn, container_id)
    }

    /// A task that no longer exists reports `can_start = false` with no
    /// blockers rather than an error.
    pub fn can_start_task(&self, id: &TaskId) -> Result<Readiness> {
        match ReadinessEvaluator::new(self.conn).can_start(id) {
            Err(ArborError::TaskNotFound(missing)) if &missing == id => {
                debug!(task = %id, "readiness asked for missing task");
                Ok(Readiness::missing())
            }
            other => other,
        }
    }

    // Structure

    pub fn reorder_task(
        &self,
        id: &TaskId,
        target_id: &TaskId,
        grouping: Grouping,
    ) -> Result<Vec<Task>> {
        db::write_transaction(self.conn, |tx| {
            OrderingEngine::new(tx).reorder(id, target_id, grouping)
        })
    }

    pub fn reparent_task(&self, id: &TaskId, new_parent_id: Option<&TaskId>) -> Result<Task> {
        CascadeCoordinator::new(self.conn).reparent(id, new_parent_id)
    }

    pub fn move_subtree_to_container(
        &self,
        id: &TaskId,
        target_container_id: &ContainerId,
    ) -> Result<Task> {
        CascadeCoordinator::new(self.conn).move_subtree_to_container(id, target_container_id)
    }

    pub fn promote_to_container(
        &self,
        id: &TaskId,
        name: Option<&str>,
        owner: &str,
    ) -> Result<Container> {
        CascadeCoordinator::new(self.conn).promote_to_container(id, name, owner)
    }

    // Export

    pub fn export_container(&self, container_id: &ContainerId) -> Result<ContainerSnapshot> {
        let container = self.get_container(container_id)?;
        let tasks = task_repo::list_tasks(
            self.conn,
            &ListTasksFilter {
                container_id: Some(container_id.clone()),
                ..Default::default()
            },
        )?;
        let dependencies = dependency_repo::list_for_container(self.conn, container_id)?;
        debug!(
            container = %container_id,
            tasks = tasks.len(),
            dependencies = dependencies.len(),
            "exported container"
        );
        Ok(ContainerSnapshot {
            container,
            tasks,
            dependencies,
        })
    }
}
