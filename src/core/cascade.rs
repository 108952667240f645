//! Multi-entity structural operations.
//!
//! Each public method is one write transaction over tasks, dependency edges
//! and positions. Every precondition is checked before the first write, and
//! a failure after that rolls the whole unit back.

use std::collections::{HashSet, VecDeque};

use rusqlite::Connection;
use serde::Serialize;
use tracing::info;

use crate::core::graph::DependencyGraph;
use crate::core::ordering::OrderingEngine;
use crate::db::{self, container_repo, task_repo};
use crate::error::{ArborError, Result};
use crate::id::{ContainerId, TaskId};
use crate::types::{Container, GroupKey, Task, TaskPatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSummary {
    pub deleted_tasks: usize,
    pub deleted_edges: usize,
}

/// Flatten the subtree under `root_id` breadth-first, root included.
///
/// Parents always precede their children, so walking the result backwards
/// visits children before parents.
pub fn collect_subtree(conn: &Connection, root_id: &TaskId) -> Result<Vec<TaskId>> {
    let mut order = vec![root_id.clone()];
    let mut seen: HashSet<TaskId> = HashSet::from([root_id.clone()]);
    let mut queue = VecDeque::from([root_id.clone()]);

    while let Some(current) = queue.pop_front() {
        for child in task_repo::get_children(conn, &current)? {
            if seen.insert(child.id.clone()) {
                order.push(child.id.clone());
                queue.push_back(child.id);
            }
        }
    }

    Ok(order)
}

/// True when `ancestor` appears on the parent chain of `task_id` (or is it).
fn is_self_or_ancestor(conn: &Connection, ancestor: &TaskId, task_id: &TaskId) -> Result<bool> {
    let mut visited = HashSet::new();
    let mut current = Some(task_id.clone());
    while let Some(cid) = current {
        if &cid == ancestor {
            return Ok(true);
        }
        if !visited.insert(cid.clone()) {
            break;
        }
        current = task_repo::get_task(conn, &cid)?.and_then(|t| t.parent_id);
    }
    Ok(false)
}

pub struct CascadeCoordinator<'a> {
    conn: &'a Connection,
}

impl<'a> CascadeCoordinator<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Delete a task, its whole subtree and every edge touching any of them.
    pub fn delete_task(&self, task_id: &TaskId) -> Result<DeleteSummary> {
        db::write_transaction(self.conn, |tx| {
            let root = task_repo::require_task(tx, task_id)?;
            let subtree = collect_subtree(tx, task_id)?;
            let graph = DependencyGraph::new(tx);

            let mut summary = DeleteSummary {
                deleted_tasks: 0,
                deleted_edges: 0,
            };
            for id in subtree.iter().rev() {
                summary.deleted_edges += graph.prune_edges_touching(id)?;
                task_repo::delete_task(tx, id)?;
                summary.deleted_tasks += 1;
            }

            OrderingEngine::new(tx).compact_after_leaving(&root)?;

            info!(
                task = %task_id,
                tasks = summary.deleted_tasks,
                edges = summary.deleted_edges,
                "deleted subtree"
            );
            Ok(summary)
        })
    }

    /// Move a task (with its subtree) under `new_parent_id`, or to root level
    /// when `None`. The task is appended after its new siblings.
    pub fn reparent(&self, task_id: &TaskId, new_parent_id: Option<&TaskId>) -> Result<Task> {
        db::write_transaction(self.conn, |tx| {
            let task = task_repo::require_task(tx, task_id)?;

            if let Some(parent_id) = new_parent_id {
                if parent_id == task_id {
                    return Err(ArborError::CyclicHierarchy {
                        task_id: task_id.clone(),
                        new_parent_id: parent_id.clone(),
                    });
                }
                let parent = task_repo::get_task(tx, parent_id)?
                    .ok_or_else(|| ArborError::ParentNotFound(parent_id.clone()))?;
                if parent.container_id != task.container_id {
                    return Err(ArborError::CrossContainer {
                        from: task_id.clone(),
                        to: parent_id.clone(),
                    });
                }
                if is_self_or_ancestor(tx, task_id, parent_id)? {
                    return Err(ArborError::CyclicHierarchy {
                        task_id: task_id.clone(),
                        new_parent_id: parent_id.clone(),
                    });
                }
            }

            if task.parent_id.as_ref() == new_parent_id {
                return Ok(task);
            }

            let ordering = OrderingEngine::new(tx);
            let position =
                ordering.next_position(&GroupKey::siblings(&task.container_id, new_parent_id))?;
            let column_position = ordering.next_position(&GroupKey::column(
                &task.container_id,
                new_parent_id,
                &task.status,
            ))?;
            let updated = task_repo::patch_task(
                tx,
                task_id,
                &TaskPatch {
                    parent_id: Some(new_parent_id.cloned()),
                    position: Some(position),
                    column_position: Some(column_position),
                    ..Default::default()
                },
            )?;
            ordering.compact_after_leaving(&task)?;

            info!(
                task = %task_id,
                parent = ?new_parent_id.map(|p| p.as_str()),
                "task reparented"
            );
            Ok(updated)
        })
    }

    /// Move a task and its subtree into another container. The task becomes a
    /// root there; descendants keep their parent links. Edges linking the
    /// subtree to tasks left behind are pruned.
    pub fn move_subtree_to_container(
        &self,
        task_id: &TaskId,
        target_container_id: &ContainerId,
    ) -> Result<Task> {
        db::write_transaction(self.conn, |tx| {
            let task = task_repo::require_task(tx, task_id)?;
            if !container_repo::container_exists(tx, target_container_id)? {
                return Err(ArborError::ContainerNotFound(target_container_id.clone()));
            }
            if &task.container_id == target_container_id {
                return Err(ArborError::SameContainer {
                    task_id: task_id.clone(),
                    container_id: target_container_id.clone(),
                });
            }

            let subtree = collect_subtree(tx, task_id)?;
            let members: HashSet<TaskId> = subtree.iter().cloned().collect();
            let pruned = DependencyGraph::new(tx).prune_boundary_edges(&members)?;

            let ordering = OrderingEngine::new(tx);
            let position = ordering.next_position(&GroupKey::siblings(target_container_id, None))?;
            let column_position =
                ordering.next_position(&GroupKey::column(target_container_id, None, &task.status))?;
            let moved = task_repo::patch_task(
                tx,
                task_id,
                &TaskPatch {
                    container_id: Some(target_container_id.clone()),
                    parent_id: Some(None),
                    position: Some(position),
                    column_position: Some(column_position),
                    ..Default::default()
                },
            )?;
            for id in subtree.iter().skip(1) {
                task_repo::patch_task(
                    tx,
                    id,
                    &TaskPatch {
                        container_id: Some(target_container_id.clone()),
                        ..Default::default()
                    },
                )?;
            }

            ordering.compact_after_leaving(&task)?;

            info!(
                task = %task_id,
                from = %task.container_id,
                to = %target_container_id,
                tasks = subtree.len(),
                pruned_edges = pruned,
                "moved subtree to container"
            );
            Ok(moved)
        })
    }

    /// Turn a task into a new container: its direct children become roots of
    /// the new container (keeping their order), deeper descendants follow,
    /// and the task itself is deleted.
    pub fn promote_to_container(
        &self,
        task_id: &TaskId,
        name: Option<&str>,
        owner: &str,
    ) -> Result<Container> {
        db::write_transaction(self.conn, |tx| {
            let task = task_repo::require_task(tx, task_id)?;
            let name = name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .unwrap_or(&task.title);

            let subtree = collect_subtree(tx, task_id)?;
            let descendants: HashSet<TaskId> = subtree.iter().skip(1).cloned().collect();
            let children = task_repo::get_children(tx, task_id)?;

            let container = container_repo::create_container(tx, name, owner)?;

            let graph = DependencyGraph::new(tx);
            let mut pruned = graph.prune_edges_touching(task_id)?;
            pruned += graph.prune_boundary_edges(&descendants)?;

            // Children were one sibling group, so their column slots stay dense
            for (position, child) in children.iter().enumerate() {
                task_repo::patch_task(
                    tx,
                    &child.id,
                    &TaskPatch {
                        container_id: Some(container.id.clone()),
                        parent_id: Some(None),
                        position: Some(position as i64),
                        ..Default::default()
                    },
                )?;
            }
            let child_ids: HashSet<&TaskId> = children.iter().map(|c| &c.id).collect();
            for id in subtree.iter().skip(1).filter(|id| !child_ids.contains(id)) {
                task_repo::patch_task(
                    tx,
                    id,
                    &TaskPatch {
                        container_id: Some(container.id.clone()),
                        ..Default::default()
                    },
                )?;
            }

            task_repo::delete_task(tx, task_id)?;
            OrderingEngine::new(tx).compact_after_leaving(&task)?;

            info!(
                task = %task_id,
                container = %container.id,
                carried = descendants.len(),
                pruned_edges = pruned,
                "promoted task to container"
            );
            Ok(container)
        })
    }
}
