//! Dependency edges between tasks of one container.
//!
//! An edge `from -> to` reads "`from` depends on `to`". The edge set stays
//! acyclic: every insertion first walks the existing graph from the new
//! prerequisite and refuses the edge if that walk reaches the dependent.

use std::collections::HashSet;

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::db::{dependency_repo, task_repo};
use crate::error::{ArborError, Result};
use crate::id::{DependencyId, TaskId};
use crate::types::{DependencyEdge, DependencyKind};

pub struct DependencyGraph<'a> {
    conn: &'a Connection,
}

impl<'a> DependencyGraph<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn add_dependency(
        &self,
        from_id: &TaskId,
        to_id: &TaskId,
        kind: DependencyKind,
    ) -> Result<DependencyEdge> {
        if from_id == to_id {
            return Err(ArborError::SelfDependency);
        }

        let from = task_repo::require_task(self.conn, from_id)?;
        let to = task_repo::require_task(self.conn, to_id)?;

        if from.container_id != to.container_id {
            return Err(ArborError::CrossContainer {
                from: from_id.clone(),
                to: to_id.clone(),
            });
        }

        if dependency_repo::edge_between(self.conn, from_id, to_id)?.is_some() {
            return Err(ArborError::DuplicateDependency {
                from: from_id.clone(),
                to: to_id.clone(),
            });
        }

        if self.would_create_cycle(from_id, to_id)? {
            warn!(from = %from_id, to = %to_id, "rejected circular dependency");
            return Err(ArborError::CircularDependency {
                from: from_id.clone(),
                to: to_id.clone(),
            });
        }

        let edge = dependency_repo::insert_edge(self.conn, from_id, to_id, kind)?;
        info!(id = %edge.id, from = %from_id, to = %to_id, kind = %kind, "dependency added");
        Ok(edge)
    }

    pub fn remove_dependency(&self, id: &DependencyId) -> Result<()> {
        dependency_repo::delete_edge(self.conn, id)?;
        info!(id = %id, "dependency removed");
        Ok(())
    }

    pub fn get(&self, id: &DependencyId) -> Result<DependencyEdge> {
        dependency_repo::get_edge(self.conn, id)?
            .ok_or_else(|| ArborError::DependencyNotFound(id.clone()))
    }

    /// Outgoing edges (prerequisites of `task_id`).
    pub fn dependencies_of(&self, task_id: &TaskId) -> Result<Vec<DependencyEdge>> {
        dependency_repo::edges_from(self.conn, task_id)
    }

    /// Incoming edges (tasks waiting on `task_id`).
    pub fn dependents_of(&self, task_id: &TaskId) -> Result<Vec<DependencyEdge>> {
        dependency_repo::edges_to(self.conn, task_id)
    }

    pub fn prune_edges_touching(&self, task_id: &TaskId) -> Result<usize> {
        let removed = dependency_repo::delete_edges_touching(self.conn, task_id)?;
        if removed > 0 {
            debug!(task = %task_id, removed, "pruned dependency edges");
        }
        Ok(removed)
    }

    /// Remove edges incident to any task in `members` whose other endpoint is
    /// outside `members`. Edges internal to the set survive.
    pub fn prune_boundary_edges(&self, members: &HashSet<TaskId>) -> Result<usize> {
        let mut removed = 0;
        let mut seen = HashSet::new();
        for task_id in members {
            for edge in dependency_repo::edges_touching(self.conn, task_id)? {
                if !seen.insert(edge.id.clone()) {
                    continue;
                }
                let internal = members.contains(&edge.from_id) && members.contains(&edge.to_id);
                if !internal {
                    dependency_repo::delete_edge(self.conn, &edge.id)?;
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            debug!(removed, "pruned edges crossing subtree boundary");
        }
        Ok(removed)
    }

    /// True when `to_id` already reaches `from_id` along depends-on edges,
    /// so adding `from_id -> to_id` would close a cycle.
    fn would_create_cycle(&self, from_id: &TaskId, to_id: &TaskId) -> Result<bool> {
        let mut visited = HashSet::new();
        let mut stack = vec![to_id.clone()];

        while let Some(current) = stack.pop() {
            if &current == from_id {
                return Ok(true);
            }
            // Guards against graphs that already contain a cycle
            if !visited.insert(current.clone()) {
                continue;
            }

            let prerequisites = dependency_repo::prerequisite_ids(self.conn, &current)?;
            stack.extend(prerequisites.into_iter().filter(|p| !visited.contains(p)));
        }

        Ok(false)
    }
}
