//! "Can this task start?"
//!
//! Evaluation is a pure function of a task's outgoing edges and the current
//! status of each prerequisite; `ReadinessEvaluator` only loads those inputs.

use rusqlite::Connection;
use tracing::debug;

use crate::db::{dependency_repo, task_repo};
use crate::error::Result;
use crate::id::TaskId;
use crate::types::{BlockingEntry, DependencyEdge, Readiness, Task};

/// Evaluate readiness from `(edge, prerequisite)` pairs.
///
/// Every blocking prerequisite is reported, not just the first.
pub fn evaluate<'e>(prerequisites: impl IntoIterator<Item = (&'e DependencyEdge, &'e Task)>) -> Readiness {
    let blocking: Vec<BlockingEntry> = prerequisites
        .into_iter()
        .filter(|(edge, prerequisite)| edge.kind.blocks_start(&prerequisite.status))
        .map(|(edge, prerequisite)| BlockingEntry {
            dependency_id: edge.id.clone(),
            prerequisite_id: prerequisite.id.clone(),
            prerequisite_title: prerequisite.title.clone(),
            prerequisite_status: prerequisite.status.clone(),
            kind: edge.kind,
        })
        .collect();

    Readiness {
        can_start: blocking.is_empty(),
        blocking,
    }
}

pub struct ReadinessEvaluator<'a> {
    conn: &'a Connection,
}

impl<'a> ReadinessEvaluator<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Errors with `TaskNotFound` when `task_id` does not exist.
    pub fn can_start(&self, task_id: &TaskId) -> Result<Readiness> {
        task_repo::require_task(self.conn, task_id)?;

        let edges = dependency_repo::edges_from(self.conn, task_id)?;
        if edges.is_empty() {
            return Ok(Readiness::ready());
        }

        let mut pairs = Vec::with_capacity(edges.len());
        for edge in &edges {
            let prerequisite = task_repo::require_task(self.conn, &edge.to_id)?;
            pairs.push((edge, prerequisite));
        }

        let readiness = evaluate(pairs.iter().map(|(edge, task)| (*edge, task)));
        debug!(
            task = %task_id,
            can_start = readiness.can_start,
            blocking = readiness.blocking.len(),
            "evaluated readiness"
        );
        Ok(readiness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::id::{ContainerId, DependencyId};
    use crate::types::{DependencyKind, Status};

    fn synthetic_task(title: &str, status: &str) -> Task {
        Task {
            id: TaskId::new(),
            container_id: ContainerId::new(),
            parent_id: None,
            title: title.to_string(),
            status: Status::new(status).unwrap(),
            position: 0,
            column_position: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn edge_to(prerequisite: &Task, kind: DependencyKind) -> DependencyEdge {
        DependencyEdge {
            id: DependencyId::new(),
            from_id: TaskId::new(),
            to_id: prerequisite.id.clone(),
            kind,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn no_edges_is_ready() {
        let readiness = evaluate(std::iter::empty());
        assert_eq!(readiness, Readiness::ready());
    }

    #[test]
    fn finish_to_start_waits_for_done() {
        let design = synthetic_task("Design", "review");
        let edge = edge_to(&design, DependencyKind::FinishToStart);

        let readiness = evaluate([(&edge, &design)]);
        assert!(!readiness.can_start);
        assert_eq!(readiness.blocking.len(), 1);
        assert_eq!(readiness.blocking[0].prerequisite_title, "Design");

        let finished = synthetic_task("Design", "completed");
        let edge = edge_to(&finished, DependencyKind::FinishToStart);
        assert!(evaluate([(&edge, &finished)]).can_start);
    }

    #[test]
    fn start_to_start_satisfied_by_custom_status() {
        let upstream = synthetic_task("Upstream", "qa");
        let edge = edge_to(&upstream, DependencyKind::StartToStart);
        assert!(evaluate([(&edge, &upstream)]).can_start);

        let backlog = synthetic_task("Upstream", "backlog");
        let edge = edge_to(&backlog, DependencyKind::StartToStart);
        assert!(!evaluate([(&edge, &backlog)]).can_start);
    }

    #[test]
    fn finish_side_kinds_never_block_start() {
        let upstream = synthetic_task("Upstream", "todo");
        let ff = edge_to(&upstream, DependencyKind::FinishToFinish);
        let sf = edge_to(&upstream, DependencyKind::StartToFinish);
        assert!(evaluate([(&ff, &upstream), (&sf, &upstream)]).can_start);
    }

    #[test]
    fn reports_every_blocker() {
        let a = synthetic_task("A", "todo");
        let b = synthetic_task("B", "in_progress");
        let c = synthetic_task("C", "done");
        let ea = edge_to(&a, DependencyKind::FinishToStart);
        let eb = edge_to(&b, DependencyKind::FinishToStart);
        let ec = edge_to(&c, DependencyKind::FinishToStart);

        let readiness = evaluate([(&ea, &a), (&eb, &b), (&ec, &c)]);
        assert!(!readiness.can_start);
        let titles: Vec<&str> = readiness
            .blocking
            .iter()
            .map(|b| b.prerequisite_title.as_str())
            .collect();
        assert_eq!(titles, vec!["A", "B"]);
    }
}
