//! Dense sibling ordering.
//!
//! Two sequences are kept per task. `position` is contiguous `0..n` over all
//! siblings under one parent (tree view). `column_position` is contiguous
//! `0..k` over the siblings sharing a status (kanban column). A reorder
//! renumbers only the affected group, in that group's own sequence.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::db::task_repo;
use crate::error::{ArborError, Result};
use crate::id::TaskId;
use crate::types::{GroupKey, Grouping, Status, Task, TaskPatch};

/// Compute the new order of `group` after dropping `moved` onto `target`.
///
/// Moving down lands after the target, moving up lands at the target's slot.
/// A task that is not yet in the group (entering a kanban column) takes the
/// target's slot.
pub fn plan_reorder(group: &[TaskId], moved: &TaskId, target: &TaskId) -> Vec<TaskId> {
    let Some(target_idx) = group.iter().position(|id| id == target) else {
        return group.to_vec();
    };
    if moved == target {
        return group.to_vec();
    }

    let mut order: Vec<TaskId> = group.iter().filter(|id| *id != moved).cloned().collect();
    // Removing a task that sat above the target shifts the target up by one,
    // so the original index now lands just after it. Otherwise it is the
    // target's own slot.
    order.insert(target_idx.min(order.len()), moved.clone());
    order
}

pub struct OrderingEngine<'a> {
    conn: &'a Connection,
}

impl<'a> OrderingEngine<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Trailing slot for a new member of `key`: `1 + max`, or 0 when empty.
    pub fn next_position(&self, key: &GroupKey) -> Result<i64> {
        Ok(task_repo::max_position(self.conn, key)?.map_or(0, |max| max + 1))
    }

    /// Rewrite the slots of `key` to `0..n`, keeping current relative order.
    pub fn renumber(&self, key: &GroupKey) -> Result<Vec<Task>> {
        let group = task_repo::list_group(self.conn, key)?;
        let ids: Vec<TaskId> = group.iter().map(|t| t.id.clone()).collect();
        self.apply_order(key, &group, &ids, None)
    }

    /// Close the gaps `task` leaves behind in both of its groups.
    pub fn compact_after_leaving(&self, task: &Task) -> Result<()> {
        self.renumber(&GroupKey::for_task(task, Grouping::Parent))?;
        self.renumber(&GroupKey::for_task(task, Grouping::ParentAndStatus))?;
        Ok(())
    }

    /// Drop `task_id` onto `target_id` within the target's group.
    ///
    /// With `Grouping::ParentAndStatus` the moved task also takes the target
    /// column's status, and the column it left is compacted. Sibling
    /// `position`s are untouched by a column reorder.
    pub fn reorder(
        &self,
        task_id: &TaskId,
        target_id: &TaskId,
        grouping: Grouping,
    ) -> Result<Vec<Task>> {
        let moved = task_repo::require_task(self.conn, task_id)?;
        let target = task_repo::require_task(self.conn, target_id)?;

        if moved.container_id != target.container_id {
            return Err(ArborError::CrossContainer {
                from: task_id.clone(),
                to: target_id.clone(),
            });
        }
        if moved.parent_id != target.parent_id {
            return Err(ArborError::NotSiblings {
                task_id: task_id.clone(),
                target_id: target_id.clone(),
            });
        }

        let key = GroupKey::for_task(&target, grouping);
        let group = task_repo::list_group(self.conn, &key)?;
        if task_id == target_id {
            return Ok(group);
        }

        let ids: Vec<TaskId> = group.iter().map(|t| t.id.clone()).collect();
        let order = plan_reorder(&ids, task_id, target_id);

        let new_status = match grouping {
            Grouping::ParentAndStatus if moved.status != target.status => {
                Some((moved.id.clone(), target.status.clone()))
            }
            _ => None,
        };

        let mut members = group;
        if !members.iter().any(|t| &t.id == task_id) {
            members.push(moved.clone());
        }
        let reordered = self.apply_order(&key, &members, &order, new_status)?;

        if grouping == Grouping::ParentAndStatus && moved.status != target.status {
            // The source column lost a member; close the gap
            self.renumber(&GroupKey::for_task(&moved, grouping))?;
        }

        info!(
            task = %task_id,
            target = %target_id,
            group_size = reordered.len(),
            "task reordered"
        );
        Ok(reordered)
    }

    /// Write `slot = index` in `key`'s sequence for every id in `order`,
    /// skipping rows already in place. `status` optionally retags one task.
    fn apply_order(
        &self,
        key: &GroupKey,
        current: &[Task],
        order: &[TaskId],
        status: Option<(TaskId, Status)>,
    ) -> Result<Vec<Task>> {
        let mut result = Vec::with_capacity(order.len());
        for (idx, id) in order.iter().enumerate() {
            let slot = idx as i64;
            let existing = current.iter().find(|t| &t.id == id);
            let mut patch = if existing.map(|t| t.slot_in(key)) != Some(slot) {
                TaskPatch::slot(key, slot)
            } else {
                TaskPatch::default()
            };
            if let Some((ref status_task, ref new_status)) = status {
                if status_task == id {
                    patch.status = Some(new_status.clone());
                }
            }

            let task = if patch.is_empty() {
                match existing {
                    Some(task) => task.clone(),
                    None => task_repo::require_task(self.conn, id)?,
                }
            } else {
                task_repo::patch_task(self.conn, id, &patch)?
            };
            result.push(task);
        }
        debug!(count = result.len(), "applied group order");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{self, setup_db};

    fn ids(n: usize) -> Vec<TaskId> {
        (0..n).map(|_| TaskId::new()).collect()
    }

    #[test]
    fn plan_moving_down_lands_after_target() {
        let g = ids(4);
        let order = plan_reorder(&g, &g[0], &g[2]);
        assert_eq!(order, vec![g[1].clone(), g[2].clone(), g[0].clone(), g[3].clone()]);
    }

    #[test]
    fn plan_moving_up_lands_at_target() {
        let g = ids(4);
        let order = plan_reorder(&g, &g[3], &g[1]);
        assert_eq!(order, vec![g[0].clone(), g[3].clone(), g[1].clone(), g[2].clone()]);
    }

    #[test]
    fn plan_onto_adjacent_neighbour_swaps() {
        let g = ids(3);
        let order = plan_reorder(&g, &g[0], &g[1]);
        assert_eq!(order, vec![g[1].clone(), g[0].clone(), g[2].clone()]);
    }

    #[test]
    fn plan_newcomer_takes_target_slot() {
        let g = ids(2);
        let newcomer = TaskId::new();
        let order = plan_reorder(&g, &newcomer, &g[1]);
        assert_eq!(order, vec![g[0].clone(), newcomer, g[1].clone()]);
    }

    #[test]
    fn plan_onto_self_is_identity() {
        let g = ids(3);
        assert_eq!(plan_reorder(&g, &g[1], &g[1]), g);
    }

    #[test]
    fn new_tasks_get_trailing_positions() {
        let conn = setup_db();
        let container = testutil::container(&conn, "P");
        let a = testutil::task(&conn, &container.id, None, "A");
        let b = testutil::task(&conn, &container.id, None, "B");
        let child = testutil::task(&conn, &container.id, Some(&a.id), "Child");

        assert_eq!(a.position, 0);
        assert_eq!(b.position, 1);
        assert_eq!(child.position, 0);
    }

    #[test]
    fn kanban_drop_moves_up_and_shifts_others() {
        let conn = setup_db();
        let container = testutil::container(&conn, "Board");
        let y = testutil::task(&conn, &container.id, None, "Y");
        let t1 = testutil::task(&conn, &container.id, None, "T1");
        let x = testutil::task(&conn, &container.id, None, "X");
        let t3 = testutil::task(&conn, &container.id, None, "T3");

        let engine = OrderingEngine::new(&conn);
        let group = engine
            .reorder(&x.id, &y.id, Grouping::ParentAndStatus)
            .unwrap();

        let order: Vec<(&TaskId, i64)> =
            group.iter().map(|t| (&t.id, t.column_position)).collect();
        assert_eq!(
            order,
            vec![(&x.id, 0), (&y.id, 1), (&t1.id, 2), (&t3.id, 3)]
        );
    }

    #[test]
    fn kanban_reorder_leaves_sibling_positions_unique() {
        let conn = setup_db();
        let container = testutil::container(&conn, "Board");
        let a = testutil::task(&conn, &container.id, None, "A");
        let b = testutil::task(&conn, &container.id, None, "B");
        let c = testutil::task(&conn, &container.id, None, "C");
        testutil::set_status(&conn, &b.id, "review");
        testutil::set_status(&conn, &c.id, "review");

        let engine = OrderingEngine::new(&conn);
        let column = engine
            .reorder(&c.id, &b.id, Grouping::ParentAndStatus)
            .unwrap();
        let column: Vec<(TaskId, i64)> =
            column.into_iter().map(|t| (t.id, t.column_position)).collect();
        assert_eq!(column, vec![(c.id.clone(), 0), (b.id.clone(), 1)]);

        let siblings = task_repo::list_group(&conn, &GroupKey::siblings(&container.id, None)).unwrap();
        let siblings: Vec<(TaskId, i64)> =
            siblings.into_iter().map(|t| (t.id, t.position)).collect();
        assert_eq!(siblings, vec![(a.id, 0), (b.id, 1), (c.id, 2)]);
    }

    #[test]
    fn kanban_drop_into_other_column_retags_status() {
        let conn = setup_db();
        let container = testutil::container(&conn, "Board");
        let todo_a = testutil::task(&conn, &container.id, None, "Todo A");
        let todo_b = testutil::task(&conn, &container.id, None, "Todo B");
        let todo_c = testutil::task(&conn, &container.id, None, "Todo C");
        let review = testutil::task(&conn, &container.id, None, "Review");
        testutil::set_status(&conn, &review.id, "review");

        let engine = OrderingEngine::new(&conn);
        let column = engine
            .reorder(&todo_a.id, &review.id, Grouping::ParentAndStatus)
            .unwrap();

        assert_eq!(column.len(), 2);
        assert_eq!(column[0].id, todo_a.id);
        assert_eq!(column[0].status.as_str(), "review");
        assert_eq!(column[1].id, review.id);

        let todo_key = GroupKey {
            status: Some(Status::todo()),
            ..GroupKey::siblings(&container.id, None)
        };
        let todo_column = task_repo::list_group(&conn, &todo_key).unwrap();
        let positions: Vec<(TaskId, i64)> = todo_column
            .into_iter()
            .map(|t| (t.id, t.column_position))
            .collect();
        assert_eq!(positions, vec![(todo_b.id, 0), (todo_c.id, 1)]);

        let moved = task_repo::require_task(&conn, &todo_a.id).unwrap();
        assert_eq!(moved.position, 0);
        assert_eq!(moved.column_position, 0);
    }

    #[test]
    fn reorder_across_parents_is_rejected() {
        let conn = setup_db();
        let container = testutil::container(&conn, "P");
        let parent = testutil::task(&conn, &container.id, None, "Parent");
        let child = testutil::task(&conn, &container.id, Some(&parent.id), "Child");
        let root = testutil::task(&conn, &container.id, None, "Root");

        let engine = OrderingEngine::new(&conn);
        let result = engine.reorder(&child.id, &root.id, Grouping::Parent);
        assert!(matches!(result, Err(ArborError::NotSiblings { .. })));
    }

    #[test]
    fn renumber_closes_gaps() {
        let conn = setup_db();
        let container = testutil::container(&conn, "P");
        let a = testutil::task(&conn, &container.id, None, "A");
        let b = testutil::task(&conn, &container.id, None, "B");
        task_repo::patch_task(&conn, &a.id, &TaskPatch::position(5)).unwrap();
        task_repo::patch_task(&conn, &b.id, &TaskPatch::position(9)).unwrap();

        let engine = OrderingEngine::new(&conn);
        let group = engine
            .renumber(&GroupKey::siblings(&container.id, None))
            .unwrap();
        let positions: Vec<i64> = group.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![0, 1]);
    }
}
