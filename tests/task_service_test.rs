//! End-to-end tests for TaskService.
//!
//! Tests cover:
//! - Container and task CRUD
//! - Dependency validation (self, cross-container, duplicate, cycles)
//! - Readiness per dependency kind
//! - Tree and kanban reordering
//! - Status transitions with and without enforcement

use arbor::core::TaskService;
use arbor::db;
use arbor::error::ArborError;
use arbor::id::{ContainerId, TaskId};
use arbor::types::{
    Container, CreateTaskInput, DependencyKind, GroupKey, Grouping, ListTasksFilter, Status, Task,
};
use rusqlite::Connection;

fn setup_db() -> Connection {
    db::open_in_memory().unwrap()
}

fn make_container(service: &TaskService, name: &str) -> Container {
    service.create_container(name, "tester").unwrap()
}

fn make_task(
    service: &TaskService,
    container_id: &ContainerId,
    parent_id: Option<&TaskId>,
    title: &str,
) -> Task {
    service
        .create_task(&CreateTaskInput {
            container_id: container_id.clone(),
            parent_id: parent_id.cloned(),
            status: None,
            title: title.to_string(),
        })
        .unwrap()
}

fn status(label: &str) -> Status {
    Status::new(label).unwrap()
}

fn positions(tasks: &[Task]) -> Vec<(TaskId, i64)> {
    tasks.iter().map(|t| (t.id.clone(), t.position)).collect()
}

fn column_positions(tasks: &[Task]) -> Vec<(TaskId, i64)> {
    tasks.iter().map(|t| (t.id.clone(), t.column_position)).collect()
}

fn roots(service: &TaskService, container_id: &ContainerId, status: Option<Status>) -> Vec<Task> {
    service
        .list(&ListTasksFilter {
            container_id: Some(container_id.clone()),
            roots_only: true,
            status,
            ..Default::default()
        })
        .unwrap()
}

// ==================== CRUD Operations ====================

#[test]
fn test_create_container_and_tasks() {
    let conn = setup_db();
    let service = TaskService::new(&conn);

    let container = make_container(&service, "Launch");
    assert!(container.id.as_str().starts_with("ctr_"));
    assert_eq!(service.list_containers().unwrap().len(), 1);

    let task = make_task(&service, &container.id, None, "Write announcement");
    assert!(task.id.as_str().starts_with("task_"));
    assert_eq!(task.status.as_str(), "todo");
    assert_eq!(task.position, 0);
    assert_eq!(service.get(&task.id).unwrap().title, "Write announcement");
}

#[test]
fn test_create_with_initial_status() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let container = make_container(&service, "Board");

    let task = service
        .create_task(&CreateTaskInput {
            container_id: container.id.clone(),
            parent_id: None,
            status: Some(status("Backlog")),
            title: "Someday".to_string(),
        })
        .unwrap();
    assert_eq!(task.status.as_str(), "backlog");
}

#[test]
fn test_create_with_missing_parent() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let container = make_container(&service, "P");

    let result = service.create_task(&CreateTaskInput {
        container_id: container.id.clone(),
        parent_id: Some(TaskId::new()),
        status: None,
        title: "Orphan".to_string(),
    });
    assert!(matches!(result, Err(ArborError::ParentNotFound(_))));
}

#[test]
fn test_create_in_missing_container() {
    let conn = setup_db();
    let service = TaskService::new(&conn);

    let result = service.create_task(&CreateTaskInput {
        container_id: ContainerId::new(),
        title: "Nowhere".to_string(),
        ..Default::default()
    });
    assert!(matches!(result, Err(ArborError::ContainerNotFound(_))));
}

#[test]
fn test_positions_are_per_parent() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let container = make_container(&service, "P");

    let a = make_task(&service, &container.id, None, "A");
    let b = make_task(&service, &container.id, None, "B");
    let a1 = make_task(&service, &container.id, Some(&a.id), "A1");
    let a2 = make_task(&service, &container.id, Some(&a.id), "A2");

    assert_eq!((a.position, b.position), (0, 1));
    assert_eq!((a1.position, a2.position), (0, 1));
}

#[test]
fn test_list_filters() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let container = make_container(&service, "P");
    let other = make_container(&service, "Other");

    let root = make_task(&service, &container.id, None, "Root");
    let child = make_task(&service, &container.id, Some(&root.id), "Child");
    make_task(&service, &other.id, None, "Elsewhere");
    service.set_status(&child.id, status("review"), false).unwrap();

    let all = service
        .list(&ListTasksFilter {
            container_id: Some(container.id.clone()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(all.len(), 2);

    let roots = service
        .list(&ListTasksFilter {
            container_id: Some(container.id.clone()),
            roots_only: true,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].id, root.id);

    let in_review = service
        .list(&ListTasksFilter {
            container_id: Some(container.id.clone()),
            status: Some(status("review")),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(in_review.len(), 1);
    assert_eq!(in_review[0].id, child.id);
}

#[test]
fn test_rename() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let container = make_container(&service, "P");
    let task = make_task(&service, &container.id, None, "Draft");

    let renamed = service.rename(&task.id, "  Final  ").unwrap();
    assert_eq!(renamed.title, "Final");
    assert!(matches!(
        service.rename(&task.id, ""),
        Err(ArborError::EmptyTitle)
    ));
    assert!(matches!(
        service.rename(&TaskId::new(), "x"),
        Err(ArborError::TaskNotFound(_))
    ));
}

// ==================== Dependencies ====================

#[test]
fn test_self_dependency_rejected() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let container = make_container(&service, "P");
    let a = make_task(&service, &container.id, None, "A");

    let result = service.add_dependency(&a.id, &a.id, DependencyKind::StartToStart);
    assert!(matches!(result, Err(ArborError::SelfDependency)));
}

#[test]
fn test_cross_container_rejected_for_every_kind() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let left = make_container(&service, "Left");
    let right = make_container(&service, "Right");
    let a = make_task(&service, &left.id, None, "A");
    let b = make_task(&service, &right.id, None, "B");

    for kind in DependencyKind::ALL {
        let result = service.add_dependency(&a.id, &b.id, kind);
        assert!(matches!(result, Err(ArborError::CrossContainer { .. })));
    }
    assert!(service.dependencies_of(&a.id).unwrap().is_empty());
}

#[test]
fn test_duplicate_dependency_rejected() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let container = make_container(&service, "P");
    let a = make_task(&service, &container.id, None, "A");
    let b = make_task(&service, &container.id, None, "B");

    service
        .add_dependency(&b.id, &a.id, DependencyKind::FinishToStart)
        .unwrap();
    let result = service.add_dependency(&b.id, &a.id, DependencyKind::FinishToStart);
    assert!(matches!(result, Err(ArborError::DuplicateDependency { .. })));
    assert_eq!(service.dependencies_of(&b.id).unwrap().len(), 1);
}

#[test]
fn test_circular_dependency_rejected_and_graph_unchanged() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let container = make_container(&service, "P");
    let a = make_task(&service, &container.id, None, "A");
    let b = make_task(&service, &container.id, None, "B");
    let c = make_task(&service, &container.id, None, "C");

    service
        .add_dependency(&b.id, &a.id, DependencyKind::FinishToStart)
        .unwrap();
    service
        .add_dependency(&c.id, &b.id, DependencyKind::StartToStart)
        .unwrap();

    let before = service.list_dependencies(&container.id).unwrap();
    let err = service
        .add_dependency(&a.id, &c.id, DependencyKind::FinishToFinish)
        .unwrap_err();
    assert!(matches!(err, ArborError::CircularDependency { .. }));
    assert!(!err.is_retryable());
    assert_eq!(service.list_dependencies(&container.id).unwrap(), before);
}

#[test]
fn test_remove_dependency_unblocks() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let container = make_container(&service, "P");
    let a = make_task(&service, &container.id, None, "A");
    let b = make_task(&service, &container.id, None, "B");

    let edge = service
        .add_dependency(&b.id, &a.id, DependencyKind::FinishToStart)
        .unwrap();
    assert!(!service.can_start_task(&b.id).unwrap().can_start);

    service.remove_dependency(&edge.id).unwrap();
    assert!(service.can_start_task(&b.id).unwrap().can_start);
    assert!(matches!(
        service.remove_dependency(&edge.id),
        Err(ArborError::DependencyNotFound(_))
    ));
}

#[test]
fn test_dependents_of() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let container = make_container(&service, "P");
    let base = make_task(&service, &container.id, None, "Base");
    let x = make_task(&service, &container.id, None, "X");
    let y = make_task(&service, &container.id, None, "Y");

    service
        .add_dependency(&x.id, &base.id, DependencyKind::FinishToStart)
        .unwrap();
    service
        .add_dependency(&y.id, &base.id, DependencyKind::StartToStart)
        .unwrap();

    let dependents = service.dependents_of(&base.id).unwrap();
    let mut from: Vec<TaskId> = dependents.into_iter().map(|e| e.from_id).collect();
    from.sort();
    let mut expected = vec![x.id, y.id];
    expected.sort();
    assert_eq!(from, expected);
}

// ==================== Readiness ====================

#[test]
fn test_finish_to_start_readiness() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let container = make_container(&service, "P");
    let design = make_task(&service, &container.id, None, "Design");
    let build = make_task(&service, &container.id, None, "Build");
    service
        .add_dependency(&build.id, &design.id, DependencyKind::FinishToStart)
        .unwrap();

    let readiness = service.can_start_task(&build.id).unwrap();
    assert!(!readiness.can_start);
    assert_eq!(readiness.blocking.len(), 1);
    assert_eq!(readiness.blocking[0].prerequisite_title, "Design");
    assert_eq!(readiness.blocking[0].kind, DependencyKind::FinishToStart);

    service.set_status(&design.id, status("done"), false).unwrap();
    let readiness = service.can_start_task(&build.id).unwrap();
    assert!(readiness.can_start);
    assert!(readiness.blocking.is_empty());
}

#[test]
fn test_start_to_start_readiness() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let container = make_container(&service, "P");
    let upstream = make_task(&service, &container.id, None, "Upstream");
    let downstream = make_task(&service, &container.id, None, "Downstream");
    service
        .add_dependency(&downstream.id, &upstream.id, DependencyKind::StartToStart)
        .unwrap();

    assert!(!service.can_start_task(&downstream.id).unwrap().can_start);
    service
        .set_status(&upstream.id, status("in_progress"), false)
        .unwrap();
    assert!(service.can_start_task(&downstream.id).unwrap().can_start);
}

#[test]
fn test_finish_side_kinds_do_not_gate_start() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let container = make_container(&service, "P");
    let a = make_task(&service, &container.id, None, "A");
    let b = make_task(&service, &container.id, None, "B");
    let c = make_task(&service, &container.id, None, "C");
    service
        .add_dependency(&c.id, &a.id, DependencyKind::FinishToFinish)
        .unwrap();
    service
        .add_dependency(&c.id, &b.id, DependencyKind::StartToFinish)
        .unwrap();

    assert!(service.can_start_task(&c.id).unwrap().can_start);
}

#[test]
fn test_enforced_start_succeeds_once_unblocked() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let container = make_container(&service, "P");
    let a = make_task(&service, &container.id, None, "A");
    let b = make_task(&service, &container.id, None, "B");
    service
        .add_dependency(&b.id, &a.id, DependencyKind::FinishToStart)
        .unwrap();

    let blocked = service.set_status(&b.id, status("in_progress"), true);
    assert!(matches!(blocked, Err(ArborError::NotReady { .. })));
    assert_eq!(service.get(&b.id).unwrap().status.as_str(), "todo");

    // Moving between not-started labels is never gated
    service.set_status(&b.id, status("backlog"), true).unwrap();

    service.set_status(&a.id, status("completed"), true).unwrap();
    let started = service.set_status(&b.id, status("in_progress"), true).unwrap();
    assert_eq!(started.status.as_str(), "in_progress");
}

// ==================== Ordering ====================

#[test]
fn test_tree_reorder_moving_down_lands_after_target() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let container = make_container(&service, "P");
    let a = make_task(&service, &container.id, None, "A");
    let b = make_task(&service, &container.id, None, "B");
    let c = make_task(&service, &container.id, None, "C");

    let group = service.reorder_task(&a.id, &b.id, Grouping::Parent).unwrap();
    assert_eq!(positions(&group), vec![(b.id, 0), (a.id, 1), (c.id, 2)]);
}

#[test]
fn test_kanban_reorder_scenario() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let container = make_container(&service, "Board");
    let y = make_task(&service, &container.id, None, "Y");
    let t1 = make_task(&service, &container.id, None, "T1");
    let x = make_task(&service, &container.id, None, "X");
    let t3 = make_task(&service, &container.id, None, "T3");

    let group = service
        .reorder_task(&x.id, &y.id, Grouping::ParentAndStatus)
        .unwrap();
    assert_eq!(
        column_positions(&group),
        vec![(x.id.clone(), 0), (y.id.clone(), 1), (t1.id.clone(), 2), (t3.id.clone(), 3)]
    );

    // The tree order is a separate sequence and stays as created
    assert_eq!(
        positions(&roots(&service, &container.id, None)),
        vec![(y.id, 0), (t1.id, 1), (x.id, 2), (t3.id, 3)]
    );
}

#[test]
fn test_kanban_reorder_keeps_tree_positions_unique() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let container = make_container(&service, "Board");
    let a = make_task(&service, &container.id, None, "A");
    let b = make_task(&service, &container.id, None, "B");
    let c = make_task(&service, &container.id, None, "C");
    service.set_status(&b.id, status("review"), false).unwrap();
    service.set_status(&c.id, status("review"), false).unwrap();

    service
        .reorder_task(&c.id, &b.id, Grouping::ParentAndStatus)
        .unwrap();

    assert_eq!(
        positions(&roots(&service, &container.id, None)),
        vec![(a.id.clone(), 0), (b.id.clone(), 1), (c.id.clone(), 2)]
    );
    assert_eq!(
        column_positions(&roots(&service, &container.id, Some(status("review")))),
        vec![(c.id, 0), (b.id, 1)]
    );
}

#[test]
fn test_status_change_appends_to_destination_column() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let container = make_container(&service, "Board");
    let a = make_task(&service, &container.id, None, "A");
    let b = make_task(&service, &container.id, None, "B");
    let c = make_task(&service, &container.id, None, "C");
    let d = make_task(&service, &container.id, None, "D");
    service.set_status(&b.id, status("review"), false).unwrap();
    service.set_status(&c.id, status("review"), false).unwrap();

    let moved = service.set_status(&a.id, status("review"), false).unwrap();
    assert_eq!(moved.position, a.position);
    assert_eq!(moved.column_position, 2);

    assert_eq!(
        column_positions(&roots(&service, &container.id, Some(status("review")))),
        vec![(b.id.clone(), 0), (c.id.clone(), 1), (a.id.clone(), 2)]
    );
    assert_eq!(
        column_positions(&roots(&service, &container.id, Some(Status::todo()))),
        vec![(d.id.clone(), 0)]
    );
    assert_eq!(
        positions(&roots(&service, &container.id, None)),
        vec![(a.id, 0), (b.id, 1), (c.id, 2), (d.id, 3)]
    );
}

#[test]
fn test_kanban_reorder_changes_column() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let container = make_container(&service, "Board");
    let a = make_task(&service, &container.id, None, "A");
    let b = make_task(&service, &container.id, None, "B");
    let review = make_task(&service, &container.id, None, "R");
    service
        .set_status(&review.id, status("review"), false)
        .unwrap();

    service
        .reorder_task(&b.id, &review.id, Grouping::ParentAndStatus)
        .unwrap();

    let moved = service.get(&b.id).unwrap();
    assert_eq!(moved.status.as_str(), "review");

    let todo_column = GroupKey {
        status: Some(Status::todo()),
        ..GroupKey::siblings(&container.id, None)
    };
    let todo = service
        .list(&ListTasksFilter {
            container_id: Some(todo_column.container_id.clone()),
            roots_only: true,
            status: todo_column.status.clone(),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(column_positions(&todo), vec![(a.id, 0)]);
}

#[test]
fn test_reorder_missing_target() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let container = make_container(&service, "P");
    let a = make_task(&service, &container.id, None, "A");

    let result = service.reorder_task(&a.id, &TaskId::new(), Grouping::Parent);
    assert!(matches!(result, Err(ArborError::TaskNotFound(_))));
}

#[test]
fn test_reorder_across_containers() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let left = make_container(&service, "L");
    let right = make_container(&service, "R");
    let a = make_task(&service, &left.id, None, "A");
    let b = make_task(&service, &right.id, None, "B");

    let result = service.reorder_task(&a.id, &b.id, Grouping::Parent);
    assert!(matches!(result, Err(ArborError::CrossContainer { .. })));
}
