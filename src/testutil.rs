//! Fixtures shared by unit tests.

use rusqlite::Connection;

use crate::core::TaskService;
use crate::db::{self, container_repo};
use crate::id::{ContainerId, TaskId};
use crate::types::{Container, CreateTaskInput, DependencyEdge, DependencyKind, Status, Task};

pub fn setup_db() -> Connection {
    db::open_in_memory().unwrap()
}

pub fn container(conn: &Connection, name: &str) -> Container {
    container_repo::create_container(conn, name, "tester").unwrap()
}

/// Creates a task through the service so it gets a trailing position.
pub fn task(
    conn: &Connection,
    container_id: &ContainerId,
    parent_id: Option<&TaskId>,
    title: &str,
) -> Task {
    TaskService::new(conn)
        .create_task(&CreateTaskInput {
            container_id: container_id.clone(),
            parent_id: parent_id.cloned(),
            status: None,
            title: title.to_string(),
        })
        .unwrap()
}

/// Changes the status through the service without readiness enforcement.
pub fn set_status(conn: &Connection, id: &TaskId, status: &str) -> Task {
    TaskService::new(conn)
        .set_status(id, Status::new(status).unwrap(), false)
        .unwrap()
}

pub fn depend(conn: &Connection, from: &TaskId, to: &TaskId, kind: DependencyKind) -> DependencyEdge {
    TaskService::new(conn).add_dependency(from, to, kind).unwrap()
}
