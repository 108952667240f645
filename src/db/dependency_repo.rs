use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{ArborError, Result};
use crate::id::{ContainerId, DependencyId, TaskId};
use crate::types::{DependencyEdge, DependencyKind};

fn row_to_edge(row: &Row) -> rusqlite::Result<DependencyEdge> {
    Ok(DependencyEdge {
        id: row.get("id")?,
        from_id: row.get("from_id")?,
        to_id: row.get("to_id")?,
        kind: row.get("kind")?,
        created_at: row
            .get::<_, String>("created_at")
            .ok()
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now),
    })
}

fn query_edges(conn: &Connection, sql: &str, id: &dyn rusqlite::ToSql) -> Result<Vec<DependencyEdge>> {
    let mut stmt = conn.prepare(sql)?;
    let edges = stmt
        .query_map([id], row_to_edge)?
        .collect::<rusqlite::Result<Vec<DependencyEdge>>>()?;
    Ok(edges)
}

pub fn insert_edge(
    conn: &Connection,
    from_id: &TaskId,
    to_id: &TaskId,
    kind: DependencyKind,
) -> Result<DependencyEdge> {
    let id = DependencyId::new();
    conn.execute(
        "INSERT INTO dependencies (id, from_id, to_id, kind, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![&id, from_id, to_id, kind, Utc::now().to_rfc3339()],
    )?;
    get_edge(conn, &id)?.ok_or(ArborError::DependencyNotFound(id))
}

pub fn get_edge(conn: &Connection, id: &DependencyId) -> Result<Option<DependencyEdge>> {
    let edge = conn
        .query_row(
            "SELECT * FROM dependencies WHERE id = ?1",
            params![id],
            row_to_edge,
        )
        .optional()?;
    Ok(edge)
}

pub fn edge_between(conn: &Connection, from_id: &TaskId, to_id: &TaskId) -> Result<Option<DependencyEdge>> {
    let edge = conn
        .query_row(
            "SELECT * FROM dependencies WHERE from_id = ?1 AND to_id = ?2",
            params![from_id, to_id],
            row_to_edge,
        )
        .optional()?;
    Ok(edge)
}

pub fn delete_edge(conn: &Connection, id: &DependencyId) -> Result<()> {
    let changed = conn.execute("DELETE FROM dependencies WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(ArborError::DependencyNotFound(id.clone()));
    }
    Ok(())
}

/// Outgoing edges: the prerequisites `task_id` depends on.
pub fn edges_from(conn: &Connection, task_id: &TaskId) -> Result<Vec<DependencyEdge>> {
    query_edges(
        conn,
        "SELECT * FROM dependencies WHERE from_id = ?1 ORDER BY created_at ASC, id ASC",
        task_id,
    )
}

/// Incoming edges: the tasks that depend on `task_id`.
pub fn edges_to(conn: &Connection, task_id: &TaskId) -> Result<Vec<DependencyEdge>> {
    query_edges(
        conn,
        "SELECT * FROM dependencies WHERE to_id = ?1 ORDER BY created_at ASC, id ASC",
        task_id,
    )
}

/// Prerequisite ids only; used by graph traversal.
pub fn prerequisite_ids(conn: &Connection, task_id: &TaskId) -> Result<Vec<TaskId>> {
    let mut stmt = conn.prepare("SELECT to_id FROM dependencies WHERE from_id = ?1")?;
    let ids = stmt
        .query_map(params![task_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<TaskId>>>()?;
    Ok(ids)
}

/// Every edge with `task_id` at either end.
pub fn edges_touching(conn: &Connection, task_id: &TaskId) -> Result<Vec<DependencyEdge>> {
    query_edges(
        conn,
        "SELECT * FROM dependencies WHERE from_id = ?1 OR to_id = ?1 ORDER BY created_at ASC, id ASC",
        task_id,
    )
}

pub fn delete_edges_touching(conn: &Connection, task_id: &TaskId) -> Result<usize> {
    let count = conn.execute(
        "DELETE FROM dependencies WHERE from_id = ?1 OR to_id = ?1",
        params![task_id],
    )?;
    Ok(count)
}

/// All edges whose dependent lives in the container.
pub fn list_for_container(conn: &Connection, container_id: &ContainerId) -> Result<Vec<DependencyEdge>> {
    query_edges(
        conn,
        r#"
        SELECT d.* FROM dependencies d
        JOIN tasks t ON d.from_id = t.id
        WHERE t.container_id = ?1
        ORDER BY d.created_at ASC, d.id ASC
        "#,
        container_id,
    )
}
