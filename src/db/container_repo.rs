use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{ArborError, Result};
use crate::id::ContainerId;
use crate::types::Container;

fn row_to_container(row: &Row) -> rusqlite::Result<Container> {
    Ok(Container {
        id: row.get("id")?,
        name: row.get("name")?,
        owner: row.get("owner")?,
        created_at: row
            .get::<_, String>("created_at")
            .ok()
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now),
    })
}

pub fn create_container(conn: &Connection, name: &str, owner: &str) -> Result<Container> {
    let id = ContainerId::new();
    conn.execute(
        "INSERT INTO containers (id, name, owner, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![&id, name, owner, Utc::now().to_rfc3339()],
    )?;
    get_container(conn, &id)?.ok_or(ArborError::ContainerNotFound(id))
}

pub fn get_container(conn: &Connection, id: &ContainerId) -> Result<Option<Container>> {
    let container = conn
        .query_row(
            "SELECT * FROM containers WHERE id = ?1",
            params![id],
            row_to_container,
        )
        .optional()?;
    Ok(container)
}

pub fn container_exists(conn: &Connection, id: &ContainerId) -> Result<bool> {
    let count: i32 = conn.query_row(
        "SELECT COUNT(*) FROM containers WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn list_containers(conn: &Connection) -> Result<Vec<Container>> {
    let mut stmt = conn.prepare("SELECT * FROM containers ORDER BY created_at ASC, id ASC")?;
    let containers = stmt
        .query_map([], row_to_container)?
        .collect::<rusqlite::Result<Vec<Container>>>()?;
    Ok(containers)
}
