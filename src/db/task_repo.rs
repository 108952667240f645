//! Task records. No business rules live here: callers validate, this module
//! reads and writes rows.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{ArborError, Result};
use crate::id::{ContainerId, TaskId};
use crate::types::{GroupKey, ListTasksFilter, Task, TaskPatch};

fn now() -> DateTime<Utc> {
    Utc::now()
}

fn parse_timestamp(row: &Row, column: &str) -> DateTime<Utc> {
    row.get::<_, String>(column)
        .ok()
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(now)
}

fn row_to_task(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get("id")?,
        container_id: row.get("container_id")?,
        parent_id: row.get("parent_id")?,
        title: row.get("title")?,
        status: row.get("status")?,
        position: row.get("position")?,
        column_position: row.get("column_position")?,
        created_at: parse_timestamp(row, "created_at"),
        updated_at: parse_timestamp(row, "updated_at"),
    })
}

const ORDER_BY_POSITION: &str = "ORDER BY position ASC, created_at ASC, id ASC";
const ORDER_BY_COLUMN_POSITION: &str = "ORDER BY column_position ASC, created_at ASC, id ASC";

fn order_for(key: &GroupKey) -> &'static str {
    if key.is_column() {
        ORDER_BY_COLUMN_POSITION
    } else {
        ORDER_BY_POSITION
    }
}

pub fn insert_task(conn: &Connection, task: &Task) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO tasks (id, container_id, parent_id, title, status, position, column_position,
                           created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
        params![
            &task.id,
            &task.container_id,
            task.parent_id.as_ref(),
            task.title,
            &task.status,
            task.position,
            task.column_position,
            task.created_at.to_rfc3339(),
            task.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_task(conn: &Connection, id: &TaskId) -> Result<Option<Task>> {
    let task = conn
        .query_row("SELECT * FROM tasks WHERE id = ?1", params![id], row_to_task)
        .optional()?;
    Ok(task)
}

/// Like `get_task`, but a missing row is an error.
pub fn require_task(conn: &Connection, id: &TaskId) -> Result<Task> {
    get_task(conn, id)?.ok_or_else(|| ArborError::TaskNotFound(id.clone()))
}

pub fn task_exists(conn: &Connection, id: &TaskId) -> Result<bool> {
    let count: i32 = conn.query_row(
        "SELECT COUNT(*) FROM tasks WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Direct children in display order.
pub fn get_children(conn: &Connection, parent_id: &TaskId) -> Result<Vec<Task>> {
    let sql = format!("SELECT * FROM tasks WHERE parent_id = ?1 {ORDER_BY_POSITION}");
    let mut stmt = conn.prepare(&sql)?;
    let tasks = stmt
        .query_map(params![parent_id], row_to_task)?
        .collect::<rusqlite::Result<Vec<Task>>>()?;
    Ok(tasks)
}

pub fn list_roots(conn: &Connection, container_id: &ContainerId) -> Result<Vec<Task>> {
    let sql = format!(
        "SELECT * FROM tasks WHERE container_id = ?1 AND parent_id IS NULL {ORDER_BY_POSITION}"
    );
    let mut stmt = conn.prepare(&sql)?;
    let tasks = stmt
        .query_map(params![container_id], row_to_task)?
        .collect::<rusqlite::Result<Vec<Task>>>()?;
    Ok(tasks)
}

/// All tasks in an ordering group, sorted by the group's own sequence.
pub fn list_group(conn: &Connection, key: &GroupKey) -> Result<Vec<Task>> {
    // `IS` compares NULL parents as equal, so root groups work with the same query
    let mut sql = String::from("SELECT * FROM tasks WHERE container_id = ?1 AND parent_id IS ?2");
    if key.status.is_some() {
        sql.push_str(" AND status = ?3");
    }
    sql.push(' ');
    sql.push_str(order_for(key));

    let mut stmt = conn.prepare(&sql)?;
    let tasks = match &key.status {
        Some(status) => stmt
            .query_map(
                params![&key.container_id, key.parent_id.as_ref(), status],
                row_to_task,
            )?
            .collect::<rusqlite::Result<Vec<Task>>>()?,
        None => stmt
            .query_map(
                params![&key.container_id, key.parent_id.as_ref()],
                row_to_task,
            )?
            .collect::<rusqlite::Result<Vec<Task>>>()?,
    };
    Ok(tasks)
}

/// Highest slot in a group, `None` when the group is empty.
pub fn max_position(conn: &Connection, key: &GroupKey) -> Result<Option<i64>> {
    let max = match &key.status {
        Some(status) => conn.query_row(
            "SELECT MAX(column_position) FROM tasks WHERE container_id = ?1 AND parent_id IS ?2 AND status = ?3",
            params![&key.container_id, key.parent_id.as_ref(), status],
            |row| row.get::<_, Option<i64>>(0),
        )?,
        None => conn.query_row(
            "SELECT MAX(position) FROM tasks WHERE container_id = ?1 AND parent_id IS ?2",
            params![&key.container_id, key.parent_id.as_ref()],
            |row| row.get::<_, Option<i64>>(0),
        )?,
    };
    Ok(max)
}

pub fn list_tasks(conn: &Connection, filter: &ListTasksFilter) -> Result<Vec<Task>> {
    let mut sql = String::from("SELECT * FROM tasks WHERE 1=1");
    let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(ref container_id) = filter.container_id {
        sql.push_str(" AND container_id = ?");
        params_vec.push(Box::new(container_id.clone()));
    }

    if filter.roots_only {
        sql.push_str(" AND parent_id IS NULL");
    } else if let Some(ref parent_id) = filter.parent_id {
        sql.push_str(" AND parent_id = ?");
        params_vec.push(Box::new(parent_id.clone()));
    }

    if let Some(ref status) = filter.status {
        sql.push_str(" AND status = ?");
        params_vec.push(Box::new(status.clone()));
    }

    // A status filter selects a kanban column, listed in column order
    sql.push(' ');
    sql.push_str(if filter.status.is_some() {
        ORDER_BY_COLUMN_POSITION
    } else {
        ORDER_BY_POSITION
    });

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    let tasks = stmt
        .query_map(params_refs.as_slice(), row_to_task)?
        .collect::<rusqlite::Result<Vec<Task>>>()?;
    Ok(tasks)
}

pub fn patch_task(conn: &Connection, id: &TaskId, patch: &TaskPatch) -> Result<Task> {
    let now_str = now().to_rfc3339();

    let mut updates = vec!["updated_at = ?1".to_string()];
    let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(now_str)];
    let mut param_idx = 2;

    if let Some(ref container_id) = patch.container_id {
        updates.push(format!("container_id = ?{}", param_idx));
        params_vec.push(Box::new(container_id.clone()));
        param_idx += 1;
    }

    if let Some(ref parent_id) = patch.parent_id {
        updates.push(format!("parent_id = ?{}", param_idx));
        params_vec.push(Box::new(parent_id.clone()));
        param_idx += 1;
    }

    if let Some(ref title) = patch.title {
        updates.push(format!("title = ?{}", param_idx));
        params_vec.push(Box::new(title.clone()));
        param_idx += 1;
    }

    if let Some(ref status) = patch.status {
        updates.push(format!("status = ?{}", param_idx));
        params_vec.push(Box::new(status.clone()));
        param_idx += 1;
    }

    if let Some(position) = patch.position {
        updates.push(format!("position = ?{}", param_idx));
        params_vec.push(Box::new(position));
        param_idx += 1;
    }

    if let Some(column_position) = patch.column_position {
        updates.push(format!("column_position = ?{}", param_idx));
        params_vec.push(Box::new(column_position));
        param_idx += 1;
    }

    params_vec.push(Box::new(id.clone()));

    let sql = format!(
        "UPDATE tasks SET {} WHERE id = ?{}",
        updates.join(", "),
        param_idx
    );

    let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    let changed = conn.execute(&sql, params_refs.as_slice())?;
    if changed == 0 {
        return Err(ArborError::TaskNotFound(id.clone()));
    }

    require_task(conn, id)
}

pub fn delete_task(conn: &Connection, id: &TaskId) -> Result<()> {
    let changed = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(ArborError::TaskNotFound(id.clone()));
    }
    Ok(())
}
