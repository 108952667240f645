use rusqlite::Connection;

use crate::error::Result;

const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<()> {
    let current_version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if current_version == 0 {
        // No ON DELETE CASCADE anywhere: cascades are performed by the engine,
        // the store only refuses dangling references.
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS containers (
                id TEXT PRIMARY KEY CHECK (id LIKE 'ctr_%'),
                name TEXT NOT NULL,
                owner TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY CHECK (id LIKE 'task_%'),
                container_id TEXT NOT NULL REFERENCES containers(id),
                parent_id TEXT REFERENCES tasks(id) CHECK (parent_id LIKE 'task_%'),
                title TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'todo',
                position INTEGER NOT NULL DEFAULT 0,
                column_position INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS dependencies (
                id TEXT PRIMARY KEY CHECK (id LIKE 'dep_%'),
                from_id TEXT NOT NULL REFERENCES tasks(id),
                to_id TEXT NOT NULL REFERENCES tasks(id),
                kind TEXT NOT NULL,
                created_at TEXT NOT NULL,
                CHECK (from_id <> to_id),
                UNIQUE (from_id, to_id)
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_container_parent
                ON tasks(container_id, parent_id, position);
            CREATE INDEX IF NOT EXISTS idx_tasks_column
                ON tasks(container_id, parent_id, status, column_position);
            CREATE INDEX IF NOT EXISTS idx_tasks_parent ON tasks(parent_id);
            CREATE INDEX IF NOT EXISTS idx_dependencies_to ON dependencies(to_id);

            PRAGMA journal_mode = WAL;
            "#,
        )?;

        // Fresh database gets the latest schema version
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }

    Ok(())
}

pub fn open_db(path: &std::path::Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    init_schema(&conn)?;
    Ok(conn)
}

/// In-memory store with the same pragmas as `open_db`.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    init_schema(&conn)?;
    Ok(conn)
}
