pub mod container_repo;
pub mod dependency_repo;
pub mod schema;
pub mod task_repo;

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::error::Result;

pub use schema::{open_db, open_in_memory};

/// Run `f` as one all-or-nothing write unit.
///
/// Opens an IMMEDIATE transaction so concurrent writers on the same database
/// are serialized. When the connection is already inside a transaction the
/// closure joins it and the outer owner decides commit or rollback.
pub fn write_transaction<T, F>(conn: &Connection, f: F) -> Result<T>
where
    F: FnOnce(&Connection) -> Result<T>,
{
    if !conn.is_autocommit() {
        return f(conn);
    }

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    // Dropping `tx` on the error path rolls back
    let value = f(&*tx)?;
    tx.commit()?;
    Ok(value)
}
