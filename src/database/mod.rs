pub mod schema;

use crate::error::AppError;
use rusqlite::Connection;
use std::path::Path;

/// File name of the local database inside the data directory
pub const DATABASE_FILE: &str = "coastal-kiln.db";

/// Opens (creating if needed) the database at `path` with the full schema
pub fn init_database(path: &Path) -> Result<Connection, AppError> {
    // Make sure the directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let conn = Connection::open(path)?;
    schema::init_schema(&conn)?;

    log::debug!("Local database ready at {}", path.display());
    Ok(conn)
}

/// In-memory database with the full schema, for tests and throwaway sessions
pub fn init_in_memory() -> Result<Connection, AppError> {
    let conn = Connection::open_in_memory()?;
    schema::init_schema(&conn)?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("kiln.db");

        let conn = init_database(&path).unwrap();
        assert!(path.exists());

        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='kv_store'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
