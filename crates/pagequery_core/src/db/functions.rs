//! Application-defined SQL functions registered on every opened connection.
//!
//! # Invariants
//! - `pq_lower` folds text with full Unicode rules, matching the in-memory
//!   store's substring matching.
//! - Registered functions are deterministic so SQLite may use them in
//!   indexes and constant folding.

use super::DbResult;
use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::ValueRef;
use rusqlite::Connection;

/// Unicode-aware replacement for SQLite's ASCII-only `LOWER`.
pub const UNICODE_LOWER: &str = "pq_lower";

/// Registers application SQL functions on `conn`.
///
/// Connections from `open_db`/`open_db_in_memory` already have them;
/// call this for connections opened elsewhere before handing them to a
/// `SqliteRecordStore`.
pub fn register_functions(conn: &Connection) -> DbResult<()> {
    conn.create_scalar_function(
        UNICODE_LOWER,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        unicode_lower,
    )?;
    Ok(())
}

fn unicode_lower(ctx: &Context<'_>) -> rusqlite::Result<Option<String>> {
    // Numbers render in decimal like `FieldValue::as_search_text`.
    Ok(match ctx.get_raw(0) {
        ValueRef::Null | ValueRef::Blob(_) => None,
        ValueRef::Integer(value) => Some(value.to_string()),
        ValueRef::Real(value) => Some(value.to_string()),
        ValueRef::Text(bytes) => Some(String::from_utf8_lossy(bytes).to_lowercase()),
    })
}

#[cfg(test)]
mod tests {
    use super::{register_functions, UNICODE_LOWER};
    use rusqlite::Connection;

    #[test]
    fn unicode_lower_folds_accented_text() {
        let conn = Connection::open_in_memory().unwrap();
        register_functions(&conn).unwrap();

        let lowered: String = conn
            .query_row(&format!("SELECT {UNICODE_LOWER}('ÁLVARO ÉRICA')"), [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(lowered, "álvaro érica");

        let builtin: String = conn
            .query_row("SELECT LOWER('ÁLVARO')", [], |row| row.get(0))
            .unwrap();
        assert_eq!(builtin, "Álvaro");
    }

    #[test]
    fn unicode_lower_keeps_null_and_renders_numbers() {
        let conn = Connection::open_in_memory().unwrap();
        register_functions(&conn).unwrap();

        let (null, number): (Option<String>, String) = conn
            .query_row(
                &format!("SELECT {UNICODE_LOWER}(NULL), {UNICODE_LOWER}(42)"),
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(null, None);
        assert_eq!(number, "42");
    }
}
