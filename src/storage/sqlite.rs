//! SQLite access to a single storage file
//!
//! Storage files are read-only from the engine's point of view, so every
//! function here takes a shared `&Connection`.

use std::path::Path;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use crate::Result;
use crate::position::Range;

/// Open a storage file for reading.
///
/// A missing file is an error rather than a fresh empty database.
pub fn open_read_only(path: &Path) -> Result<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    Ok(conn)
}

/// Load the raw payload of the document stored under `path`.
pub fn load_document_payload(conn: &Connection, path: &str) -> Result<Option<Vec<u8>>> {
    conn.query_row("SELECT value FROM documents WHERE path = ?1", [path], |row| row.get(0))
        .optional()
        .map_err(Into::into)
}

/// The moniker-indexed tables of a storage file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonikerTable {
    Definitions,
    References,
}

impl MonikerTable {
    fn select_sql(&self) -> &'static str {
        match self {
            MonikerTable::Definitions => {
                "SELECT document_path, start_line, start_character, end_line, end_character
                 FROM definitions WHERE scheme = ?1 AND identifier = ?2 ORDER BY id"
            }
            MonikerTable::References => {
                "SELECT document_path, start_line, start_character, end_line, end_character
                 FROM \"references\" WHERE scheme = ?1 AND identifier = ?2 ORDER BY id"
            }
        }
    }
}

/// A row of a moniker table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonikerLocation {
    pub document_path: String,
    pub range: Range,
}

/// Find every row of `table` recorded for the moniker (scheme, identifier).
pub fn find_moniker_locations(
    conn: &Connection,
    table: MonikerTable,
    scheme: &str,
    identifier: &str,
) -> Result<Vec<MonikerLocation>> {
    let mut stmt = conn.prepare_cached(table.select_sql())?;

    let locations = stmt
        .query_map([scheme, identifier], row_to_location)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(locations)
}

/// Helper to convert a row to a MonikerLocation
fn row_to_location(row: &rusqlite::Row) -> rusqlite::Result<MonikerLocation> {
    Ok(MonikerLocation {
        document_path: row.get(0)?,
        range: Range::new(row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?),
    })
}
