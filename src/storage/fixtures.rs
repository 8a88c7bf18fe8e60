//! Test-only writers for storage files and cross-repository indexes

use std::path::Path;
use rusqlite::{Connection, params};
use crate::document::Document;
use crate::position::Range;
use super::schema;

/// Builds a storage file on disk.
pub struct StorageFixture {
    conn: Connection,
}

impl StorageFixture {
    pub fn create(path: &Path) -> Self {
        let conn = Connection::open(path).unwrap();
        for stmt in schema::all_schema_statements() {
            conn.execute(stmt, []).unwrap();
        }
        Self { conn }
    }

    pub fn document(self, path: &str, document: &Document) -> Self {
        let payload = document.encode().unwrap();
        self.raw_document(path, &payload)
    }

    pub fn raw_document(self, path: &str, payload: &[u8]) -> Self {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO documents (path, value) VALUES (?1, ?2)",
                params![path, payload],
            )
            .unwrap();
        self
    }

    pub fn definition(self, scheme: &str, identifier: &str, path: &str, range: Range) -> Self {
        self.moniker_row("definitions", scheme, identifier, path, range)
    }

    pub fn reference(self, scheme: &str, identifier: &str, path: &str, range: Range) -> Self {
        self.moniker_row("\"references\"", scheme, identifier, path, range)
    }

    fn moniker_row(self, table: &str, scheme: &str, identifier: &str, path: &str, range: Range) -> Self {
        let sql = format!(
            "INSERT INTO {} (scheme, identifier, document_path, start_line, start_character, end_line, end_character)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            table
        );
        self.conn
            .execute(
                &sql,
                params![
                    scheme,
                    identifier,
                    path,
                    range.start.line,
                    range.start.character,
                    range.end.line,
                    range.end.character,
                ],
            )
            .unwrap();
        self
    }

    pub fn finish(self) {
        drop(self.conn);
    }
}

/// Builds a cross-repository index on disk.
pub struct XrepoFixture {
    conn: Connection,
}

impl XrepoFixture {
    pub fn create(path: &Path) -> Self {
        let conn = Connection::open(path).unwrap();
        for stmt in crate::xrepo::schema::all_schema_statements() {
            conn.execute(stmt, []).unwrap();
        }
        Self { conn }
    }

    pub fn package(self, scheme: &str, name: &str, version: &str, repository: &str, commit: &str) -> Self {
        self.conn
            .execute(
                "INSERT INTO packages (scheme, name, version, repository, \"commit\") VALUES (?1, ?2, ?3, ?4, ?5)",
                params![scheme, name, version, repository, commit],
            )
            .unwrap();
        self
    }

    pub fn reference(
        self,
        scheme: &str,
        name: &str,
        version: &str,
        identifier: &str,
        repository: &str,
        commit: &str,
    ) -> Self {
        self.conn
            .execute(
                "INSERT INTO package_references (scheme, name, version, identifier, repository, \"commit\")
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![scheme, name, version, identifier, repository, commit],
            )
            .unwrap();
        self
    }

    pub fn finish(self) {
        drop(self.conn);
    }
}
