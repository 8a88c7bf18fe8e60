//! Storage file schema definitions

/// SQL to create the documents table
/// Each value is an encoded `Document` payload
pub const CREATE_DOCUMENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    path TEXT PRIMARY KEY,
    value BLOB NOT NULL
)
"#;

/// SQL to create the definitions table (moniker -> defining range)
pub const CREATE_DEFINITIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS definitions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    scheme TEXT NOT NULL,
    identifier TEXT NOT NULL,
    document_path TEXT NOT NULL,
    start_line INTEGER NOT NULL,
    start_character INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    end_character INTEGER NOT NULL
)
"#;

/// SQL to create the references table (moniker -> referencing range)
pub const CREATE_REFERENCES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS "references" (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    scheme TEXT NOT NULL,
    identifier TEXT NOT NULL,
    document_path TEXT NOT NULL,
    start_line INTEGER NOT NULL,
    start_character INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    end_character INTEGER NOT NULL
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_definitions_moniker ON definitions(scheme, identifier)",
    "CREATE INDEX IF NOT EXISTS idx_references_moniker ON \"references\"(scheme, identifier)",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_DOCUMENTS_TABLE,
        CREATE_DEFINITIONS_TABLE,
        CREATE_REFERENCES_TABLE,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
