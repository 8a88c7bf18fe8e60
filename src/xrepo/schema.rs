//! Cross-repository index schema definitions

/// SQL to create the packages table
/// At most one declaring repository per package version
pub const CREATE_PACKAGES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS packages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    scheme TEXT NOT NULL,
    name TEXT NOT NULL,
    version TEXT NOT NULL,
    repository TEXT NOT NULL,
    "commit" TEXT NOT NULL,
    UNIQUE(scheme, name, version)
)
"#;

/// SQL to create the package references table
pub const CREATE_PACKAGE_REFERENCES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS package_references (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    scheme TEXT NOT NULL,
    name TEXT NOT NULL,
    version TEXT NOT NULL,
    identifier TEXT NOT NULL,
    repository TEXT NOT NULL,
    "commit" TEXT NOT NULL
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_package_references_symbol ON package_references(scheme, name, version, identifier)",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![CREATE_PACKAGES_TABLE, CREATE_PACKAGE_REFERENCES_TABLE];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
