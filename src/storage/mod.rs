//! Storage Layer - per-repository SQLite storage files
//!
//! Each storage file holds the index of one repository (or one commit) with
//! tables:
//! - documents(path, value)
//! - definitions(scheme, identifier, document_path, range)
//! - references(scheme, identifier, document_path, range)

pub mod sqlite;
pub mod pool;

#[cfg(test)]
pub(crate) mod schema;
#[cfg(test)]
pub(crate) mod fixtures;

pub use pool::ConnectionPool;
pub use sqlite::{MonikerLocation, MonikerTable};
