//! Cross-repository index
//!
//! Answers two questions about packages:
//! - which (repository, commit) declares a package version
//! - which (repository, commit) pairs reference a symbol of a package version,
//!   one page at a time

pub mod sqlite;

#[cfg(test)]
pub(crate) mod schema;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::Result;

pub use sqlite::SqliteXrepoIndex;

/// A repository at a specific commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageLocation {
    pub repository: String,
    pub commit: String,
}

impl PackageLocation {
    pub fn new(repository: impl Into<String>, commit: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            commit: commit.into(),
        }
    }
}

/// Opaque position in a paginated reference listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageToken(u32);

impl PageToken {
    pub fn from_index(index: u32) -> Self {
        Self(index)
    }

    pub fn index(&self) -> u32 {
        self.0
    }

    /// The token following this one.
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

/// One page of repositories referencing a symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferencePage {
    pub references: Vec<PackageLocation>,
    /// `None` once the listing is exhausted
    pub next_page: Option<PageToken>,
}

/// Client of the cross-repository index.
#[async_trait]
pub trait XrepoIndex: Send + Sync {
    /// Find the repository and commit that declare `name@version`.
    async fn get_package(&self, scheme: &str, name: &str, version: &str) -> Result<Option<PackageLocation>>;

    /// List a page of repositories that reference `identifier` from `name@version`.
    ///
    /// `page` of `None` asks for the first page.
    async fn get_references(
        &self,
        scheme: &str,
        name: &str,
        version: &str,
        identifier: &str,
        page: Option<PageToken>,
    ) -> Result<ReferencePage>;
}
