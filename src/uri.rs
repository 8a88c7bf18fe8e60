//! Remote locations and storage file naming
//!
//! Remote URI format: `git://<repository>?<commit>#<path>`
//!
//! Examples:
//! - `git://github.com/sourcegraph/left-pad?deadbeef#index.js`
//!
//! Storage files are named after the URI-component encoding of the
//! repository (and, for per-commit layouts, the commit) with a fixed
//! `.lsif.db` suffix.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use url::Url;
use crate::{Error, Result};

/// Characters left untouched by URI-component encoding.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const STORAGE_SUFFIX: &str = ".lsif.db";

/// A location inside another repository at a specific commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteUri {
    /// Repository identifier, e.g. `github.com/owner/name`
    pub repository: String,
    /// Commit the location belongs to
    pub commit: String,
    /// Path relative to the repository root
    pub path: String,
}

impl RemoteUri {
    pub fn new(repository: impl Into<String>, commit: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            commit: commit.into(),
            path: path.into(),
        }
    }

    /// Build the `git://` URL for this location.
    pub fn to_url(&self) -> Result<Url> {
        let mut url = Url::parse(&format!("git://{}", self.repository))
            .map_err(|e| Error::InvalidUri(format!("{}: {}", self.repository, e)))?;
        url.set_query(Some(&self.commit));
        url.set_fragment(Some(&self.path));
        Ok(url)
    }

    /// Convert to URI string
    pub fn to_uri_string(&self) -> Result<String> {
        self.to_url().map(String::from)
    }

    /// Parse a URI string into a RemoteUri
    ///
    /// Expected format: `git://<repository>?<commit>#<path>`
    pub fn parse(uri: &str) -> Result<Self> {
        let url = Url::parse(uri).map_err(|e| Error::InvalidUri(format!("{}: {}", uri, e)))?;

        if url.scheme() != "git" {
            return Err(Error::InvalidUri(format!("URI must use the git scheme: {}", uri)));
        }

        let host = url
            .host_str()
            .ok_or_else(|| Error::InvalidUri(format!("URI must name a repository: {}", uri)))?;
        let commit = url
            .query()
            .ok_or_else(|| Error::InvalidUri(format!("URI must carry a commit: {}", uri)))?;
        let path = url
            .fragment()
            .ok_or_else(|| Error::InvalidUri(format!("URI must carry a path fragment: {}", uri)))?;

        let repository = format!("{}{}", host, url.path().trim_end_matches('/'));

        Ok(Self {
            repository,
            commit: commit.to_string(),
            path: path.to_string(),
        })
    }
}

impl fmt::Display for RemoteUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_url() {
            Ok(url) => write!(f, "{}", url),
            Err(_) => write!(f, "git://{}?{}#{}", self.repository, self.commit, self.path),
        }
    }
}

impl FromStr for RemoteUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for RemoteUri {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RemoteUri {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        RemoteUri::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Maps (repository, commit) to the storage file holding its index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    root: PathBuf,
    per_commit: bool,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>, per_commit: bool) -> Self {
        Self {
            root: root.into(),
            per_commit,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn storage_file(&self, repository: &str, commit: &str) -> PathBuf {
        let repository = utf8_percent_encode(repository, COMPONENT);
        let filename = if self.per_commit {
            format!("{}@{}{}", repository, utf8_percent_encode(commit, COMPONENT), STORAGE_SUFFIX)
        } else {
            format!("{}{}", repository, STORAGE_SUFFIX)
        };
        self.root.join(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_roundtrip() {
        let uri = RemoteUri::new("github.com/sourcegraph/left-pad", "deadbeef", "src/index.js");
        let uri_str = uri.to_uri_string().unwrap();
        assert_eq!(uri_str, "git://github.com/sourcegraph/left-pad?deadbeef#src/index.js");

        let parsed = RemoteUri::parse(&uri_str).unwrap();
        assert_eq!(parsed, uri);
    }

    #[test]
    fn test_bare_repository_name() {
        let uri = RemoteUri::new("r", "c", "index.js");
        assert_eq!(uri.to_string(), "git://r?c#index.js");
    }

    #[test]
    fn test_invalid_uri() {
        assert!(RemoteUri::parse("invalid").is_err());
        assert!(RemoteUri::parse("http://example.com?c#p").is_err());
        assert!(RemoteUri::parse("git://repo#path").is_err()); // missing commit
        assert!(RemoteUri::parse("git://repo?commit").is_err()); // missing fragment
    }

    #[test]
    fn test_storage_file_per_repository() {
        let layout = StorageLayout::new("/data", false);
        assert_eq!(
            layout.storage_file("github.com/a/b", "c0ffee"),
            PathBuf::from("/data/github.com%2Fa%2Fb.lsif.db")
        );
    }

    #[test]
    fn test_storage_file_per_commit() {
        let layout = StorageLayout::new("/data", true);
        assert_eq!(
            layout.storage_file("github.com/a/b", "c0ffee"),
            PathBuf::from("/data/github.com%2Fa%2Fb@c0ffee.lsif.db")
        );
    }
}
