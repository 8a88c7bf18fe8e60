//! SQLite-backed cross-repository index

use std::path::Path;
use std::sync::Arc;
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use crate::metrics::{self, MetricsRecorder, QueryTarget};
use crate::storage::sqlite::open_read_only;
use crate::{Error, Result};
use super::{PackageLocation, PageToken, ReferencePage, XrepoIndex};

/// Reads the cross-repository index from a single SQLite file.
pub struct SqliteXrepoIndex {
    conn: Arc<Mutex<Connection>>,
    page_size: u32,
    metrics: Arc<dyn MetricsRecorder>,
}

impl SqliteXrepoIndex {
    /// Open the index at `path`, serving reference listings `page_size`
    /// entries at a time (at least one).
    pub fn open(path: &Path, page_size: u32, metrics: Arc<dyn MetricsRecorder>) -> Result<Self> {
        let conn = open_read_only(path)
            .map_err(|e| Error::Xrepo(format!("cannot open {}: {}", path.display(), e)))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            page_size: page_size.max(1),
            metrics,
        })
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Run `f` against the index connection on the blocking thread pool.
    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        metrics::instrument(self.metrics.as_ref(), QueryTarget::Xrepo, blocking(self.conn.clone(), f)).await
    }
}

async fn blocking<T, F>(conn: Arc<Mutex<Connection>>, f: F) -> Result<T>
where
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let conn = conn.lock();
        f(&conn)
    })
    .await?
}

#[async_trait]
impl XrepoIndex for SqliteXrepoIndex {
    async fn get_package(&self, scheme: &str, name: &str, version: &str) -> Result<Option<PackageLocation>> {
        let (scheme, name, version) = (scheme.to_string(), name.to_string(), version.to_string());

        self.run(move |conn| {
            conn.query_row(
                "SELECT repository, \"commit\" FROM packages WHERE scheme = ?1 AND name = ?2 AND version = ?3",
                params![scheme, name, version],
                |row| Ok(PackageLocation::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()
            .map_err(Into::into)
        })
        .await
    }

    async fn get_references(
        &self,
        scheme: &str,
        name: &str,
        version: &str,
        identifier: &str,
        page: Option<PageToken>,
    ) -> Result<ReferencePage> {
        let (scheme, name, version, identifier) = (
            scheme.to_string(),
            name.to_string(),
            version.to_string(),
            identifier.to_string(),
        );
        let page = page.unwrap_or_default();
        let page_size = self.page_size;

        self.run(move |conn| {
            let mut stmt = conn.prepare_cached(
                r#"
                SELECT DISTINCT repository, "commit" FROM package_references
                WHERE scheme = ?1 AND name = ?2 AND version = ?3 AND identifier = ?4
                ORDER BY repository, "commit"
                LIMIT ?5 OFFSET ?6
                "#,
            )?;

            let limit = i64::from(page_size) + 1;
            let offset = i64::from(page.index()) * i64::from(page_size);

            let mut references = stmt
                .query_map(params![scheme, name, version, identifier, limit, offset], |row| {
                    Ok(PackageLocation::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            // The extra row only signals that another page exists
            let next_page = if references.len() > page_size as usize {
                references.truncate(page_size as usize);
                Some(page.next())
            } else {
                None
            };

            Ok(ReferencePage { references, next_page })
        })
        .await
    }
}
