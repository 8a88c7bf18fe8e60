//! Connection pool - bounded set of open storage file handles
//!
//! Handles are kept in least-recently-used order. Evicting a handle only
//! drops the pool's reference to it; a use already in flight keeps the
//! connection open until it finishes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use indexmap::IndexMap;
use parking_lot::Mutex;
use rusqlite::Connection;
use crate::Result;
use crate::metrics::{CacheEvent, CacheKind, MetricsRecorder};
use super::sqlite;

type Handle = Arc<Mutex<Connection>>;

/// Bounded LRU of read-only SQLite connections keyed by file path.
pub struct ConnectionPool {
    capacity: usize,
    handles: Mutex<IndexMap<PathBuf, Handle>>,
    metrics: Arc<dyn MetricsRecorder>,
}

impl ConnectionPool {
    /// Create a pool holding at most `capacity` open handles (at least one).
    pub fn new(capacity: usize, metrics: Arc<dyn MetricsRecorder>) -> Self {
        let capacity = capacity.max(1);
        metrics.cache_capacity(CacheKind::Connection, capacity);
        metrics.cache_size(CacheKind::Connection, 0);
        Self {
            capacity,
            handles: Mutex::new(IndexMap::new()),
            metrics,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of currently open handles.
    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` against the connection for `path` on the blocking thread pool.
    ///
    /// The handle is opened on first use and stays valid for the whole call.
    pub async fn with_connection<T, F>(&self, path: &Path, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let handle = self.acquire(path).await?;

        tokio::task::spawn_blocking(move || {
            let conn = handle.lock();
            f(&conn)
        })
        .await?
    }

    async fn acquire(&self, path: &Path) -> Result<Handle> {
        if let Some(handle) = self.touch(path) {
            self.metrics.cache_event(CacheKind::Connection, CacheEvent::Hit);
            return Ok(handle);
        }

        self.metrics.cache_event(CacheKind::Connection, CacheEvent::Miss);
        tracing::debug!(path = %path.display(), "opening storage file");

        let owned = path.to_path_buf();
        let conn = tokio::task::spawn_blocking(move || sqlite::open_read_only(&owned)).await??;
        let handle = Arc::new(Mutex::new(conn));

        let mut handles = self.handles.lock();
        if let Some(existing) = handles.get(path) {
            // Another caller opened the same file while we were opening ours
            return Ok(existing.clone());
        }

        handles.insert(path.to_path_buf(), handle.clone());
        while handles.len() > self.capacity {
            if let Some((evicted, _)) = handles.shift_remove_index(0) {
                tracing::debug!(path = %evicted.display(), "closing storage file");
                self.metrics.cache_event(CacheKind::Connection, CacheEvent::Evict);
            }
        }
        self.metrics.cache_size(CacheKind::Connection, handles.len());

        Ok(handle)
    }

    /// Return the handle for `path`, marking it most recently used.
    fn touch(&self, path: &Path) -> Option<Handle> {
        let mut handles = self.handles.lock();
        let (key, handle) = handles.shift_remove_entry(path)?;
        handles.insert(key, handle.clone());
        Some(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::CountingRecorder;
    use crate::storage::fixtures::StorageFixture;
    use crate::Error;

    fn storage_files(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| {
                let path = dir.join(name);
                StorageFixture::create(&path).raw_document("a.ts", name.as_bytes()).finish();
                path
            })
            .collect()
    }

    async fn read_payload(pool: &ConnectionPool, path: &Path) -> Option<Vec<u8>> {
        pool.with_connection(path, |conn| sqlite::load_document_payload(conn, "a.ts"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_reuses_open_handles() {
        let dir = tempfile::tempdir().unwrap();
        let files = storage_files(dir.path(), &["one.db"]);
        let recorder = Arc::new(CountingRecorder::new());
        let pool = ConnectionPool::new(4, recorder.clone());

        assert_eq!(read_payload(&pool, &files[0]).await, Some(b"one.db".to_vec()));
        assert_eq!(read_payload(&pool, &files[0]).await, Some(b"one.db".to_vec()));

        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.connection_misses, 1);
        assert_eq!(snapshot.connection_hits, 1);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_reports_capacity() {
        let recorder = Arc::new(CountingRecorder::new());
        let pool = ConnectionPool::new(0, recorder.clone());

        assert_eq!(pool.capacity(), 1);
        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.connection_capacity, 1);
        assert_eq!(snapshot.connection_size, 0);
    }

    #[tokio::test]
    async fn test_evicts_least_recently_used() {
        let dir = tempfile::tempdir().unwrap();
        let files = storage_files(dir.path(), &["a.db", "b.db", "c.db"]);
        let recorder = Arc::new(CountingRecorder::new());
        let pool = ConnectionPool::new(2, recorder.clone());

        read_payload(&pool, &files[0]).await;
        read_payload(&pool, &files[1]).await;
        // Touch a so that b becomes the eviction candidate
        read_payload(&pool, &files[0]).await;
        read_payload(&pool, &files[2]).await;

        assert_eq!(pool.len(), 2);
        assert_eq!(recorder.snapshot().connection_evictions, 1);

        // a is still open, b has to be reopened
        read_payload(&pool, &files[0]).await;
        assert_eq!(recorder.snapshot().connection_misses, 3);
        read_payload(&pool, &files[1]).await;
        assert_eq!(recorder.snapshot().connection_misses, 4);
    }

    #[tokio::test]
    async fn test_open_failure_is_not_pooled() {
        let dir = tempfile::tempdir().unwrap();
        let pool = ConnectionPool::new(2, Arc::new(CountingRecorder::new()));

        let result = pool
            .with_connection(&dir.path().join("missing.db"), |_| Ok(()))
            .await;
        assert!(matches!(result, Err(Error::Storage(_))));
        assert!(pool.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_eviction_does_not_close_in_flight_handle() {
        let dir = tempfile::tempdir().unwrap();
        let files = storage_files(dir.path(), &["a.db", "b.db"]);
        let pool = Arc::new(ConnectionPool::new(1, Arc::new(CountingRecorder::new())));

        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        let in_flight = {
            let pool = pool.clone();
            let path = files[0].clone();
            tokio::spawn(async move {
                pool.with_connection(&path, move |conn| {
                    started_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    sqlite::load_document_payload(conn, "a.ts")
                })
                .await
            })
        };

        started_rx.await.unwrap();
        // Opening b evicts a while it is still in use
        assert_eq!(read_payload(&pool, &files[1]).await, Some(b"b.db".to_vec()));
        assert_eq!(pool.len(), 1);

        release_tx.send(()).unwrap();
        let payload = in_flight.await.unwrap().unwrap();
        assert_eq!(payload, Some(b"a.db".to_vec()));
    }
}
