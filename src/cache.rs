//! Document store - bounded cache of decoded documents
//!
//! Documents are keyed by (storage file, path) and evicted in
//! least-recently-used order. Concurrent requests for a key that is not
//! cached share one load. The load runs as its own task, so a caller that
//! stops waiting does not cancel it for the others.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use indexmap::IndexMap;
use parking_lot::Mutex;
use crate::document::Document;
use crate::metrics::{self, CacheEvent, CacheKind, MetricsRecorder, QueryTarget};
use crate::storage::{ConnectionPool, sqlite};
use crate::{Error, Result};

/// Cache key: one path inside one storage file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentKey {
    pub storage_file: PathBuf,
    pub path: String,
}

impl DocumentKey {
    pub fn new(storage_file: &Path, path: &str) -> Self {
        Self {
            storage_file: storage_file.to_path_buf(),
            path: path.to_string(),
        }
    }
}

type LoadOutcome = std::result::Result<Option<Arc<Document>>, Arc<Error>>;
type SharedLoad = Shared<BoxFuture<'static, LoadOutcome>>;

#[derive(Default)]
struct CacheState {
    entries: IndexMap<DocumentKey, Arc<Document>>,
    /// Pending loads, tagged with the id of the load that registered them
    in_flight: HashMap<DocumentKey, (u64, SharedLoad)>,
    next_load: u64,
}

impl CacheState {
    fn touch(&mut self, key: &DocumentKey) -> Option<Arc<Document>> {
        let (key, document) = self.entries.shift_remove_entry(key)?;
        self.entries.insert(key, document.clone());
        Some(document)
    }

    fn next_load_id(&mut self) -> u64 {
        self.next_load += 1;
        self.next_load
    }

    /// Drop the pending entry for `key` if it still belongs to load `id`.
    fn finish_load(&mut self, key: &DocumentKey, id: u64) {
        if matches!(self.in_flight.get(key), Some((current, _)) if *current == id) {
            self.in_flight.remove(key);
        }
    }
}

/// Process-wide cache of decoded documents.
pub struct DocumentStore {
    capacity: usize,
    state: Arc<Mutex<CacheState>>,
    pool: Arc<ConnectionPool>,
    metrics: Arc<dyn MetricsRecorder>,
}

impl DocumentStore {
    /// Create a store holding at most `capacity` documents (at least one),
    /// loading through `pool`.
    pub fn new(capacity: usize, pool: Arc<ConnectionPool>, metrics: Arc<dyn MetricsRecorder>) -> Self {
        let capacity = capacity.max(1);
        metrics.cache_capacity(CacheKind::Document, capacity);
        metrics.cache_size(CacheKind::Document, 0);
        Self {
            capacity,
            state: Arc::new(Mutex::new(CacheState::default())),
            pool,
            metrics,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of cached documents.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the document stored under `path` in `storage_file`.
    ///
    /// `Ok(None)` means the storage file has no such document. Load and
    /// decode failures reach every caller waiting on the same key and are
    /// not cached.
    pub async fn get_document(&self, storage_file: &Path, path: &str) -> Result<Option<Arc<Document>>> {
        let key = DocumentKey::new(storage_file, path);

        let load = {
            let mut state = self.state.lock();
            if let Some(document) = state.touch(&key) {
                self.metrics.cache_event(CacheKind::Document, CacheEvent::Hit);
                return Ok(Some(document));
            }

            match state.in_flight.get(&key) {
                Some((_, load)) => {
                    tracing::debug!(path, "joining in-flight document load");
                    load.clone()
                }
                None => {
                    self.metrics.cache_event(CacheKind::Document, CacheEvent::Miss);
                    let id = state.next_load_id();
                    let load = self.spawn_load(key.clone(), id);
                    state.in_flight.insert(key, (id, load.clone()));
                    load
                }
            }
        };

        load.await.map_err(Error::Shared)
    }

    /// Start loading `key` in the background. Must be called with the state
    /// lock held so the task cannot finish before it is registered.
    fn spawn_load(&self, key: DocumentKey, id: u64) -> SharedLoad {
        let pool = self.pool.clone();
        let state = self.state.clone();
        let metrics = self.metrics.clone();
        let capacity = self.capacity;
        let task_key = key.clone();

        let task = tokio::spawn(async move {
            let key = task_key;
            let outcome: LoadOutcome = load_document(&pool, metrics.as_ref(), &key)
                .await
                .map(|document| document.map(Arc::new))
                .map_err(Arc::new);

            let mut state = state.lock();
            state.finish_load(&key, id);
            if let Ok(Some(document)) = &outcome {
                state.entries.insert(key, document.clone());
                while state.entries.len() > capacity {
                    if let Some((evicted, _)) = state.entries.shift_remove_index(0) {
                        tracing::debug!(path = %evicted.path, "evicting document");
                        metrics.cache_event(CacheKind::Document, CacheEvent::Evict);
                    }
                }
                metrics.cache_size(CacheKind::Document, state.entries.len());
            }

            outcome
        });

        let state = self.state.clone();
        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    // The task died before it could clean up after itself
                    state.lock().finish_load(&key, id);
                    Err(Arc::new(Error::from(err)))
                }
            }
        }
        .boxed()
        .shared()
    }
}

async fn load_document(
    pool: &ConnectionPool,
    metrics: &dyn MetricsRecorder,
    key: &DocumentKey,
) -> Result<Option<Document>> {
    let path = key.path.clone();
    let payload = metrics::instrument(
        metrics,
        QueryTarget::Database,
        pool.with_connection(&key.storage_file, move |conn| sqlite::load_document_payload(conn, &path)),
    )
    .await?;

    let Some(payload) = payload else {
        return Ok(None);
    };

    let path = key.path.clone();
    let document = tokio::task::spawn_blocking(move || Document::decode(&path, &payload)).await??;
    Ok(Some(document))
}
