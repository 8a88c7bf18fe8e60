//! Metrics - injected recorder for query timings, cache activity and
//! data-integrity faults
//!
//! Recorders are observational only: nothing in the engine branches on
//! what a recorder does.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use crate::document::Id;

/// Which collaborator an instrumented operation talked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryTarget {
    /// A per-repository storage file
    Database,
    /// The cross-repository index
    Xrepo,
}

impl QueryTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryTarget::Database => "database",
            QueryTarget::Xrepo => "xrepo",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Connection,
    Document,
}

impl CacheKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKind::Connection => "connection",
            CacheKind::Document => "document",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheEvent {
    Hit,
    Miss,
    Evict,
}

impl CacheEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheEvent::Hit => "hit",
            CacheEvent::Miss => "miss",
            CacheEvent::Evict => "evict",
        }
    }
}

/// Malformed index data noticed while answering a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityFault {
    /// A `next` chain revisited the given result set
    Cycle { result_set: Id },
    /// A result link pointing at nothing
    DanglingResult { id: Id },
    /// A definition/reference entry naming a range its document lacks
    UnknownRange { document_path: String, id: Id },
    /// A moniker edge pointing at no moniker vertex
    DanglingMoniker { id: Id },
}

/// Sink for engine observations.
pub trait MetricsRecorder: Send + Sync {
    fn observe_query(&self, target: QueryTarget, elapsed: Duration, failed: bool);

    fn cache_event(&self, cache: CacheKind, event: CacheEvent);

    fn cache_size(&self, cache: CacheKind, size: usize);

    fn cache_capacity(&self, cache: CacheKind, capacity: usize);

    fn integrity_fault(&self, fault: &IntegrityFault);
}

/// Log `fault` and hand it to `recorder`. Recorders do not log faults
/// themselves.
pub fn report_fault(recorder: &dyn MetricsRecorder, fault: IntegrityFault) {
    tracing::warn!(?fault, "data integrity fault");
    recorder.integrity_fault(&fault);
}

/// Time `fut`, record its outcome against `target` and hand the result back
/// untouched.
pub async fn instrument<T, E, F>(recorder: &dyn MetricsRecorder, target: QueryTarget, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    let start = Instant::now();
    let result = fut.await;
    recorder.observe_query(target, start.elapsed(), result.is_err());
    result
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

impl MetricsRecorder for NoopRecorder {
    fn observe_query(&self, _target: QueryTarget, _elapsed: Duration, _failed: bool) {}

    fn cache_event(&self, _cache: CacheKind, _event: CacheEvent) {}

    fn cache_size(&self, _cache: CacheKind, _size: usize) {}

    fn cache_capacity(&self, _cache: CacheKind, _capacity: usize) {}

    fn integrity_fault(&self, _fault: &IntegrityFault) {}
}

/// Emits every observation as a `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogRecorder;

impl MetricsRecorder for LogRecorder {
    fn observe_query(&self, target: QueryTarget, elapsed: Duration, failed: bool) {
        tracing::debug!(target = target.as_str(), elapsed_ms = elapsed.as_millis() as u64, failed, "query");
    }

    fn cache_event(&self, cache: CacheKind, event: CacheEvent) {
        tracing::trace!(cache = cache.as_str(), event = event.as_str(), "cache event");
    }

    fn cache_size(&self, cache: CacheKind, size: usize) {
        tracing::trace!(cache = cache.as_str(), size, "cache size");
    }

    fn cache_capacity(&self, cache: CacheKind, capacity: usize) {
        tracing::debug!(cache = cache.as_str(), capacity, "cache capacity");
    }

    fn integrity_fault(&self, _fault: &IntegrityFault) {}
}

/// In-process counters.
#[derive(Debug, Default)]
pub struct CountingRecorder {
    database_queries: AtomicU64,
    database_errors: AtomicU64,
    xrepo_queries: AtomicU64,
    xrepo_errors: AtomicU64,
    connection_events: [AtomicU64; 3],
    document_events: [AtomicU64; 3],
    connection_size: AtomicU64,
    document_size: AtomicU64,
    connection_capacity: AtomicU64,
    document_capacity: AtomicU64,
    integrity_faults: AtomicU64,
}

/// A point-in-time copy of a [`CountingRecorder`].
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct CounterSnapshot {
    pub database_queries: u64,
    pub database_errors: u64,
    pub xrepo_queries: u64,
    pub xrepo_errors: u64,
    pub connection_hits: u64,
    pub connection_misses: u64,
    pub connection_evictions: u64,
    pub connection_size: u64,
    pub document_hits: u64,
    pub document_misses: u64,
    pub document_evictions: u64,
    pub document_size: u64,
    pub connection_capacity: u64,
    pub document_capacity: u64,
    pub integrity_faults: u64,
}

impl CountingRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn events(&self, cache: CacheKind) -> &[AtomicU64; 3] {
        match cache {
            CacheKind::Connection => &self.connection_events,
            CacheKind::Document => &self.document_events,
        }
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);

        CounterSnapshot {
            database_queries: load(&self.database_queries),
            database_errors: load(&self.database_errors),
            xrepo_queries: load(&self.xrepo_queries),
            xrepo_errors: load(&self.xrepo_errors),
            connection_hits: load(&self.connection_events[0]),
            connection_misses: load(&self.connection_events[1]),
            connection_evictions: load(&self.connection_events[2]),
            connection_size: load(&self.connection_size),
            document_hits: load(&self.document_events[0]),
            document_misses: load(&self.document_events[1]),
            document_evictions: load(&self.document_events[2]),
            document_size: load(&self.document_size),
            connection_capacity: load(&self.connection_capacity),
            document_capacity: load(&self.document_capacity),
            integrity_faults: load(&self.integrity_faults),
        }
    }
}

impl MetricsRecorder for CountingRecorder {
    fn observe_query(&self, target: QueryTarget, _elapsed: Duration, failed: bool) {
        let (queries, errors) = match target {
            QueryTarget::Database => (&self.database_queries, &self.database_errors),
            QueryTarget::Xrepo => (&self.xrepo_queries, &self.xrepo_errors),
        };
        queries.fetch_add(1, Ordering::Relaxed);
        if failed {
            errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn cache_event(&self, cache: CacheKind, event: CacheEvent) {
        let slot = match event {
            CacheEvent::Hit => 0,
            CacheEvent::Miss => 1,
            CacheEvent::Evict => 2,
        };
        self.events(cache)[slot].fetch_add(1, Ordering::Relaxed);
    }

    fn cache_size(&self, cache: CacheKind, size: usize) {
        let gauge = match cache {
            CacheKind::Connection => &self.connection_size,
            CacheKind::Document => &self.document_size,
        };
        gauge.store(size as u64, Ordering::Relaxed);
    }

    fn cache_capacity(&self, cache: CacheKind, capacity: usize) {
        let gauge = match cache {
            CacheKind::Connection => &self.connection_capacity,
            CacheKind::Document => &self.document_capacity,
        };
        gauge.store(capacity as u64, Ordering::Relaxed);
    }

    fn integrity_fault(&self, _fault: &IntegrityFault) {
        self.integrity_faults.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_instrument_counts_failures() {
        let recorder = CountingRecorder::new();

        let ok: Result<u32, String> = instrument(&recorder, QueryTarget::Xrepo, async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));

        let err: Result<u32, String> =
            instrument(&recorder, QueryTarget::Xrepo, async { Err("boom".to_string()) }).await;
        assert_eq!(err, Err("boom".to_string()));

        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.xrepo_queries, 2);
        assert_eq!(snapshot.xrepo_errors, 1);
        assert_eq!(snapshot.database_queries, 0);
    }

    #[test]
    fn test_cache_counters() {
        let recorder = CountingRecorder::new();
        recorder.cache_event(CacheKind::Document, CacheEvent::Miss);
        recorder.cache_event(CacheKind::Document, CacheEvent::Hit);
        recorder.cache_event(CacheKind::Document, CacheEvent::Hit);
        recorder.cache_event(CacheKind::Connection, CacheEvent::Evict);
        recorder.cache_size(CacheKind::Document, 4);

        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.document_hits, 2);
        assert_eq!(snapshot.document_misses, 1);
        assert_eq!(snapshot.connection_evictions, 1);
        assert_eq!(snapshot.document_size, 4);
    }

    #[test]
    fn test_capacity_gauges() {
        let recorder = CountingRecorder::new();
        recorder.cache_capacity(CacheKind::Connection, 100);
        recorder.cache_capacity(CacheKind::Document, 25);

        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.connection_capacity, 100);
        assert_eq!(snapshot.document_capacity, 25);
    }

    #[test]
    fn test_report_fault_records_once() {
        let recorder = CountingRecorder::new();
        report_fault(&recorder, IntegrityFault::DanglingMoniker { id: Id::from("m9") });
        assert_eq!(recorder.snapshot().integrity_faults, 1);
    }
}
