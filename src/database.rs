//! Per-repository query engine
//!
//! A `Database` answers definition, reference and hover queries for one
//! storage file. When the answer is not recorded locally it follows the
//! symbol's monikers through the cross-repository index and queries the
//! storage files of other repositories.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use futures_util::future::try_join_all;
use indexmap::IndexMap;
use serde::Serialize;
use crate::Result;
use crate::cache::DocumentStore;
use crate::document::{Document, DocumentRangeRef, Id, MonikerData, MonikerKind};
use crate::graph::{GraphNode, ResultProperty, find_result};
use crate::metrics::{self, IntegrityFault, MetricsRecorder, QueryTarget};
use crate::moniker::find_monikers;
use crate::position::{Bounded, Position, Range, find_range_index};
use crate::storage::{ConnectionPool, MonikerTable, sqlite};
use crate::uri::{RemoteUri, StorageLayout};
use crate::xrepo::{PackageLocation, PageToken, XrepoIndex};

/// A range inside a document. `uri` is a path relative to the queried
/// repository, or a `git://` URI for locations in other repositories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub uri: String,
    pub range: Range,
}

impl Location {
    pub fn new(uri: impl Into<String>, range: Range) -> Self {
        Self { uri: uri.into(), range }
    }
}

/// Hover contents in whichever LSP shape the indexer recorded them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hover {
    pub contents: serde_json::Value,
}

/// One page of a reference listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferencesPage {
    pub locations: Vec<Location>,
    /// Token for the next page of remote references, if there is one
    pub next_page: Option<PageToken>,
}

/// Shared collaborators handed to every `Database`.
#[derive(Clone)]
pub struct EngineContext {
    pub xrepo: Arc<dyn XrepoIndex>,
    pub pool: Arc<ConnectionPool>,
    pub documents: Arc<DocumentStore>,
    pub layout: StorageLayout,
    pub metrics: Arc<dyn MetricsRecorder>,
}

impl EngineContext {
    /// Build a context with fresh connection and document caches.
    pub fn new(
        xrepo: Arc<dyn XrepoIndex>,
        layout: StorageLayout,
        connection_capacity: usize,
        document_capacity: usize,
        metrics: Arc<dyn MetricsRecorder>,
    ) -> Self {
        let pool = Arc::new(ConnectionPool::new(connection_capacity, metrics.clone()));
        let documents = Arc::new(DocumentStore::new(document_capacity, pool.clone(), metrics.clone()));
        Self {
            xrepo,
            pool,
            documents,
            layout,
            metrics,
        }
    }
}

/// Query engine bound to a single storage file.
#[derive(Clone)]
pub struct Database {
    ctx: EngineContext,
    storage_file: PathBuf,
}

impl Database {
    pub fn new(ctx: EngineContext, storage_file: impl Into<PathBuf>) -> Self {
        Self {
            ctx,
            storage_file: storage_file.into(),
        }
    }

    /// Open the storage file of `repository` at `commit` as laid out by the
    /// context.
    pub fn for_repository(ctx: EngineContext, repository: &str, commit: &str) -> Self {
        let storage_file = ctx.layout.storage_file(repository, commit);
        Self::new(ctx, storage_file)
    }

    pub fn storage_file(&self) -> &Path {
        &self.storage_file
    }

    /// Whether the storage file holds a document for `path`.
    pub async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.find_document(path).await?.is_some())
    }

    /// Locations defining the symbol at `position` in `path`.
    ///
    /// A definition result recorded with the range wins. Otherwise each
    /// moniker is tried in resolution order: imports are looked up in the
    /// repository declaring their package, everything else in this storage
    /// file. The first moniker with results wins.
    pub async fn definitions(&self, path: &str, position: Position) -> Result<Vec<Location>> {
        let Some((document, index)) = self.find_range(path, position).await? else {
            return Ok(Vec::new());
        };
        let node = GraphNode::Range(&document.ordered_ranges[index]);

        let definition = find_result(
            &document.result_sets,
            &document.definition_results,
            node,
            ResultProperty::Definition,
            self.ctx.metrics.as_ref(),
        );
        if let Some(refs) = definition {
            return self.get_locations(path, &document, refs).await;
        }

        for moniker in find_monikers(&document, node, self.ctx.metrics.as_ref()) {
            let locations = if moniker.kind == MonikerKind::Import {
                self.remote_definitions(&document, &moniker).await?
            } else {
                self.moniker_results(MonikerTable::Definitions, &moniker, None).await?
            };

            if !locations.is_empty() {
                return Ok(locations);
            }
        }

        Ok(Vec::new())
    }

    /// Locations referencing the symbol at `position` in `path`.
    ///
    /// Local results (the recorded reference result plus the references
    /// table matches of every moniker) are included on every page. Remote
    /// references come from the first non-local moniker that has any, one
    /// page of referencing repositories at a time.
    pub async fn references(&self, path: &str, position: Position, page: Option<PageToken>) -> Result<ReferencesPage> {
        let Some((document, index)) = self.find_range(path, position).await? else {
            return Ok(ReferencesPage::default());
        };
        let node = GraphNode::Range(&document.ordered_ranges[index]);

        let mut locations = Vec::new();

        let reference = find_result(
            &document.result_sets,
            &document.reference_results,
            node,
            ResultProperty::Reference,
            self.ctx.metrics.as_ref(),
        );
        if let Some(refs) = reference {
            locations.extend(self.get_locations(path, &document, refs).await?);
        }

        let monikers = find_monikers(&document, node, self.ctx.metrics.as_ref());
        for moniker in &monikers {
            locations.extend(self.moniker_results(MonikerTable::References, moniker, None).await?);
        }

        for moniker in monikers.iter().filter(|m| m.kind != MonikerKind::Local) {
            let (remote, next_page) = self.remote_references(&document, moniker, page).await?;
            if !remote.is_empty() {
                locations.extend(remote);
                return Ok(ReferencesPage { locations, next_page });
            }
        }

        Ok(ReferencesPage {
            locations,
            next_page: None,
        })
    }

    /// Hover text for the symbol at `position` in `path`.
    pub async fn hover(&self, path: &str, position: Position) -> Result<Option<Hover>> {
        let Some((document, index)) = self.find_range(path, position).await? else {
            return Ok(None);
        };

        let contents = find_result(
            &document.result_sets,
            &document.hovers,
            GraphNode::Range(&document.ordered_ranges[index]),
            ResultProperty::Hover,
            self.ctx.metrics.as_ref(),
        );

        Ok(contents.map(|contents| Hover {
            contents: contents.clone(),
        }))
    }

    // ========== Helpers ==========

    async fn find_document(&self, path: &str) -> Result<Option<Arc<Document>>> {
        self.ctx.documents.get_document(&self.storage_file, path).await
    }

    /// The document for `path` and the index of the range enclosing
    /// `position`.
    async fn find_range(&self, path: &str, position: Position) -> Result<Option<(Arc<Document>, usize)>> {
        let Some(document) = self.find_document(path).await? else {
            return Ok(None);
        };

        Ok(find_range_index(&document.ordered_ranges, position).map(|index| (document, index)))
    }

    /// Search this storage file's moniker table for (scheme, identifier).
    ///
    /// Paths are reported relative to this repository, or as remote URIs
    /// when `remote` names the repository this storage file belongs to.
    async fn moniker_results(
        &self,
        table: MonikerTable,
        moniker: &MonikerData,
        remote: Option<&PackageLocation>,
    ) -> Result<Vec<Location>> {
        let scheme = moniker.scheme.clone();
        let identifier = moniker.identifier.clone();

        let rows = metrics::instrument(
            self.ctx.metrics.as_ref(),
            QueryTarget::Database,
            self.ctx.pool.with_connection(&self.storage_file, move |conn| {
                sqlite::find_moniker_locations(conn, table, &scheme, &identifier)
            }),
        )
        .await?;

        rows.into_iter()
            .map(|row| {
                let uri = match remote {
                    Some(location) => {
                        RemoteUri::new(&location.repository, &location.commit, row.document_path).to_uri_string()?
                    }
                    None => row.document_path,
                };
                Ok(Location::new(uri, row.range))
            })
            .collect()
    }

    /// Resolve definition or reference entries to locations, grouped by
    /// document in order of first appearance.
    async fn get_locations(&self, path: &str, document: &Document, refs: &[DocumentRangeRef]) -> Result<Vec<Location>> {
        let mut groups: IndexMap<&str, Vec<&Id>> = IndexMap::new();
        for entry in refs {
            groups.entry(entry.document_path.as_str()).or_default().push(&entry.id);
        }

        let mut locations = Vec::new();
        for (document_path, ids) in groups {
            if document_path == path {
                locations.extend(self.as_locations(document, document_path, &ids));
                continue;
            }

            match self.find_document(document_path).await? {
                Some(sibling) => locations.extend(self.as_locations(&sibling, document_path, &ids)),
                None => tracing::debug!(path = document_path, "skipping missing document"),
            }
        }

        Ok(locations)
    }

    fn as_locations(&self, document: &Document, document_path: &str, ids: &[&Id]) -> Vec<Location> {
        ids.iter()
            .filter_map(|&id| match document.range(id) {
                Some(range) => Some(Location::new(document_path, range.bounds())),
                None => {
                    metrics::report_fault(
                        self.ctx.metrics.as_ref(),
                        IntegrityFault::UnknownRange {
                            document_path: document_path.to_string(),
                            id: id.clone(),
                        },
                    );
                    None
                }
            })
            .collect()
    }

    /// Look up an imported symbol's definition in the repository that
    /// declares its package.
    async fn remote_definitions(&self, document: &Document, moniker: &MonikerData) -> Result<Vec<Location>> {
        let Some(package) = document.package_information_for(moniker) else {
            return Ok(Vec::new());
        };

        let Some(location) = self
            .ctx
            .xrepo
            .get_package(&moniker.scheme, &package.name, &package.version)
            .await?
        else {
            return Ok(Vec::new());
        };

        tracing::debug!(
            repository = %location.repository,
            commit = %location.commit,
            identifier = %moniker.identifier,
            "resolving remote definition"
        );

        let remote = Database::for_repository(self.ctx.clone(), &location.repository, &location.commit);
        remote
            .moniker_results(MonikerTable::Definitions, moniker, Some(&location))
            .await
    }

    /// Collect references to the symbol from one page of the repositories
    /// that depend on its package.
    async fn remote_references(
        &self,
        document: &Document,
        moniker: &MonikerData,
        page: Option<PageToken>,
    ) -> Result<(Vec<Location>, Option<PageToken>)> {
        let Some(package) = document.package_information_for(moniker) else {
            return Ok((Vec::new(), None));
        };

        let listing = self
            .ctx
            .xrepo
            .get_references(&moniker.scheme, &package.name, &package.version, &moniker.identifier, page)
            .await?;

        tracing::debug!(
            repositories = listing.references.len(),
            identifier = %moniker.identifier,
            "resolving remote references"
        );

        let searches = listing.references.iter().map(|location| {
            let remote = Database::for_repository(self.ctx.clone(), &location.repository, &location.commit);
            async move {
                remote
                    .moniker_results(MonikerTable::References, moniker, Some(location))
                    .await
            }
        });

        let locations = try_join_all(searches).await?.into_iter().flatten().collect();
        Ok((locations, listing.next_page))
    }
}
