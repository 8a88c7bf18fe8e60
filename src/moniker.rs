//! Moniker resolution order
//!
//! Monikers are collected from every node of a range's chain and ordered so
//! that imported symbols are tried first: an import names the package that
//! declares the symbol, which is the cheapest route to a remote definition.
//!
//! Preference order:
//! - kind: import, local, export (anything else last)
//! - scheme: npm, tsc (anything else last)

use crate::document::{Document, MonikerData, MonikerKind};
use crate::graph::{GraphNode, Resolvable, walk_chain};
use crate::metrics::{IntegrityFault, MetricsRecorder, report_fault};

const KIND_PREFERENCES: &[MonikerKind] = &[MonikerKind::Import, MonikerKind::Local, MonikerKind::Export];
const SCHEME_PREFERENCES: &[&str] = &["npm", "tsc"];

fn kind_rank(kind: MonikerKind) -> usize {
    KIND_PREFERENCES
        .iter()
        .position(|k| *k == kind)
        .unwrap_or(KIND_PREFERENCES.len())
}

fn scheme_rank(scheme: &str) -> usize {
    SCHEME_PREFERENCES
        .iter()
        .position(|s| *s == scheme)
        .unwrap_or(SCHEME_PREFERENCES.len())
}

/// Sort monikers by kind, then by scheme. The sort is stable.
pub fn sort_monikers(monikers: &mut [MonikerData]) {
    monikers.sort_by_key(|m| (kind_rank(m.kind), scheme_rank(&m.scheme)));
}

/// Collect the monikers attached to `start` or any result set on its chain,
/// in resolution order.
///
/// Ids with no moniker behind them are skipped and reported. Duplicates reached through
/// different nodes are kept. A chain containing a cycle yields no monikers.
pub fn find_monikers(document: &Document, start: GraphNode<'_>, recorder: &dyn MetricsRecorder) -> Vec<MonikerData> {
    let mut monikers = Vec::new();
    let mut chain = walk_chain(&document.result_sets, start);

    for node in chain.by_ref() {
        for id in node.monikers() {
            match document.monikers.get(id) {
                Some(moniker) => monikers.push(moniker.clone()),
                None => report_fault(recorder, IntegrityFault::DanglingMoniker { id: id.clone() }),
            }
        }
    }

    if let Some(id) = chain.detected_cycle() {
        report_fault(recorder, IntegrityFault::Cycle { result_set: id.clone() });
        return Vec::new();
    }

    sort_monikers(&mut monikers);
    monikers
}
