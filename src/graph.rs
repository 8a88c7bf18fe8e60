//! Symbol graph walker
//!
//! Ranges and result sets form chains through their `next` links. A
//! property such as a definition result may be set on the range itself or on
//! any result set further down its chain; walking the chain finds it.

use std::collections::{HashMap, HashSet};
use crate::document::{Id, RangeData, ResultSetData};
use crate::metrics::{IntegrityFault, MetricsRecorder, report_fault};

/// The resolvable properties shared by ranges and result sets.
pub trait Resolvable {
    fn next(&self) -> Option<&Id>;
    fn definition_result(&self) -> Option<&Id>;
    fn reference_result(&self) -> Option<&Id>;
    fn hover_result(&self) -> Option<&Id>;
    fn monikers(&self) -> &[Id];
}

macro_rules! impl_resolvable {
    ($ty:ty) => {
        impl Resolvable for $ty {
            fn next(&self) -> Option<&Id> {
                self.next.as_ref()
            }

            fn definition_result(&self) -> Option<&Id> {
                self.definition_result.as_ref()
            }

            fn reference_result(&self) -> Option<&Id> {
                self.reference_result.as_ref()
            }

            fn hover_result(&self) -> Option<&Id> {
                self.hover_result.as_ref()
            }

            fn monikers(&self) -> &[Id] {
                &self.monikers
            }
        }
    };
}

impl_resolvable!(RangeData);
impl_resolvable!(ResultSetData);

/// A node of the chain: either the starting range or a result set.
#[derive(Debug, Clone, Copy)]
pub enum GraphNode<'a> {
    Range(&'a RangeData),
    ResultSet(&'a ResultSetData),
}

impl GraphNode<'_> {
    fn inner(&self) -> &dyn Resolvable {
        match self {
            GraphNode::Range(range) => *range,
            GraphNode::ResultSet(result_set) => *result_set,
        }
    }
}

impl Resolvable for GraphNode<'_> {
    fn next(&self) -> Option<&Id> {
        self.inner().next()
    }

    fn definition_result(&self) -> Option<&Id> {
        self.inner().definition_result()
    }

    fn reference_result(&self) -> Option<&Id> {
        self.inner().reference_result()
    }

    fn hover_result(&self) -> Option<&Id> {
        self.inner().hover_result()
    }

    fn monikers(&self) -> &[Id] {
        self.inner().monikers()
    }
}

/// The result link a lookup is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultProperty {
    Definition,
    Reference,
    Hover,
}

impl ResultProperty {
    pub fn of<'n, R: Resolvable + ?Sized>(&self, node: &'n R) -> Option<&'n Id> {
        match self {
            ResultProperty::Definition => node.definition_result(),
            ResultProperty::Reference => node.reference_result(),
            ResultProperty::Hover => node.hover_result(),
        }
    }
}

/// Lazy iterator over a node and the result sets reachable from it.
pub struct Chain<'a> {
    result_sets: &'a HashMap<Id, ResultSetData>,
    current: Option<GraphNode<'a>>,
    visited: HashSet<&'a Id>,
    cycle: Option<Id>,
}

impl<'a> Chain<'a> {
    /// The result set at which the walk detected a cycle, if it did.
    pub fn detected_cycle(&self) -> Option<&Id> {
        self.cycle.as_ref()
    }
}

impl<'a> Iterator for Chain<'a> {
    type Item = GraphNode<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.current.take()?;

        let link = match node {
            GraphNode::Range(range) => range.next.as_ref(),
            GraphNode::ResultSet(result_set) => result_set.next.as_ref(),
        };

        if let Some(id) = link {
            if !self.visited.insert(id) {
                self.cycle = Some(id.clone());
            } else if let Some(result_set) = self.result_sets.get(id) {
                self.current = Some(GraphNode::ResultSet(result_set));
            }
        }

        Some(node)
    }
}

/// Walk the chain starting at `start`, yielding `start` first.
pub fn walk_chain<'a>(result_sets: &'a HashMap<Id, ResultSetData>, start: GraphNode<'a>) -> Chain<'a> {
    Chain {
        result_sets,
        current: Some(start),
        visited: HashSet::new(),
        cycle: None,
    }
}

/// Return the value of the first `property` link set along the chain.
///
/// The first node carrying the link decides the outcome; a link whose target
/// is missing from `map` yields `None` and is reported as a fault.
pub fn find_result<'a, T>(
    result_sets: &'a HashMap<Id, ResultSetData>,
    map: &'a HashMap<Id, T>,
    start: GraphNode<'a>,
    property: ResultProperty,
    recorder: &dyn MetricsRecorder,
) -> Option<&'a T> {
    let mut chain = walk_chain(result_sets, start);

    for node in chain.by_ref() {
        if let Some(id) = property.of(&node) {
            let value = map.get(id);
            if value.is_none() {
                report_fault(recorder, IntegrityFault::DanglingResult { id: id.clone() });
            }
            return value;
        }
    }

    if let Some(id) = chain.detected_cycle() {
        report_fault(recorder, IntegrityFault::Cycle { result_set: id.clone() });
    }

    None
}
