//! The trace facet.
//!
//! Every [`TraceFacet`] owns one node in a thread-local generational arena.
//! A node stores the most recent suspension point of its frame and the key
//! of the awaiting frame's node, so the nodes of a nested await chain form a
//! backward-linked list from the innermost frame to the root.
//!
//! Keys are generation-checked: once a frame (and its facet) is destroyed,
//! a captured key resolves to nothing and a walk stops there.

use core::cell::RefCell;
use core::fmt;
use core::marker::PhantomData;
use core::panic::Location;
use std::rc::Rc;

use smallvec::SmallVec;

use super::{Environment, Inherit, Query, Queryable, Request, query_dyn};
use crate::trace::TraceEntry;
use crate::util::{Arena, ArenaIndex};

struct TraceNode {
    prev: Option<TraceLink>,
    point: Option<TraceEntry>,
}

thread_local! {
    static NODES: RefCell<Arena<TraceNode>> = const { RefCell::new(Arena::new()) };
}

/// Key of a trace node on the current thread.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceLink(ArenaIndex);

impl fmt::Debug for TraceLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TraceLink({}:{})", self.0.index(), self.0.generation())
    }
}

/// Query tag answered by environments that carry a trace facet.
#[derive(Debug, Clone, Copy)]
pub struct InplaceTrace;

impl Query for InplaceTrace {
    type Output = TraceLink;
}

/// Facet linking a frame's suspension points into the trace chain.
///
/// The facet is `!Send`: its node lives on the thread that created it.
#[derive(Debug)]
pub struct TraceFacet {
    link: TraceLink,
    _local: PhantomData<Rc<()>>,
}

impl TraceFacet {
    fn allocate(prev: Option<TraceLink>) -> Self {
        let index = NODES.with(|nodes| nodes.borrow_mut().insert(TraceNode { prev, point: None }));
        Self {
            link: TraceLink(index),
            _local: PhantomData,
        }
    }

    /// Returns the key of this facet's node.
    #[must_use]
    pub const fn link(&self) -> TraceLink {
        self.link
    }

    /// Returns the key of the awaiting frame's node, if this facet inherited one.
    #[must_use]
    pub fn parent(&self) -> Option<TraceLink> {
        NODES.with(|nodes| nodes.borrow().get(self.link.0).and_then(|node| node.prev))
    }
}

impl Default for TraceFacet {
    fn default() -> Self {
        Self::allocate(None)
    }
}

impl Inherit for TraceFacet {
    fn inherit(source: &dyn Environment) -> Self {
        Self::allocate(query_dyn::<InplaceTrace>(source))
    }
}

impl Queryable<InplaceTrace> for TraceFacet {
    fn query(&self, _: InplaceTrace) -> TraceLink {
        self.link
    }
}

impl Environment for TraceFacet {
    fn provide(&self, request: &mut Request<'_>) {
        request.provide::<InplaceTrace>(|| self.link);
    }
}

impl Drop for TraceFacet {
    fn drop(&mut self) {
        let _ = NODES.try_with(|nodes| nodes.borrow_mut().remove(self.link.0));
    }
}

/// Stores the latest suspension point of the node at `link`.
///
/// Stale links are ignored.
pub(crate) fn record(link: TraceLink, function: &'static str, location: &'static Location<'static>) {
    NODES.with(|nodes| {
        if let Some(node) = nodes.borrow_mut().get_mut(link.0) {
            node.point = Some(TraceEntry::new(function, location));
        }
    });
}

/// Collects recorded points from `link` back to the root, innermost first.
pub(crate) fn walk(link: TraceLink) -> SmallVec<[TraceEntry; 8]> {
    NODES.with(|nodes| {
        let nodes = nodes.borrow();
        let mut entries = SmallVec::new();
        let mut cursor = Some(link);
        while let Some(key) = cursor {
            let Some(node) = nodes.get(key.0) else {
                break;
            };
            if let Some(point) = node.point {
                entries.push(point);
            }
            cursor = node.prev;
        }
        entries
    })
}

/// Reserves room for `additional` nodes on the current thread.
pub(crate) fn reserve(additional: usize) {
    NODES.with(|nodes| nodes.borrow_mut().reserve(additional));
}

/// Returns the number of live trace nodes on the current thread.
#[must_use]
pub fn live_nodes() -> usize {
    NODES.with(|nodes| nodes.borrow().len())
}
