//! The tree state shared by a registry and every attribute reified in it.

use std::cell::{Ref, RefCell};

use arbor_common::{NodeIdentity, NodeKey};
use arbor_tree::{Reindex, TreeAdapter, TreeError, TreeIndex};

use crate::events::{Event, EventBus};

/// A host tree seen through its adapter, plus the engine's index of it.
///
/// The index is a snapshot taken at construction and refreshed only by
/// [`Registry::set_root`](crate::Registry::set_root) and
/// [`Registry::update`](crate::Registry::update).
pub struct Tree<A: TreeAdapter> {
    adapter: A,
    root: RefCell<A::Node>,
    index: RefCell<TreeIndex<A::Node>>,
    events: EventBus,
}

impl<A: TreeAdapter> Tree<A> {
    /// Walks the tree under `root` and indexes it.
    pub fn new(adapter: A, root: A::Node) -> Result<Self, TreeError> {
        let index = TreeIndex::build(&adapter, root.clone())?;
        Ok(Self {
            adapter,
            root: RefCell::new(root),
            index: RefCell::new(index),
            events: EventBus::new(),
        })
    }

    /// The adapter.
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// The current root node.
    pub fn root(&self) -> A::Node {
        self.root.borrow().clone()
    }

    /// Borrows the index snapshot.
    pub fn index(&self) -> Ref<'_, TreeIndex<A::Node>> {
        self.index.borrow()
    }

    /// Returns `true` if `key` was reachable from the root at the last walk.
    pub fn contains(&self, key: NodeKey) -> bool {
        self.index.borrow().contains(key)
    }

    /// The parent of `key` recorded at the last walk.
    pub fn recorded_parent(&self, key: NodeKey) -> Option<Option<NodeKey>> {
        self.index.borrow().parent_of(key)
    }

    /// The event bus attributes on this tree report to.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub(crate) fn emit(&self, event: Event) {
        self.events.emit(&event);
    }

    /// Replaces the root and re-walks the whole tree.
    ///
    /// On error neither the root nor the index changes.
    pub(crate) fn replace_root(&self, root: A::Node) -> Result<Reindex, TreeError> {
        let reindex = self.index.borrow_mut().rebuild(&self.adapter, root.clone())?;
        tracing::debug!(root = %root.node_key(), "root replaced");
        *self.root.borrow_mut() = root;
        Ok(reindex)
    }

    /// Re-walks the subtree under `key` after an in-place mutation.
    pub(crate) fn reindex(&self, key: NodeKey) -> Result<Reindex, TreeError> {
        self.index
            .borrow_mut()
            .reindex_subtree(&self.adapter, key)
    }
}
