//! Snapshot index of a host tree.
//!
//! [`TreeIndex`] records every node reachable from the root together with its
//! parent and children, keyed by node identity. It is rebuilt when the root is
//! swapped and partially rewalked when a subtree is announced as edited. Each
//! (re)walk reports a [`Reindex`] describing which nodes disappeared and which
//! retained nodes now sit under a different ancestor chain.

use std::collections::{HashMap, HashSet};

use arbor_common::{define_id, Arena, NodeIdentity, NodeKey};

use crate::adapter::TreeAdapter;
use crate::error::TreeError;

define_id!(
    /// Opaque, copyable ID for a node slot in a [`TreeIndex`].
    NodeId
);

/// A node as recorded by the last walk.
#[derive(Debug, Clone)]
pub struct IndexedNode<N> {
    /// The host node handle.
    pub node: N,
    /// Identity key of `node`.
    pub key: NodeKey,
    /// Parent slot, `None` for the root.
    pub parent: Option<NodeId>,
    /// Child slots in child order.
    pub children: Vec<NodeId>,
}

/// Outcome of a (re)walk, used to drive cache invalidation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reindex {
    /// Nodes that are no longer reachable.
    pub dropped: Vec<NodeKey>,
    /// Retained nodes whose parent, or some ancestor's parent, changed.
    pub moved: Vec<NodeKey>,
    /// Number of nodes seen for the first time.
    pub added: usize,
}

impl Reindex {
    /// Returns `true` if the walk found the tree shape unchanged.
    pub fn is_unchanged(&self) -> bool {
        self.dropped.is_empty() && self.moved.is_empty() && self.added == 0
    }
}

/// Identity-keyed snapshot of a host tree.
#[derive(Debug, Clone)]
pub struct TreeIndex<N> {
    nodes: Arena<NodeId, IndexedNode<N>>,
    by_key: HashMap<NodeKey, NodeId>,
    root: Option<NodeId>,
}

impl<N: NodeIdentity + Clone> TreeIndex<N> {
    fn empty() -> Self {
        Self {
            nodes: Arena::new(),
            by_key: HashMap::new(),
            root: None,
        }
    }

    /// Walks the tree below `root` and indexes every node.
    ///
    /// Fails with [`TreeError::DuplicateNode`] if any node is reachable twice.
    pub fn build<A>(adapter: &A, root: N) -> Result<Self, TreeError>
    where
        A: TreeAdapter<Node = N>,
    {
        let mut index = Self::empty();
        let root_id = index.walk(adapter, root, None)?;
        index.root = Some(root_id);
        Ok(index)
    }

    /// Replaces the snapshot with a fresh walk from `root`.
    ///
    /// On error the current snapshot is left untouched.
    pub fn rebuild<A>(&mut self, adapter: &A, root: N) -> Result<Reindex, TreeError>
    where
        A: TreeAdapter<Node = N>,
    {
        let fresh = Self::build(adapter, root)?;
        let mut reindex = Reindex::default();
        if let Some(root_id) = fresh.root {
            classify(self, &fresh, root_id, None, &mut reindex);
        }
        reindex.dropped = self
            .by_key
            .keys()
            .filter(|key| !fresh.by_key.contains_key(key))
            .copied()
            .collect();
        reindex.dropped.sort_unstable();
        tracing::debug!(
            nodes = fresh.len(),
            dropped = reindex.dropped.len(),
            moved = reindex.moved.len(),
            added = reindex.added,
            "rebuilt tree index"
        );
        *self = fresh;
        Ok(reindex)
    }

    /// Rewalks the subtree rooted at `key`, leaving the rest of the index alone.
    ///
    /// Nodes newly reachable below `key` must not already be indexed elsewhere;
    /// moving a node between subtrees has to be announced at a common ancestor.
    /// On error the current snapshot is left untouched.
    pub fn reindex_subtree<A>(&mut self, adapter: &A, key: NodeKey) -> Result<Reindex, TreeError>
    where
        A: TreeAdapter<Node = N>,
    {
        let id = *self.by_key.get(&key).ok_or(TreeError::NotIndexed(key))?;
        let (node, parent) = match self.nodes.get(id) {
            Some(entry) => (entry.node.clone(), entry.parent),
            None => return Err(TreeError::NotIndexed(key)),
        };
        let parent_key = parent.and_then(|p| self.key_of(p));

        let old_ids = self.subtree_ids(id);
        let old_keys: HashSet<NodeKey> = old_ids.iter().filter_map(|&i| self.key_of(i)).collect();

        let mut scratch = Self::empty();
        let scratch_root = scratch.walk(adapter, node, None)?;
        scratch.root = Some(scratch_root);
        for (_, entry) in scratch.nodes.iter() {
            if old_keys.contains(&entry.key) {
                continue;
            }
            if let Some(&elsewhere) = self.by_key.get(&entry.key) {
                return Err(TreeError::DuplicateNode {
                    node: entry.key,
                    first_parent: self.parent_key_of(elsewhere),
                    second_parent: entry.parent.and_then(|p| scratch.key_of(p)),
                });
            }
        }
        if self.nodes.headroom() < scratch.len() {
            return Err(TreeError::SlotsExhausted);
        }

        let mut reindex = Reindex::default();
        classify(self, &scratch, scratch_root, parent_key, &mut reindex);
        reindex.dropped = old_ids
            .iter()
            .filter_map(|&i| self.key_of(i))
            .filter(|k| !scratch.by_key.contains_key(k))
            .collect();

        // The walk is validated and its slots fit, so the splice below cannot fail.
        for old in old_ids {
            if let Some(entry) = self.nodes.remove(old) {
                self.by_key.remove(&entry.key);
            }
        }
        let order: Vec<NodeId> = scratch.nodes.iter().map(|(sid, _)| sid).collect();
        let remap = self.transplant(&scratch.nodes, &order, parent)?;
        let new_root = remap
            .get(&scratch_root)
            .copied()
            .ok_or(TreeError::NotIndexed(key))?;
        match parent.and_then(|p| self.nodes.get_mut(p)) {
            Some(parent_entry) => {
                for child in parent_entry.children.iter_mut() {
                    if *child == id {
                        *child = new_root;
                    }
                }
            }
            None => self.root = Some(new_root),
        }

        if self.nodes.vacant() > self.nodes.len() {
            if let Err(err) = self.compact() {
                tracing::warn!(%err, "tree index left uncompacted");
            }
        }

        tracing::debug!(
            %key,
            dropped = reindex.dropped.len(),
            moved = reindex.moved.len(),
            added = reindex.added,
            "reindexed subtree"
        );
        Ok(reindex)
    }

    /// Returns `true` if `key` was reached by the last walk.
    pub fn contains(&self, key: NodeKey) -> bool {
        self.by_key.contains_key(&key)
    }

    /// Number of indexed nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Identity of the root node.
    pub fn root_key(&self) -> Option<NodeKey> {
        self.root.and_then(|id| self.key_of(id))
    }

    /// Returns the indexed record for `key`.
    pub fn entry(&self, key: NodeKey) -> Option<&IndexedNode<N>> {
        self.by_key.get(&key).and_then(|&id| self.nodes.get(id))
    }

    /// Returns the host handle for `key`.
    pub fn node(&self, key: NodeKey) -> Option<&N> {
        self.entry(key).map(|entry| &entry.node)
    }

    /// Parent recorded for `key`: `None` if `key` is not indexed,
    /// `Some(None)` for the root.
    pub fn parent_of(&self, key: NodeKey) -> Option<Option<NodeKey>> {
        let id = *self.by_key.get(&key)?;
        self.nodes.get(id)?;
        Some(self.parent_key_of(id))
    }

    /// Ancestors of `key`, nearest first, excluding `key` itself.
    pub fn ancestors(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        let mut current = self.by_key.get(&key).and_then(|&id| self.nodes.get(id));
        while let Some(parent) = current.and_then(|entry| entry.parent) {
            let Some(entry) = self.nodes.get(parent) else {
                break;
            };
            out.push(entry.key);
            current = Some(entry);
        }
        out
    }

    /// Descendants of `key` in preorder, excluding `key` itself.
    pub fn descendants(&self, key: NodeKey) -> Vec<NodeKey> {
        match self.by_key.get(&key) {
            Some(&id) => self
                .subtree_ids(id)
                .into_iter()
                .skip(1)
                .filter_map(|i| self.key_of(i))
                .collect(),
            None => Vec::new(),
        }
    }

    /// All node handles, parents before children, siblings in child order.
    pub fn preorder(&self) -> Vec<N> {
        match self.root {
            Some(root) => self
                .subtree_ids(root)
                .into_iter()
                .filter_map(|id| self.nodes.get(id).map(|entry| entry.node.clone()))
                .collect(),
            None => Vec::new(),
        }
    }

    /// All node handles, children before parents, siblings in child order.
    pub fn postorder(&self) -> Vec<N> {
        let Some(root) = self.root else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(self.len());
        let mut stack = vec![(root, false)];
        while let Some((id, expanded)) = stack.pop() {
            let Some(entry) = self.nodes.get(id) else {
                continue;
            };
            if expanded {
                out.push(entry.node.clone());
            } else {
                stack.push((id, true));
                stack.extend(entry.children.iter().rev().map(|&child| (child, false)));
            }
        }
        out
    }

    fn key_of(&self, id: NodeId) -> Option<NodeKey> {
        self.nodes.get(id).map(|entry| entry.key)
    }

    fn parent_key_of(&self, id: NodeId) -> Option<NodeKey> {
        self.nodes
            .get(id)
            .and_then(|entry| entry.parent)
            .and_then(|p| self.key_of(p))
    }

    fn subtree_ids(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(entry) = self.nodes.get(current) {
                out.push(current);
                stack.extend(entry.children.iter().rev().copied());
            }
        }
        out
    }

    fn insert(&mut self, node: N, parent: Option<NodeId>) -> Result<NodeId, TreeError> {
        let key = node.node_key();
        if let Some(&existing) = self.by_key.get(&key) {
            return Err(TreeError::DuplicateNode {
                node: key,
                first_parent: self.parent_key_of(existing),
                second_parent: parent.and_then(|p| self.key_of(p)),
            });
        }
        let id = self
            .nodes
            .alloc(IndexedNode {
                node,
                key,
                parent,
                children: Vec::new(),
            })
            .ok_or(TreeError::SlotsExhausted)?;
        self.by_key.insert(key, id);
        Ok(id)
    }

    /// Indexes `start` and everything below it. Slots are allocated parents
    /// before children, which [`transplant`](Self::transplant) relies on.
    fn walk<A>(&mut self, adapter: &A, start: N, parent: Option<NodeId>) -> Result<NodeId, TreeError>
    where
        A: TreeAdapter<Node = N>,
    {
        let start_id = self.insert(start, parent)?;
        let mut stack = vec![start_id];
        while let Some(id) = stack.pop() {
            let children = match self.nodes.get(id) {
                Some(entry) => adapter.children(&entry.node),
                None => continue,
            };
            let mut child_ids = Vec::with_capacity(children.len());
            for child in children.into_values() {
                child_ids.push(self.insert(child, Some(id))?);
            }
            stack.extend(child_ids.iter().rev().copied());
            if let Some(entry) = self.nodes.get_mut(id) {
                entry.children = child_ids;
            }
        }
        Ok(start_id)
    }

    /// Copies the slots of `source` listed in `order` into `self`. Every
    /// parent must precede its children in `order`; entries whose parent is
    /// not listed hang under `attach`. Returns the old-to-new slot mapping.
    fn transplant(
        &mut self,
        source: &Arena<NodeId, IndexedNode<N>>,
        order: &[NodeId],
        attach: Option<NodeId>,
    ) -> Result<HashMap<NodeId, NodeId>, TreeError> {
        let mut remap: HashMap<NodeId, NodeId> = HashMap::with_capacity(order.len());
        for &old in order {
            let Some(entry) = source.get(old) else {
                continue;
            };
            let parent = match entry.parent.and_then(|p| remap.get(&p)) {
                Some(&mapped) => Some(mapped),
                None => attach,
            };
            let new = self
                .nodes
                .alloc(IndexedNode {
                    node: entry.node.clone(),
                    key: entry.key,
                    parent,
                    children: Vec::new(),
                })
                .ok_or(TreeError::SlotsExhausted)?;
            self.by_key.insert(entry.key, new);
            remap.insert(old, new);
        }
        for (&old, &new) in &remap {
            let children: Vec<NodeId> = source
                .get(old)
                .map(|entry| entry.children.iter().filter_map(|c| remap.get(c).copied()).collect())
                .unwrap_or_default();
            if let Some(entry) = self.nodes.get_mut(new) {
                entry.children = children;
            }
        }
        Ok(remap)
    }

    /// Repacks the live slots into a fresh arena in preorder, dropping the
    /// slots retired by earlier reindexing.
    fn compact(&mut self) -> Result<(), TreeError> {
        let Some(root) = self.root else {
            return Ok(());
        };
        let order = self.subtree_ids(root);
        let mut packed = Self::empty();
        let remap = packed.transplant(&self.nodes, &order, None)?;
        packed.root = remap.get(&root).copied();
        *self = packed;
        Ok(())
    }
}

/// Walks `fresh` from `start`, comparing each node's parent against `old`.
fn classify<N: NodeIdentity + Clone>(
    old: &TreeIndex<N>,
    fresh: &TreeIndex<N>,
    start: NodeId,
    start_parent: Option<NodeKey>,
    reindex: &mut Reindex,
) {
    let mut stack = vec![(start, start_parent, false)];
    while let Some((id, parent_key, chain_changed)) = stack.pop() {
        let Some(entry) = fresh.nodes.get(id) else {
            continue;
        };
        let changed = match old.parent_of(entry.key) {
            None => {
                reindex.added += 1;
                true
            }
            Some(old_parent) => {
                let changed = chain_changed || old_parent != parent_key;
                if changed {
                    reindex.moved.push(entry.key);
                }
                changed
            }
        };
        for &child in entry.children.iter().rev() {
            stack.push((child, Some(entry.key), changed));
        }
    }
}
