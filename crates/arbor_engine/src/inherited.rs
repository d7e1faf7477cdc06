//! Top-down evaluation.
//!
//! An inherited value is cached together with the identity key of the parent
//! it was computed under. Parents come from, in order of preference, the
//! definition's own parent function, the adapter's `parent`, or a depth-first
//! search from the root that records the ancestor path on the way down. In
//! search mode the index's recorded parent validates cache hits without a
//! search.

use std::collections::HashMap;

use arbor_common::{NodeIdentity, NodeKey};
use arbor_tree::{TreeAdapter, TreeError};

use crate::attr::AttrCore;
use crate::cache::Fingerprint;
use crate::context::{InhContext, ParentInfo};
use crate::definition::InheritedFn;
use crate::error::{AttrError, AttrResult};

impl<A: TreeAdapter, R: Clone + 'static> AttrCore<A, R> {
    /// Returns `true` if parents have to be found by searching from the root.
    pub(crate) fn searches_for_parents(&self) -> bool {
        self.parent_fn.is_none() && !self.tree.adapter().supports_parent()
    }

    /// Identity of `node`'s parent, found the same way [`inherit`](Self::inherit)
    /// finds it. In search mode this is the parent recorded by the last walk.
    pub(crate) fn parent_key(&self, node: &A::Node) -> Option<NodeKey> {
        if let Some(parent_fn) = &self.parent_fn {
            return parent_fn(node).map(|parent| parent.node_key());
        }
        if self.tree.adapter().supports_parent() {
            return self.tree.adapter().parent(node).map(|parent| parent.node_key());
        }
        self.tree.recorded_parent(node.node_key()).flatten()
    }

    pub(crate) fn inherit(&self, f: &InheritedFn<A, R>, node: &A::Node) -> AttrResult<R> {
        if let Some(parent_fn) = &self.parent_fn {
            return self.inherit_under(f, node, parent_fn(node));
        }
        if self.tree.adapter().supports_parent() {
            return self.inherit_under(f, node, self.tree.adapter().parent(node));
        }
        self.inherit_by_search(f, node)
    }

    /// Evaluates `node` given a directly known parent.
    fn inherit_under(
        &self,
        f: &InheritedFn<A, R>,
        node: &A::Node,
        parent: Option<A::Node>,
    ) -> AttrResult<R> {
        let key = node.node_key();
        let fingerprint = Fingerprint::Parent(parent.as_ref().map(NodeIdentity::node_key));
        if let Some(value) = self.cached(key, &fingerprint) {
            return Ok(self.produced(key, value));
        }
        let value = self.invoke(key, &|| {
            let parent_info = parent.as_ref().map(|p| {
                let target = p.clone();
                ParentInfo::new(p.clone(), move || self.get(&target))
            });
            f(&InhContext::new(node, parent_info))
        })?;
        self.store(node, fingerprint, value.clone());
        Ok(self.produced(key, value))
    }

    fn inherit_by_search(&self, f: &InheritedFn<A, R>, node: &A::Node) -> AttrResult<R> {
        let key = node.node_key();
        if let Some(parent) = self.tree.recorded_parent(key) {
            if let Some(value) = self.cached(key, &Fingerprint::Parent(parent)) {
                return Ok(self.produced(key, value));
            }
        }
        let mut path = Vec::new();
        let mut seen = HashMap::new();
        self.search(f, self.tree.root(), None, key, &mut path, &mut seen)?
            .ok_or(AttrError::NodeNotFound { node: key })
    }

    /// Depth-first search for `target` below `current`, keeping `path` equal
    /// to the ancestors of `current`.
    fn search(
        &self,
        f: &InheritedFn<A, R>,
        current: A::Node,
        parent: Option<NodeKey>,
        target: NodeKey,
        path: &mut Vec<A::Node>,
        seen: &mut HashMap<NodeKey, Option<NodeKey>>,
    ) -> AttrResult<Option<R>> {
        let key = current.node_key();
        if let Some(&first_parent) = seen.get(&key) {
            return Err(TreeError::DuplicateNode {
                node: key,
                first_parent,
                second_parent: parent,
            }
            .into());
        }
        seen.insert(key, parent);
        if key == target {
            return self.evaluate_on_path(f, &current, path).map(Some);
        }
        let children = self.tree.adapter().children(&current);
        path.push(current);
        for child in children.into_values() {
            if let Some(value) = self.search(f, child, Some(key), target, path, seen)? {
                return Ok(Some(value));
            }
        }
        path.pop();
        Ok(None)
    }

    /// Evaluates `node` whose ancestors, root first, are `ancestors`.
    pub(crate) fn evaluate_on_path(
        &self,
        f: &InheritedFn<A, R>,
        node: &A::Node,
        ancestors: &[A::Node],
    ) -> AttrResult<R> {
        let key = node.node_key();
        let (parent, above) = match ancestors.split_last() {
            Some((parent, above)) => (Some(parent), above),
            None => (None, ancestors),
        };
        let fingerprint = Fingerprint::Parent(parent.map(NodeIdentity::node_key));
        if let Some(value) = self.cached(key, &fingerprint) {
            return Ok(self.produced(key, value));
        }
        let value = self.invoke(key, &|| {
            let parent_info = parent
                .map(|p| ParentInfo::new(p.clone(), move || self.evaluate_on_path(f, p, above)));
            f(&InhContext::new(node, parent_info))
        })?;
        self.store(node, fingerprint, value.clone());
        Ok(self.produced(key, value))
    }

    /// Evaluates every node in one preorder walk from the root, so that each
    /// parent value is cached before its children ask for it.
    pub(crate) fn prime_by_walk(&self, f: &InheritedFn<A, R>) -> AttrResult<()> {
        let mut path: Vec<A::Node> = Vec::new();
        let mut seen: HashMap<NodeKey, Option<NodeKey>> = HashMap::new();
        let mut stack = vec![(self.tree.root(), None, 0usize)];
        while let Some((node, parent, depth)) = stack.pop() {
            let key = node.node_key();
            if let Some(&first_parent) = seen.get(&key) {
                return Err(TreeError::DuplicateNode {
                    node: key,
                    first_parent,
                    second_parent: parent,
                }
                .into());
            }
            seen.insert(key, parent);
            path.truncate(depth);
            self.evaluate_on_path(f, &node, &path)?;
            let children = self.tree.adapter().children(&node).into_values();
            path.push(node);
            for child in children.into_iter().rev() {
                stack.push((child, Some(key), depth + 1));
            }
        }
        Ok(())
    }
}
