//! What evaluators see: the node being evaluated and lazy handles to the
//! attribute values of its neighbours.
//!
//! Neighbour values are [`Lazy`]: nothing is computed until an evaluator
//! forces it, so an evaluator that ignores some children never pays for them.

use std::cell::OnceCell;
use std::fmt;

use arbor_common::NodeIdentity;
use arbor_tree::{ChildLabel, Children, TreeAdapter};
use indexmap::IndexMap;

use crate::error::{AttrError, AttrResult};

/// A value computed on first use and remembered afterwards.
pub struct Lazy<'a, R> {
    value: OnceCell<R>,
    thunk: Box<dyn Fn() -> AttrResult<R> + 'a>,
}

impl<'a, R: Clone> Lazy<'a, R> {
    /// Wraps a computation without running it.
    pub fn new(thunk: impl Fn() -> AttrResult<R> + 'a) -> Self {
        Self {
            value: OnceCell::new(),
            thunk: Box::new(thunk),
        }
    }

    /// Returns the value, computing it on the first call.
    ///
    /// A failed computation is not remembered; forcing again retries it.
    pub fn force(&self) -> AttrResult<R> {
        if let Some(value) = self.value.get() {
            return Ok(value.clone());
        }
        let value = (self.thunk)()?;
        Ok(self.value.get_or_init(|| value).clone())
    }

    /// Returns `true` once the value has been computed.
    pub fn is_forced(&self) -> bool {
        self.value.get().is_some()
    }
}

impl<R: fmt::Debug> fmt::Debug for Lazy<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value.get() {
            Some(value) => f.debug_tuple("Lazy").field(value).finish(),
            None => f.write_str("Lazy(<unforced>)"),
        }
    }
}

/// A direct child of the node being evaluated by a synthetic attribute.
pub struct ChildInfo<'a, A: TreeAdapter, R> {
    node: A::Node,
    label: ChildLabel,
    value: Lazy<'a, R>,
}

impl<'a, A: TreeAdapter, R: Clone> ChildInfo<'a, A, R> {
    fn new(
        node: A::Node,
        label: ChildLabel,
        recurse: &'a dyn Fn(&A::Node) -> AttrResult<R>,
    ) -> Self {
        let target = node.clone();
        Self {
            node,
            label,
            value: Lazy::new(move || recurse(&target)),
        }
    }

    /// The child node.
    pub fn node(&self) -> &A::Node {
        &self.node
    }

    /// The child's position or key within its parent.
    pub fn label(&self) -> &ChildLabel {
        &self.label
    }

    /// The child's key, for map-shaped children.
    pub fn key(&self) -> Option<&str> {
        self.label.key()
    }

    /// The attribute's value at this child, evaluated on first use.
    pub fn attr(&self) -> AttrResult<R> {
        self.value.force()
    }

    /// Returns `true` once the child's value has been requested.
    pub fn is_forced(&self) -> bool {
        self.value.is_forced()
    }
}

/// Evaluation context of a synthetic attribute at one node.
pub struct SynContext<'a, A: TreeAdapter, R> {
    node: &'a A::Node,
    attr_name: &'a str,
    keyed: bool,
    children: Vec<ChildInfo<'a, A, R>>,
}

impl<'a, A: TreeAdapter, R: Clone> SynContext<'a, A, R> {
    pub(crate) fn new(
        node: &'a A::Node,
        attr_name: &'a str,
        children: &Children<A::Node>,
        recurse: &'a dyn Fn(&A::Node) -> AttrResult<R>,
    ) -> Self {
        let keyed = matches!(children, Children::Map(_));
        let children = children
            .iter()
            .map(|(label, child)| ChildInfo::new(child.clone(), label, recurse))
            .collect();
        Self {
            node,
            attr_name,
            keyed,
            children,
        }
    }

    /// The node being evaluated.
    pub fn node(&self) -> &A::Node {
        self.node
    }

    /// The node's direct children in child order.
    pub fn children(&self) -> &[ChildInfo<'a, A, R>] {
        &self.children
    }

    /// Returns `true` if the node has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// The child at `index`.
    pub fn child(&self, index: usize) -> Option<&ChildInfo<'a, A, R>> {
        self.children.get(index)
    }

    /// The map-shaped child stored under `key`.
    pub fn child_by_key(&self, key: &str) -> Option<&ChildInfo<'a, A, R>> {
        self.children.iter().find(|child| child.key() == Some(key))
    }

    /// The attribute's value at `child`, which must be a direct child of the
    /// node being evaluated.
    pub fn attr(&self, child: &A::Node) -> AttrResult<R> {
        let key = child.node_key();
        match self.children.iter().find(|info| info.node.node_key() == key) {
            Some(info) => info.attr(),
            None => Err(AttrError::NoSuchChild {
                attr: self.attr_name.to_string(),
                node: self.node.node_key(),
                child: key,
            }),
        }
    }

    /// Forces every child's value, in child order.
    pub fn child_values(&self) -> AttrResult<Vec<R>> {
        self.children.iter().map(ChildInfo::attr).collect()
    }

    /// Maps every child, preserving the children's shape and keys.
    pub fn map_children<U>(
        &self,
        mut f: impl FnMut(&ChildInfo<'a, A, R>) -> AttrResult<U>,
    ) -> AttrResult<Children<U>> {
        if self.keyed {
            let mut out = IndexMap::with_capacity(self.children.len());
            for child in &self.children {
                let key = match child.label() {
                    ChildLabel::Key(key) => key.clone(),
                    ChildLabel::Index(index) => index.to_string(),
                };
                out.insert(key, f(child)?);
            }
            Ok(Children::Map(out))
        } else {
            let out = self.children.iter().map(f).collect::<AttrResult<Vec<_>>>()?;
            Ok(Children::List(out))
        }
    }
}

/// The parent of the node being evaluated by an inherited attribute.
pub struct ParentInfo<'a, A: TreeAdapter, R> {
    node: A::Node,
    value: Lazy<'a, R>,
}

impl<'a, A: TreeAdapter, R: Clone> ParentInfo<'a, A, R> {
    pub(crate) fn new(node: A::Node, thunk: impl Fn() -> AttrResult<R> + 'a) -> Self {
        Self {
            node,
            value: Lazy::new(thunk),
        }
    }

    /// The parent node.
    pub fn node(&self) -> &A::Node {
        &self.node
    }

    /// The attribute's value at the parent, evaluated on first use.
    pub fn attr(&self) -> AttrResult<R> {
        self.value.force()
    }

    /// Returns `true` once the parent's value has been requested.
    pub fn is_forced(&self) -> bool {
        self.value.is_forced()
    }
}

/// Evaluation context of an inherited attribute at one node.
pub struct InhContext<'a, A: TreeAdapter, R> {
    node: &'a A::Node,
    parent: Option<ParentInfo<'a, A, R>>,
}

impl<'a, A: TreeAdapter, R: Clone> InhContext<'a, A, R> {
    pub(crate) fn new(node: &'a A::Node, parent: Option<ParentInfo<'a, A, R>>) -> Self {
        Self { node, parent }
    }

    /// The node being evaluated.
    pub fn node(&self) -> &A::Node {
        self.node
    }

    /// The node's parent, or `None` at the root.
    pub fn parent(&self) -> Option<&ParentInfo<'a, A, R>> {
        self.parent.as_ref()
    }

    /// Returns `true` if the node is the tree root.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// The attribute's value at the parent, or `None` at the root.
    pub fn parent_attr(&self) -> AttrResult<Option<R>> {
        self.parent.as_ref().map(ParentInfo::attr).transpose()
    }
}
