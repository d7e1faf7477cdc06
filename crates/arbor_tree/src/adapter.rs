//! The tree adapter contract.
//!
//! A [`TreeAdapter`] is the only way the engine learns about a host tree: given
//! a node it lists the node's children, and optionally it can answer parent
//! queries directly. Children come in one of two shapes, an ordered list or a
//! string-keyed map that preserves insertion order.

use arbor_common::{NodeIdentity, NodeKey};
use indexmap::IndexMap;

/// Turns a host value into a navigable tree.
///
/// `children` must be a pure, deterministic function of the node at the moment
/// it is called. An adapter should always return the same [`Children`] shape.
pub trait TreeAdapter: 'static {
    /// Handle type for host nodes. Cloning a handle must not copy the node.
    type Node: NodeIdentity + Clone + 'static;

    /// Lists the direct children of `node`.
    fn children(&self, node: &Self::Node) -> Children<Self::Node>;

    /// Returns `true` if [`parent`](Self::parent) answers parent queries.
    ///
    /// When `false`, inherited attributes without their own parent function
    /// locate parents by searching the tree from the root.
    fn supports_parent(&self) -> bool {
        false
    }

    /// Returns the parent of `node`, or `None` for the root.
    ///
    /// Only consulted when [`supports_parent`](Self::supports_parent) is `true`.
    fn parent(&self, _node: &Self::Node) -> Option<Self::Node> {
        None
    }
}

/// Position of a child within its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildLabel {
    /// Position in a list-shaped child sequence.
    Index(usize),
    /// Key in a map-shaped child collection.
    Key(String),
}

impl ChildLabel {
    /// Returns the key for map-shaped children.
    pub fn key(&self) -> Option<&str> {
        match self {
            ChildLabel::Key(key) => Some(key),
            ChildLabel::Index(_) => None,
        }
    }
}

/// The children of a node, in one of the two supported shapes.
///
/// The same type doubles as a shape-preserving container for per-child values,
/// e.g. the result of mapping every child to its attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Children<T> {
    /// Ordered sequence of children.
    List(Vec<T>),
    /// Named children, iterated in key-insertion order.
    Map(IndexMap<String, T>),
}

impl<T> Default for Children<T> {
    fn default() -> Self {
        Children::List(Vec::new())
    }
}

impl<T> Children<T> {
    /// Returns an empty list-shaped collection.
    pub fn none() -> Self {
        Self::default()
    }

    /// Number of children.
    pub fn len(&self) -> usize {
        match self {
            Children::List(items) => items.len(),
            Children::Map(items) => items.len(),
        }
    }

    /// Returns `true` if there are no children.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over `(label, item)` pairs in child order.
    pub fn iter(&self) -> Box<dyn Iterator<Item = (ChildLabel, &T)> + '_> {
        match self {
            Children::List(items) => Box::new(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| (ChildLabel::Index(i), item)),
            ),
            Children::Map(items) => Box::new(
                items
                    .iter()
                    .map(|(key, item)| (ChildLabel::Key(key.clone()), item)),
            ),
        }
    }

    /// Iterates over the items in child order, ignoring labels.
    pub fn values(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        match self {
            Children::List(items) => Box::new(items.iter()),
            Children::Map(items) => Box::new(items.values()),
        }
    }

    /// Consumes the collection, returning the items in child order.
    pub fn into_values(self) -> Vec<T> {
        match self {
            Children::List(items) => items,
            Children::Map(items) => items.into_values().collect(),
        }
    }

    /// Looks up a map-shaped child by key.
    pub fn get_key(&self, key: &str) -> Option<&T> {
        match self {
            Children::Map(items) => items.get(key),
            Children::List(_) => None,
        }
    }

    /// Looks up a child by position.
    pub fn get_index(&self, index: usize) -> Option<&T> {
        match self {
            Children::List(items) => items.get(index),
            Children::Map(items) => items.get_index(index).map(|(_, item)| item),
        }
    }

    /// Maps every item, preserving shape, order, and keys.
    pub fn try_map<U, E>(
        &self,
        mut f: impl FnMut(&ChildLabel, &T) -> Result<U, E>,
    ) -> Result<Children<U>, E> {
        match self {
            Children::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    out.push(f(&ChildLabel::Index(i), item)?);
                }
                Ok(Children::List(out))
            }
            Children::Map(items) => {
                let mut out = IndexMap::with_capacity(items.len());
                for (key, item) in items {
                    let label = ChildLabel::Key(key.clone());
                    out.insert(key.clone(), f(&label, item)?);
                }
                Ok(Children::Map(out))
            }
        }
    }
}

impl<T: NodeIdentity> Children<T> {
    /// Identity keys of the children in child order.
    pub fn keys(&self) -> Vec<NodeKey> {
        self.values().map(NodeIdentity::node_key).collect()
    }

    /// Returns `true` if `key` identifies one of these children.
    pub fn contains_key(&self, key: NodeKey) -> bool {
        self.values().any(|child| child.node_key() == key)
    }
}

impl<T> From<Vec<T>> for Children<T> {
    fn from(items: Vec<T>) -> Self {
        Children::List(items)
    }
}

impl<T> From<IndexMap<String, T>> for Children<T> {
    fn from(items: IndexMap<String, T>) -> Self {
        Children::Map(items)
    }
}
