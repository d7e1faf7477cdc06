//! Sample host trees for exercising the arbor attribute engine.
//!
//! Each tree illustrates one mutability model or adapter shape:
//!
//! - [`Bin`]: an immutable binary tree of `Rc` nodes, changed by building a new
//!   tree that shares unchanged subtrees with the old one.
//! - [`MutRef`]: a mutable n-ary tree edited in place through interior
//!   mutability.
//! - [`Doc`]: a document tree whose children are named, in insertion order.
//! - [`ArenaTree`]: an index-addressed tree whose adapter answers parent
//!   queries directly.

#![warn(missing_docs)]

use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;

use arbor_tree::{Children, TreeAdapter};
use indexmap::IndexMap;
use rand::Rng;

/// A node of an immutable binary tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinNode {
    /// A leaf carrying a value.
    Leaf(i64),
    /// An inner node with exactly two children.
    Fork(Bin, Bin),
}

/// Handle to an immutable binary tree node.
pub type Bin = Rc<BinNode>;

/// Creates a leaf.
pub fn leaf(value: i64) -> Bin {
    Rc::new(BinNode::Leaf(value))
}

/// Creates a fork over two existing subtrees, sharing them.
pub fn fork(left: Bin, right: Bin) -> Bin {
    Rc::new(BinNode::Fork(left, right))
}

/// Adapter for [`Bin`] trees.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinAdapter;

impl TreeAdapter for BinAdapter {
    type Node = Bin;

    fn children(&self, node: &Bin) -> Children<Bin> {
        match node.as_ref() {
            BinNode::Leaf(_) => Children::none(),
            BinNode::Fork(left, right) => Children::List(vec![Rc::clone(left), Rc::clone(right)]),
        }
    }
}

/// Number of nodes in a [`Bin`] tree.
pub fn bin_size(node: &Bin) -> usize {
    match node.as_ref() {
        BinNode::Leaf(_) => 1,
        BinNode::Fork(left, right) => 1 + bin_size(left) + bin_size(right),
    }
}

/// All nodes of a [`Bin`] tree, parents first.
pub fn bin_nodes(root: &Bin) -> Vec<Bin> {
    let mut out = Vec::new();
    let mut stack = vec![Rc::clone(root)];
    while let Some(node) = stack.pop() {
        if let BinNode::Fork(left, right) = node.as_ref() {
            stack.push(Rc::clone(right));
            stack.push(Rc::clone(left));
        }
        out.push(node);
    }
    out
}

/// A perfectly balanced [`Bin`] tree of the given depth whose leaves count up
/// from `first`.
pub fn balanced_bin(depth: u32, first: i64) -> Bin {
    fn build(depth: u32, next: &mut i64) -> Bin {
        if depth == 0 {
            let value = *next;
            *next += 1;
            return leaf(value);
        }
        let left = build(depth - 1, next);
        let right = build(depth - 1, next);
        fork(left, right)
    }
    let mut next = first;
    build(depth, &mut next)
}

/// A random [`Bin`] tree with `leaves` leaves (at least one) and values in
/// `-100..100`.
pub fn random_bin(rng: &mut impl Rng, leaves: usize) -> Bin {
    if leaves <= 1 {
        return leaf(rng.gen_range(-100..100));
    }
    let split = rng.gen_range(1..leaves);
    let left = random_bin(rng, split);
    let right = random_bin(rng, leaves - split);
    fork(left, right)
}

/// A node of a mutable n-ary tree.
#[derive(Debug)]
pub struct MutNode {
    value: Cell<i64>,
    children: RefCell<Vec<MutRef>>,
}

/// Handle to a mutable tree node.
pub type MutRef = Rc<MutNode>;

impl MutNode {
    /// Creates a node without children.
    pub fn leaf(value: i64) -> MutRef {
        Self::branch(value, Vec::new())
    }

    /// Creates a node with the given children.
    pub fn branch(value: i64, children: Vec<MutRef>) -> MutRef {
        Rc::new(Self {
            value: Cell::new(value),
            children: RefCell::new(children),
        })
    }

    /// The node's own value.
    pub fn value(&self) -> i64 {
        self.value.get()
    }

    /// Overwrites the node's own value.
    pub fn set_value(&self, value: i64) {
        self.value.set(value);
    }

    /// The current children.
    pub fn children(&self) -> Vec<MutRef> {
        self.children.borrow().clone()
    }

    /// Appends a child.
    pub fn push(&self, child: MutRef) {
        self.children.borrow_mut().push(child);
    }

    /// Removes and returns the child at `index`, if any.
    pub fn remove(&self, index: usize) -> Option<MutRef> {
        let mut children = self.children.borrow_mut();
        (index < children.len()).then(|| children.remove(index))
    }

    /// Replaces all children.
    pub fn set_children(&self, children: Vec<MutRef>) {
        *self.children.borrow_mut() = children;
    }
}

/// Adapter for [`MutRef`] trees.
#[derive(Debug, Clone, Copy, Default)]
pub struct MutAdapter;

impl TreeAdapter for MutAdapter {
    type Node = MutRef;

    fn children(&self, node: &MutRef) -> Children<MutRef> {
        Children::List(node.children())
    }
}

/// A node of a document tree with named children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocNode {
    /// A numeric value.
    Number(i64),
    /// A text value.
    Text(String),
    /// Named members, in insertion order.
    Object(IndexMap<String, Doc>),
}

/// Handle to a document node.
pub type Doc = Rc<DocNode>;

/// Creates a numeric document node.
pub fn number(value: i64) -> Doc {
    Rc::new(DocNode::Number(value))
}

/// Creates a text document node.
pub fn text(value: &str) -> Doc {
    Rc::new(DocNode::Text(value.to_string()))
}

/// Creates an object node from `(name, member)` pairs, keeping their order.
pub fn object<'a>(members: impl IntoIterator<Item = (&'a str, Doc)>) -> Doc {
    Rc::new(DocNode::Object(
        members
            .into_iter()
            .map(|(name, member)| (name.to_string(), member))
            .collect(),
    ))
}

/// Adapter for [`Doc`] trees; children are always map-shaped.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocAdapter;

impl TreeAdapter for DocAdapter {
    type Node = Doc;

    fn children(&self, node: &Doc) -> Children<Doc> {
        match node.as_ref() {
            DocNode::Object(members) => Children::Map(members.clone()),
            DocNode::Number(_) | DocNode::Text(_) => Children::Map(IndexMap::new()),
        }
    }
}

#[derive(Debug, Clone)]
struct ArenaSlot {
    value: i64,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// A tree stored as a flat vector, nodes addressed by index. The root is
/// node `0`.
#[derive(Debug, Clone, Default)]
pub struct ArenaTree {
    slots: Vec<ArenaSlot>,
}

impl ArenaTree {
    /// A complete binary tree of the given depth in heap order: the children
    /// of node `i` are `2i + 1` and `2i + 2`. Each node's value is its index.
    pub fn balanced(depth: u32) -> Self {
        let count = (1usize << (depth + 1)) - 1;
        let slots = (0..count)
            .map(|i| ArenaSlot {
                value: i as i64,
                parent: (i > 0).then(|| (i - 1) / 2),
                children: [2 * i + 1, 2 * i + 2]
                    .into_iter()
                    .filter(|&c| c < count)
                    .collect(),
            })
            .collect();
        Self { slots }
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Value stored at `node`.
    pub fn value(&self, node: usize) -> Option<i64> {
        self.slots.get(node).map(|slot| slot.value)
    }

    /// Detaches `node` from its parent and appends it to `new_parent`'s
    /// children. Returns `false` if either index is out of range or the move
    /// would put `node` below itself.
    pub fn reparent(&mut self, node: usize, new_parent: usize) -> bool {
        if node >= self.slots.len() || new_parent >= self.slots.len() {
            return false;
        }
        let mut above = Some(new_parent);
        while let Some(ancestor) = above {
            if ancestor == node {
                return false;
            }
            above = self.slots[ancestor].parent;
        }
        if let Some(old) = self.slots[node].parent {
            self.slots[old].children.retain(|&child| child != node);
        }
        self.slots[new_parent].children.push(node);
        self.slots[node].parent = Some(new_parent);
        true
    }
}

/// Adapter for [`ArenaTree`]s that answers parent queries from the arena.
///
/// Clones share the tree, so a test can keep one clone to edit the tree
/// after handing the other to a registry.
#[derive(Debug, Clone)]
pub struct ArenaAdapter {
    tree: Rc<RefCell<ArenaTree>>,
}

impl ArenaAdapter {
    /// Wraps a tree.
    pub fn new(tree: ArenaTree) -> Self {
        Self {
            tree: Rc::new(RefCell::new(tree)),
        }
    }

    /// The wrapped tree.
    pub fn tree(&self) -> Ref<'_, ArenaTree> {
        self.tree.borrow()
    }

    /// Moves `node` under `new_parent`. See [`ArenaTree::reparent`].
    pub fn reparent(&self, node: usize, new_parent: usize) -> bool {
        self.tree.borrow_mut().reparent(node, new_parent)
    }
}

impl TreeAdapter for ArenaAdapter {
    type Node = usize;

    fn children(&self, node: &usize) -> Children<usize> {
        self.tree
            .borrow()
            .slots
            .get(*node)
            .map(|slot| Children::List(slot.children.clone()))
            .unwrap_or_default()
    }

    fn supports_parent(&self) -> bool {
        true
    }

    fn parent(&self, node: &usize) -> Option<usize> {
        self.tree.borrow().slots.get(*node).and_then(|slot| slot.parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn balanced_bin_shape() {
        let tree = balanced_bin(3, 0);
        assert_eq!(bin_size(&tree), 15);
        assert_eq!(bin_nodes(&tree).len(), 15);
    }

    #[test]
    fn random_bin_has_requested_leaves() {
        let mut rng = StdRng::seed_from_u64(7);
        let tree = random_bin(&mut rng, 20);
        assert_eq!(bin_size(&tree), 39);
    }

    #[test]
    fn arena_tree_links() {
        let adapter = ArenaAdapter::new(ArenaTree::balanced(2));
        assert_eq!(adapter.tree().len(), 7);
        assert_eq!(adapter.children(&1).into_values(), vec![3, 4]);
        assert_eq!(adapter.parent(&6), Some(2));
        assert_eq!(adapter.parent(&0), None);
        assert!(adapter.children(&5).is_empty());
    }

    #[test]
    fn arena_reparent_updates_both_directions() {
        let adapter = ArenaAdapter::new(ArenaTree::balanced(2));
        assert!(adapter.reparent(4, 2));
        assert_eq!(adapter.children(&1).into_values(), vec![3]);
        assert_eq!(adapter.children(&2).into_values(), vec![5, 6, 4]);
        assert_eq!(adapter.parent(&4), Some(2));
        assert!(!adapter.reparent(0, 6));
        assert!(!adapter.reparent(9, 0));
    }

    #[test]
    fn doc_children_keep_order() {
        let doc = object([("b", number(1)), ("a", text("x"))]);
        let keys: Vec<String> = DocAdapter
            .children(&doc)
            .iter()
            .filter_map(|(label, _)| label.key().map(str::to_string))
            .collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn mut_node_edits() {
        let root = MutNode::branch(1, vec![MutNode::leaf(2)]);
        root.push(MutNode::leaf(3));
        assert_eq!(root.children().len(), 2);
        let removed = root.remove(0).map(|n| n.value());
        assert_eq!(removed, Some(2));
        assert!(root.remove(5).is_none());
        root.set_value(9);
        assert_eq!(root.value(), 9);
    }
}
