//! Node identity keys.
//!
//! The engine never looks inside host nodes. It only needs to tell whether two
//! handles denote the same node, which [`NodeIdentity`] reduces to a [`NodeKey`].

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Opaque identity of a host tree node.
///
/// Two handles with equal keys denote the same node. Keys are only meaningful
/// while the node they were taken from is alive.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey(usize);

impl NodeKey {
    /// Creates a key from a raw identity value.
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// Returns the raw identity value.
    pub fn as_raw(self) -> usize {
        self.0
    }
}

impl fmt::Debug for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeKey({:#x})", self.0)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{:x}", self.0)
    }
}

/// Handles that can report the identity of the node they refer to.
pub trait NodeIdentity {
    /// Returns the identity key of this node.
    fn node_key(&self) -> NodeKey;
}

/// Reference-counted nodes are identified by allocation address.
impl<T: ?Sized> NodeIdentity for Rc<T> {
    fn node_key(&self) -> NodeKey {
        NodeKey(Rc::as_ptr(self) as *const () as usize)
    }
}

/// Index-based host trees use the index itself as identity.
impl NodeIdentity for usize {
    fn node_key(&self) -> NodeKey {
        NodeKey(*self)
    }
}

impl NodeIdentity for u32 {
    fn node_key(&self) -> NodeKey {
        NodeKey(*self as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rc_clones_share_identity() {
        let a = Rc::new(5);
        let b = Rc::clone(&a);
        assert_eq!(a.node_key(), b.node_key());
    }

    #[test]
    fn equal_values_are_distinct_nodes() {
        let a = Rc::new(5);
        let b = Rc::new(5);
        assert_ne!(a.node_key(), b.node_key());
    }

    #[test]
    fn index_identity() {
        assert_eq!(3usize.node_key(), NodeKey::from_raw(3));
        assert_eq!(3u32.node_key(), 3usize.node_key());
    }

    #[test]
    fn display_is_hex() {
        assert_eq!(NodeKey::from_raw(255).to_string(), "node#ff");
    }
}
