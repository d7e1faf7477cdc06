//! Host tree access for the arbor attribute engine.
//!
//! This crate defines the [`TreeAdapter`] contract that turns a host value into
//! a navigable tree, and the [`TreeIndex`] snapshot the engine keeps of it:
//! membership, parent links, and duplicate-node detection at walk time.

#![warn(missing_docs)]

pub mod adapter;
pub mod error;
pub mod index;

pub use adapter::{ChildLabel, Children, TreeAdapter};
pub use error::TreeError;
pub use index::{IndexedNode, NodeId, Reindex, TreeIndex};
