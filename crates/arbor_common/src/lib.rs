//! Shared foundational types used across the arbor attribute engine.
//!
//! This crate provides node identity keys, interned attribute names, and the
//! generic ID-indexed arena behind the tree index and attribute identifiers.

#![warn(missing_docs)]

pub mod arena;
pub mod ident;
pub mod key;

pub use arena::{Arena, ArenaId};
pub use ident::{Ident, Interner};
pub use key::{NodeIdentity, NodeKey};
