//! Attribute evaluation engine for host trees.
//!
//! Consumers describe attributes with a [`Definition`]: synthetic (bottom-up
//! from children), inherited (top-down from the parent), derived (node-local),
//! or transformed (a function of another attribute). A [`Registry`] reifies
//! each definition against one tree into an [`Attr`], a lazily evaluated,
//! optionally memoized function from node to value. Cached values carry a
//! fingerprint of the structure they were computed from; the registry's
//! `set_root` and `update` operations keep caches consistent with announced
//! mutations.

#![warn(missing_docs)]

pub mod attr;
pub mod cache;
pub mod context;
pub mod definition;
pub mod error;
pub mod events;
mod inherited;
pub mod plugin;
pub mod registry;
mod synthetic;
pub mod tree;

pub use arbor_common::{Ident, NodeIdentity, NodeKey};
pub use arbor_config::{AttrDefaults, EngineConfig, InheritedPolicy, MemoMode};
pub use arbor_tree::{ChildLabel, Children, Reindex, TreeAdapter, TreeError};

pub use attr::{Attr, AttrId, DynAttr};
pub use cache::{
    CacheEntry, CacheStore, CustomStore, Fingerprint, IdentityCache, LruCache, NoCache,
};
pub use context::{ChildInfo, InhContext, Lazy, ParentInfo, SynContext};
pub use definition::{AttrKind, AttrOptions, Definition};
pub use error::{AttrError, AttrResult};
pub use events::{EvalCounter, Event, EventBus, EventKind};
pub use plugin::{AttrMeta, EvalCall, Plugin, TracePlugin};
pub use registry::Registry;
pub use tree::Tree;
