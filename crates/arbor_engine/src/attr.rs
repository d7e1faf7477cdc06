//! Reified attributes.
//!
//! An [`Attr`] is a definition bound to one tree: a function from node to
//! value that evaluates lazily, consults its cache first, and reports every
//! evaluation to the tree's event bus. The strategy-specific algorithms live
//! in the `synthetic` and `inherited` modules; derived and transformed
//! attributes are node-local and are handled here.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use arbor_common::{define_id, Ident, NodeIdentity, NodeKey};
use arbor_config::MemoMode;
use arbor_tree::TreeAdapter;

use crate::cache::{CacheEntry, CacheStore, Fingerprint};
use crate::definition::{AttrKind, AttrOptions, Definition, Evaluator, LocalFn, ParentFn};
use crate::error::{AttrError, AttrResult};
use crate::events::{Event, EventKind};
use crate::plugin::{run_chain, EvalCall, Plugin};
use crate::tree::Tree;

define_id!(
    /// Identifier of a reified attribute within its registry.
    AttrId
);

impl fmt::Display for AttrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attr#{}", self.as_raw())
    }
}

/// Type-erased view of a reified attribute.
///
/// The registry and plugins use it to manage attributes without knowing their
/// value types.
pub trait DynAttr {
    /// Identifier within the registry.
    fn id(&self) -> AttrId;
    /// Interned name the attribute was first added under.
    fn name(&self) -> Ident;
    /// The name as a string.
    fn label(&self) -> &str;
    /// Evaluation strategy.
    fn kind(&self) -> AttrKind;
    /// The kind whose invalidation rules apply. Differs from
    /// [`kind`](Self::kind) only for transformed attributes, which follow
    /// their source.
    fn invalidation_kind(&self) -> AttrKind;
    /// Resolved evaluation options.
    fn options(&self) -> AttrOptions;
    /// Discards every cached value.
    fn invalidate(&self);
    /// Discards the cached value for `key`. Returns `true` if one existed.
    fn forget(&self, key: NodeKey) -> bool;
    /// Number of cached values.
    fn cached_len(&self) -> usize;
    /// Evaluates every indexed node if the attribute is eager.
    fn prime(&self) -> AttrResult<()>;
}

pub(crate) struct AttrCore<A: TreeAdapter, R> {
    pub(crate) id: AttrId,
    pub(crate) name: Ident,
    pub(crate) label: String,
    pub(crate) evaluator: Evaluator<A, R>,
    pub(crate) parent_fn: Option<ParentFn<A>>,
    pub(crate) options: AttrOptions,
    pub(crate) cache: RefCell<Box<dyn CacheStore<A::Node, R>>>,
    pub(crate) plugins: Vec<Rc<dyn Plugin>>,
    pub(crate) tree: Rc<Tree<A>>,
}

impl<A: TreeAdapter, R: Clone + 'static> AttrCore<A, R> {
    pub(crate) fn new(
        id: AttrId,
        name: Ident,
        label: &str,
        definition: &Definition<A, R>,
        options: AttrOptions,
        cache: Box<dyn CacheStore<A::Node, R>>,
        plugins: Vec<Rc<dyn Plugin>>,
        tree: Rc<Tree<A>>,
    ) -> Self {
        Self {
            id,
            name,
            label: label.to_string(),
            evaluator: definition.inner.evaluator.clone(),
            parent_fn: definition.inner.parent_fn.clone(),
            options,
            cache: RefCell::new(cache),
            plugins,
            tree,
        }
    }

    /// Evaluates the attribute at `node`.
    pub(crate) fn get(&self, node: &A::Node) -> AttrResult<R> {
        match &self.evaluator {
            Evaluator::Synthetic(f) => self.synthesize(f, node),
            Evaluator::Inherited(f) => self.inherit(f, node),
            Evaluator::Derived(f) => self.evaluate_local(f, node, Fingerprint::Local),
            Evaluator::Transformed {
                source_fingerprint,
                f,
                ..
            } => self.evaluate_local(f, node, source_fingerprint(node)),
        }
    }

    /// Evaluates a node-local function, reusing a cached value whose
    /// fingerprint still matches.
    fn evaluate_local(
        &self,
        f: &LocalFn<A, R>,
        node: &A::Node,
        fingerprint: Fingerprint,
    ) -> AttrResult<R> {
        let key = node.node_key();
        if let Some(value) = self.cached(key, &fingerprint) {
            return Ok(self.produced(key, value));
        }
        let value = self.invoke(key, &|| f(node))?;
        self.store(node, fingerprint, value.clone());
        Ok(self.produced(key, value))
    }

    /// The structure a value at `node` is computed from right now, with
    /// parents resolved the way this attribute's own evaluation resolves them.
    pub(crate) fn fingerprint(&self, node: &A::Node) -> Fingerprint {
        match &self.evaluator {
            Evaluator::Synthetic(_) => {
                Fingerprint::Children(self.tree.adapter().children(node).keys())
            }
            Evaluator::Inherited(_) => Fingerprint::Parent(self.parent_key(node)),
            Evaluator::Derived(_) => Fingerprint::Local,
            Evaluator::Transformed {
                source_fingerprint, ..
            } => source_fingerprint(node),
        }
    }

    pub(crate) fn kind(&self) -> AttrKind {
        self.evaluator.kind()
    }

    /// Returns the cached value for `key` if its fingerprint matches, and
    /// drops the entry if it does not.
    pub(crate) fn cached(&self, key: NodeKey, fingerprint: &Fingerprint) -> Option<R> {
        let mut cache = self.cache.borrow_mut();
        let verdict = cache
            .lookup(key)
            .map(|entry| (entry.fingerprint == *fingerprint).then(|| entry.value.clone()));
        match verdict {
            Some(Some(value)) => {
                tracing::trace!(attr = %self.label, node = %key, "cache hit");
                Some(value)
            }
            Some(None) => {
                cache.remove(key);
                tracing::trace!(attr = %self.label, node = %key, "stale cache entry dropped");
                None
            }
            None => None,
        }
    }

    pub(crate) fn store(&self, node: &A::Node, fingerprint: Fingerprint, value: R) {
        if self.options.memoize == MemoMode::None {
            return;
        }
        self.cache.borrow_mut().insert(
            node.node_key(),
            CacheEntry {
                node: node.clone(),
                value,
                fingerprint,
            },
        );
    }

    /// Runs `compute` through the plugin chain, reporting the invocation.
    pub(crate) fn invoke(&self, key: NodeKey, compute: &dyn Fn() -> AttrResult<R>) -> AttrResult<R> {
        let run = || {
            self.tree.emit(Event {
                kind: EventKind::Invoked,
                attr: self.id,
                name: self.name,
                node: key,
            });
            compute()
        };
        if self.plugins.is_empty() {
            return run();
        }
        let call = EvalCall {
            attr: self.id,
            name: &self.label,
            kind: self.kind(),
            node: key,
        };
        let mut slot = None;
        run_chain(&self.plugins, &call, &mut || {
            slot = Some(run()?);
            Ok(())
        })?;
        slot.ok_or_else(|| AttrError::EvaluationSkipped {
            attr: self.label.clone(),
            node: key,
        })
    }

    /// Reports that `value` is being handed out for `key`.
    pub(crate) fn produced(&self, key: NodeKey, value: R) -> R {
        self.tree.emit(Event {
            kind: EventKind::Produced,
            attr: self.id,
            name: self.name,
            node: key,
        });
        value
    }

    fn prime_eager(&self) -> AttrResult<()> {
        if !self.options.eager {
            return Ok(());
        }
        if self.options.memoize == MemoMode::None {
            tracing::warn!(attr = %self.label, "eager evaluation without memoization has no effect");
            return Ok(());
        }
        match &self.evaluator {
            Evaluator::Inherited(f) if self.searches_for_parents() => self.prime_by_walk(f)?,
            Evaluator::Inherited(_) => {
                let nodes = self.tree.index().preorder();
                for node in &nodes {
                    self.get(node)?;
                }
            }
            _ => {
                let nodes = self.tree.index().postorder();
                for node in &nodes {
                    self.get(node)?;
                }
            }
        }
        tracing::debug!(attr = %self.label, cached = self.cache.borrow().len(), "primed eager attribute");
        Ok(())
    }
}

impl<A: TreeAdapter, R: Clone + 'static> DynAttr for AttrCore<A, R> {
    fn id(&self) -> AttrId {
        self.id
    }

    fn name(&self) -> Ident {
        self.name
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn kind(&self) -> AttrKind {
        self.evaluator.kind()
    }

    fn invalidation_kind(&self) -> AttrKind {
        self.evaluator.invalidation_kind()
    }

    fn options(&self) -> AttrOptions {
        self.options
    }

    fn invalidate(&self) {
        self.cache.borrow_mut().clear();
    }

    fn forget(&self, key: NodeKey) -> bool {
        self.cache.borrow_mut().remove(key)
    }

    fn cached_len(&self) -> usize {
        self.cache.borrow().len()
    }

    fn prime(&self) -> AttrResult<()> {
        self.prime_eager()
    }
}

/// A reified attribute: a definition bound to one tree.
///
/// Handles are cheap to clone and all clones share one cache.
pub struct Attr<A: TreeAdapter, R> {
    pub(crate) core: Rc<AttrCore<A, R>>,
}

impl<A: TreeAdapter, R> Clone for Attr<A, R> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

impl<A: TreeAdapter, R> fmt::Debug for Attr<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attr")
            .field("id", &self.core.id)
            .field("name", &self.core.label)
            .field("kind", &self.core.evaluator.kind())
            .field("options", &self.core.options)
            .finish()
    }
}

impl<A: TreeAdapter, R: Clone + 'static> Attr<A, R> {
    /// The attribute's value at `node`, computed if it is not cached.
    ///
    /// Synthetic, derived, and transformed attributes accept any node the
    /// adapter can navigate. Inherited attributes that locate parents by
    /// search fail with [`AttrError::NodeNotFound`] for nodes not reachable
    /// from the root.
    pub fn get(&self, node: &A::Node) -> AttrResult<R> {
        self.core.get(node)
    }

    /// Identifier within the registry.
    pub fn id(&self) -> AttrId {
        self.core.id
    }

    /// Interned name the attribute was first added under.
    pub fn name(&self) -> Ident {
        self.core.name
    }

    /// The name as a string.
    pub fn label(&self) -> &str {
        &self.core.label
    }

    /// Evaluation strategy.
    pub fn kind(&self) -> AttrKind {
        self.core.kind()
    }

    /// The kind whose invalidation rules apply.
    pub fn invalidation_kind(&self) -> AttrKind {
        self.core.evaluator.invalidation_kind()
    }

    /// Resolved evaluation options.
    pub fn options(&self) -> AttrOptions {
        self.core.options
    }

    /// Discards every cached value.
    pub fn invalidate(&self) {
        DynAttr::invalidate(&*self.core);
    }

    /// Discards the cached value for `node`. Returns `true` if one existed.
    pub fn invalidate_node(&self, node: &A::Node) -> bool {
        self.core.forget(node.node_key())
    }

    /// Returns `true` if a value for `node` is cached, without validating it
    /// or marking it as recently used.
    pub fn is_cached(&self, node: &A::Node) -> bool {
        self.core.cache.borrow().contains(node.node_key())
    }

    /// Number of cached values.
    pub fn cached_len(&self) -> usize {
        self.core.cached_len()
    }

    /// Number of values the cache dropped to stay within its capacity.
    pub fn evictions(&self) -> usize {
        self.core.cache.borrow().evictions()
    }

    /// Type-erased view of this attribute.
    pub fn as_dyn(&self) -> Rc<dyn DynAttr> {
        self.core.clone()
    }

    /// Returns `true` if both handles refer to the same reified attribute.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.core, &other.core)
    }
}
