//! Attribute definitions: what an attribute computes, independent of any tree.
//!
//! A [`Definition`] is an immutable value. Option builders such as
//! [`memoize`](Definition::memoize) return a new definition and leave the
//! original untouched, so one base definition can be reified several times
//! with different settings.

use std::fmt;
use std::rc::Rc;

use arbor_config::{AttrDefaults, MemoMode};
use arbor_tree::TreeAdapter;
use serde::{Deserialize, Serialize};

use crate::attr::Attr;
use crate::cache::Fingerprint;
use crate::context::{InhContext, SynContext};
use crate::error::AttrResult;

/// The evaluation strategy of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttrKind {
    /// Computed from the node and the values of its children.
    Synthetic,
    /// Computed from the node and the value of its parent.
    Inherited,
    /// Computed from the node alone.
    Derived,
    /// Computed from another attribute's value at the same node.
    Transformed,
}

impl fmt::Display for AttrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttrKind::Synthetic => "synthetic",
            AttrKind::Inherited => "inherited",
            AttrKind::Derived => "derived",
            AttrKind::Transformed => "transformed",
        };
        f.write_str(name)
    }
}

/// Fully resolved evaluation options of a reified attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrOptions {
    /// Memoization strategy.
    pub memoize: MemoMode,
    /// Capacity of the cache when `memoize` is [`MemoMode::Lru`].
    pub lru_capacity: usize,
    /// Whether values are computed for every node at reification time.
    pub eager: bool,
}

impl AttrOptions {
    /// Options equal to the configured defaults.
    pub fn from_defaults(defaults: &AttrDefaults) -> Self {
        Self {
            memoize: defaults.memoize,
            lru_capacity: defaults.lru_capacity,
            eager: defaults.eager,
        }
    }
}

impl Default for AttrOptions {
    fn default() -> Self {
        Self::from_defaults(&AttrDefaults::default())
    }
}

/// Per-definition overrides layered over the registry defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct OptionOverrides {
    memoize: Option<MemoMode>,
    lru_capacity: Option<usize>,
    eager: Option<bool>,
}

impl OptionOverrides {
    pub(crate) fn resolve(&self, defaults: &AttrDefaults) -> AttrOptions {
        let base = AttrOptions::from_defaults(defaults);
        AttrOptions {
            memoize: self.memoize.unwrap_or(base.memoize),
            lru_capacity: self.lru_capacity.unwrap_or(base.lru_capacity),
            eager: self.eager.unwrap_or(base.eager),
        }
    }
}

pub(crate) type SyntheticFn<A, R> = Rc<dyn Fn(&SynContext<'_, A, R>) -> AttrResult<R>>;
pub(crate) type InheritedFn<A, R> = Rc<dyn Fn(&InhContext<'_, A, R>) -> AttrResult<R>>;
pub(crate) type LocalFn<A, R> = Rc<dyn Fn(&<A as TreeAdapter>::Node) -> AttrResult<R>>;
pub(crate) type ParentFn<A> =
    Rc<dyn Fn(&<A as TreeAdapter>::Node) -> Option<<A as TreeAdapter>::Node>>;
pub(crate) type FingerprintFn<A> = Rc<dyn Fn(&<A as TreeAdapter>::Node) -> Fingerprint>;

pub(crate) enum Evaluator<A: TreeAdapter, R> {
    Synthetic(SyntheticFn<A, R>),
    Inherited(InheritedFn<A, R>),
    Derived(LocalFn<A, R>),
    Transformed {
        /// Kind whose invalidation rules the transformed attribute follows.
        source_kind: AttrKind,
        /// The source attribute's fingerprint at a node.
        source_fingerprint: FingerprintFn<A>,
        f: LocalFn<A, R>,
    },
}

impl<A: TreeAdapter, R> Clone for Evaluator<A, R> {
    fn clone(&self) -> Self {
        match self {
            Evaluator::Synthetic(f) => Evaluator::Synthetic(Rc::clone(f)),
            Evaluator::Inherited(f) => Evaluator::Inherited(Rc::clone(f)),
            Evaluator::Derived(f) => Evaluator::Derived(Rc::clone(f)),
            Evaluator::Transformed {
                source_kind,
                source_fingerprint,
                f,
            } => Evaluator::Transformed {
                source_kind: *source_kind,
                source_fingerprint: Rc::clone(source_fingerprint),
                f: Rc::clone(f),
            },
        }
    }
}

impl<A: TreeAdapter, R> Evaluator<A, R> {
    pub(crate) fn kind(&self) -> AttrKind {
        match self {
            Evaluator::Synthetic(_) => AttrKind::Synthetic,
            Evaluator::Inherited(_) => AttrKind::Inherited,
            Evaluator::Derived(_) => AttrKind::Derived,
            Evaluator::Transformed { .. } => AttrKind::Transformed,
        }
    }

    /// The kind whose invalidation rules apply; transformed attributes defer
    /// to their source.
    pub(crate) fn invalidation_kind(&self) -> AttrKind {
        match self {
            Evaluator::Transformed { source_kind, .. } => *source_kind,
            other => other.kind(),
        }
    }
}

pub(crate) struct DefinitionInner<A: TreeAdapter, R> {
    pub(crate) evaluator: Evaluator<A, R>,
    pub(crate) overrides: OptionOverrides,
    pub(crate) parent_fn: Option<ParentFn<A>>,
}

/// An immutable description of an attribute, ready to be added to a
/// [`Registry`](crate::Registry).
///
/// Two definitions are the same definition only if one is a clone of the
/// other; builder methods always produce a distinct definition.
pub struct Definition<A: TreeAdapter, R> {
    pub(crate) inner: Rc<DefinitionInner<A, R>>,
}

impl<A: TreeAdapter, R> Clone for Definition<A, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<A: TreeAdapter, R> fmt::Debug for Definition<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("kind", &self.inner.evaluator.kind())
            .field("overrides", &self.inner.overrides)
            .field("custom_parent", &self.inner.parent_fn.is_some())
            .finish()
    }
}

impl<A: TreeAdapter, R: Clone + 'static> Definition<A, R> {
    fn from_evaluator(evaluator: Evaluator<A, R>) -> Self {
        Self {
            inner: Rc::new(DefinitionInner {
                evaluator,
                overrides: OptionOverrides::default(),
                parent_fn: None,
            }),
        }
    }

    /// A bottom-up attribute. The evaluator sees the node and lazily
    /// evaluated values of its direct children.
    pub fn synthetic<F>(f: F) -> Self
    where
        F: Fn(&SynContext<'_, A, R>) -> AttrResult<R> + 'static,
    {
        Self::from_evaluator(Evaluator::Synthetic(Rc::new(f)))
    }

    /// A top-down attribute. The evaluator sees the node and, unless the node
    /// is the root, its parent together with the parent's lazily evaluated
    /// value.
    pub fn inherited<F>(f: F) -> Self
    where
        F: Fn(&InhContext<'_, A, R>) -> AttrResult<R> + 'static,
    {
        Self::from_evaluator(Evaluator::Inherited(Rc::new(f)))
    }

    /// A node-local attribute.
    pub fn derived<F>(f: F) -> Self
    where
        F: Fn(&A::Node) -> AttrResult<R> + 'static,
    {
        Self::from_evaluator(Evaluator::Derived(Rc::new(f)))
    }

    /// An attribute computed from `source`'s value at the same node.
    ///
    /// Its cache follows the invalidation rules of the source's kind, and a
    /// cached value is reused only while the source would reuse its own.
    pub fn transformed<S, F>(source: &Attr<A, S>, f: F) -> Self
    where
        S: Clone + 'static,
        F: Fn(&A::Node, S) -> AttrResult<R> + 'static,
    {
        let source_kind = source.invalidation_kind();
        let core = Rc::clone(&source.core);
        let source_fingerprint: FingerprintFn<A> =
            Rc::new(move |node: &A::Node| core.fingerprint(node));
        let source = source.clone();
        let f: LocalFn<A, R> = Rc::new(move |node: &A::Node| f(node, source.get(node)?));
        Self::from_evaluator(Evaluator::Transformed {
            source_kind,
            source_fingerprint,
            f,
        })
    }

    /// The evaluation strategy of this definition.
    pub fn kind(&self) -> AttrKind {
        self.inner.evaluator.kind()
    }

    /// Returns a definition with the given memoization strategy.
    pub fn memoize(self, mode: MemoMode) -> Self {
        self.rebuild(|inner| inner.overrides.memoize = Some(mode))
    }

    /// Returns a definition memoized in an LRU cache of `capacity` entries.
    pub fn lru(self, capacity: usize) -> Self {
        self.rebuild(|inner| {
            inner.overrides.memoize = Some(MemoMode::Lru);
            inner.overrides.lru_capacity = Some(capacity);
        })
    }

    /// Returns a definition that is (or is not) evaluated for every node as
    /// soon as it is reified.
    pub fn eager(self, eager: bool) -> Self {
        self.rebuild(|inner| inner.overrides.eager = Some(eager))
    }

    /// Returns a definition that locates parents with `parent` instead of the
    /// adapter. Only inherited attributes consult it.
    pub fn with_parent<P>(self, parent: P) -> Self
    where
        P: Fn(&A::Node) -> Option<A::Node> + 'static,
    {
        self.rebuild(|inner| inner.parent_fn = Some(Rc::new(parent)))
    }

    /// Resolves this definition's options against registry defaults.
    pub fn options(&self, defaults: &AttrDefaults) -> AttrOptions {
        self.inner.overrides.resolve(defaults)
    }

    /// Address of the shared definition, stable across clones.
    pub(crate) fn identity(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }

    fn rebuild(self, edit: impl FnOnce(&mut DefinitionInner<A, R>)) -> Self {
        let mut inner = DefinitionInner {
            evaluator: self.inner.evaluator.clone(),
            overrides: self.inner.overrides,
            parent_fn: self.inner.parent_fn.clone(),
        };
        edit(&mut inner);
        Self {
            inner: Rc::new(inner),
        }
    }
}
