//! The attribute registry: one tree, many named attributes.
//!
//! The registry owns the tree state, reifies definitions into attributes,
//! looks attributes up by name, and is the only place structural changes are
//! announced. After [`Registry::set_root`] or [`Registry::update`] every
//! attribute's cache is consistent with the new tree, following the
//! per-kind rules below.
//!
//! | kind        | `update(node)` discards                         |
//! |-------------|-------------------------------------------------|
//! | synthetic   | `node` and all its ancestors                    |
//! | inherited   | `node`, plus more per [`InheritedPolicy`]       |
//! | derived     | `node`                                          |
//! | transformed | as for the kind of its source                   |
//!
//! In every case values of nodes no longer reachable are discarded, and
//! inherited values of nodes whose ancestor chain changed are discarded.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::rc::Rc;

use arbor_common::{Ident, Interner, NodeIdentity, NodeKey};
use arbor_config::{EngineConfig, InheritedPolicy, MemoMode};
use arbor_tree::{Reindex, TreeAdapter, TreeError};

use crate::attr::{Attr, AttrCore, AttrId, DynAttr};
use crate::cache::{new_store, CacheStore};
use crate::definition::{AttrKind, AttrOptions, Definition};
use crate::error::{AttrError, AttrResult};
use crate::events::Event;
use crate::plugin::{AttrMeta, Plugin, TracePlugin};
use crate::tree::Tree;

/// One reified attribute, stored both type-erased and as `Any` for typed
/// lookups. The definition is held so its address, which keys
/// `by_definition`, cannot be reused while the slot exists.
struct Slot {
    attr: Rc<dyn DynAttr>,
    any: Rc<dyn Any>,
    _definition: Box<dyn Any>,
}

/// Named attributes over one host tree.
pub struct Registry<A: TreeAdapter> {
    tree: Rc<Tree<A>>,
    config: EngineConfig,
    interner: Interner,
    slots: Vec<Slot>,
    by_name: HashMap<Ident, usize>,
    by_definition: HashMap<usize, usize>,
    plugins: Vec<Rc<dyn Plugin>>,
}

impl<A: TreeAdapter> Registry<A> {
    /// Creates a registry with the default configuration.
    pub fn new(adapter: A, root: A::Node) -> AttrResult<Self> {
        Self::with_config(adapter, root, EngineConfig::default())
    }

    /// Creates a registry; the tree under `root` is walked and indexed
    /// immediately.
    pub fn with_config(adapter: A, root: A::Node, config: EngineConfig) -> AttrResult<Self> {
        let tree = Tree::new(adapter, root)?;
        let mut plugins: Vec<Rc<dyn Plugin>> = Vec::new();
        if config.trace.evaluations {
            plugins.push(Rc::new(TracePlugin::new()));
        }
        tracing::debug!(nodes = tree.index().len(), "registry created");
        Ok(Self {
            tree: Rc::new(tree),
            config,
            interner: Interner::new(),
            slots: Vec::new(),
            by_name: HashMap::new(),
            by_definition: HashMap::new(),
            plugins,
        })
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The shared tree state.
    pub fn tree(&self) -> &Rc<Tree<A>> {
        &self.tree
    }

    /// The current root node.
    pub fn root(&self) -> A::Node {
        self.tree.root()
    }

    /// Returns `true` if `node` was reachable from the root at the last walk.
    pub fn contains_node(&self, node: &A::Node) -> bool {
        self.tree.contains(node.node_key())
    }

    /// Attaches a plugin. It applies to attributes added from now on.
    pub fn plugin(&mut self, plugin: impl Plugin + 'static) -> &mut Self {
        tracing::debug!(plugin = plugin.name(), "plugin attached");
        self.plugins.push(Rc::new(plugin));
        self
    }

    /// Subscribes to the evaluation events of every attribute on this tree.
    pub fn subscribe(&self, listener: impl Fn(&Event) + 'static) {
        self.tree.events().subscribe(listener);
    }

    /// Reifies `definition` under `name`.
    ///
    /// Adding a definition that was already added returns the existing
    /// attribute, now also reachable under `name`. Eager attributes are
    /// evaluated for every node before this returns.
    pub fn add<R: Clone + 'static>(
        &mut self,
        name: &str,
        definition: Definition<A, R>,
    ) -> AttrResult<Attr<A, R>> {
        if self.contains(name) {
            return Err(AttrError::DuplicateAttribute {
                name: name.to_string(),
            });
        }
        if let Some(&slot) = self.by_definition.get(&definition.identity()) {
            let attr = self.typed::<R>(slot, name)?;
            let ident = self.interner.intern(name);
            self.by_name.insert(ident, slot);
            tracing::debug!(attr = name, alias_of = attr.label(), "attribute aliased");
            return Ok(attr);
        }

        let id = u32::try_from(self.slots.len())
            .map(AttrId::from_raw)
            .map_err(|_| AttrError::custom("attribute identifiers exhausted"))?;
        let mut options = definition.options(&self.config.defaults);
        let meta = AttrMeta {
            id,
            name,
            kind: definition.kind(),
        };
        for plugin in &self.plugins {
            plugin.remap(&meta, &mut options);
        }
        let cache = self.cache_for::<R>(&meta, &options);
        let ident = self.interner.intern(name);
        let core = Rc::new(AttrCore::new(
            id,
            ident,
            name,
            &definition,
            options,
            cache,
            self.plugins.clone(),
            Rc::clone(&self.tree),
        ));
        let erased: Rc<dyn DynAttr> = core.clone();
        for plugin in &self.plugins {
            plugin.reified(&erased);
        }
        erased.prime()?;

        tracing::debug!(attr = name, %id, kind = %meta.kind, ?options, "attribute added");
        let slot = self.slots.len();
        self.by_name.insert(ident, slot);
        self.by_definition.insert(definition.identity(), slot);
        self.slots.push(Slot {
            attr: erased,
            any: core.clone(),
            _definition: Box::new(definition),
        });
        Ok(Attr { core })
    }

    /// The first plugin-supplied store of the right type, otherwise the store
    /// `options.memoize` names.
    fn cache_for<R: 'static>(
        &self,
        meta: &AttrMeta<'_>,
        options: &AttrOptions,
    ) -> Box<dyn CacheStore<A::Node, R>> {
        if options.memoize != MemoMode::None {
            for plugin in &self.plugins {
                let Some(custom) = plugin.cache_store(meta, options) else {
                    continue;
                };
                match custom.into_store::<A::Node, R>() {
                    Some(store) => {
                        tracing::debug!(
                            attr = meta.name,
                            plugin = plugin.name(),
                            "plugin cache store installed"
                        );
                        return store;
                    }
                    None => tracing::warn!(
                        attr = meta.name,
                        plugin = plugin.name(),
                        "plugin cache store ignored: node or value type differs"
                    ),
                }
            }
        }
        new_store(options.memoize, options.lru_capacity)
    }

    /// Looks up the attribute added under `name`.
    pub fn attr<R: Clone + 'static>(&self, name: &str) -> AttrResult<Attr<A, R>> {
        let slot = self.slot_of(name)?;
        self.typed(slot, name)
    }

    /// Type-erased lookup of the attribute added under `name`.
    pub fn dyn_attr(&self, name: &str) -> AttrResult<Rc<dyn DynAttr>> {
        let slot = self.slot_of(name)?;
        Ok(Rc::clone(&self.slots[slot].attr))
    }

    /// The value of the attribute named `name` at `node`.
    ///
    /// Fails with [`AttrError::NodeNotFound`] if `node` is not part of the
    /// indexed tree.
    pub fn query<R: Clone + 'static>(&self, name: &str, node: &A::Node) -> AttrResult<R> {
        let attr = self.attr::<R>(name)?;
        let key = node.node_key();
        if !self.tree.contains(key) {
            return Err(AttrError::NodeNotFound { node: key });
        }
        attr.get(node)
    }

    /// Returns `true` if an attribute was added under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.interner
            .lookup(name)
            .is_some_and(|ident| self.by_name.contains_key(&ident))
    }

    /// Number of distinct reified attributes. Aliases are not counted.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if no attribute has been added.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// All names attributes were added under, aliases included, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .by_name
            .keys()
            .filter_map(|&ident| self.interner.name(ident))
            .collect();
        names.sort_unstable();
        names
    }

    /// Replaces the root node.
    ///
    /// The new tree is walked first; if it is invalid nothing changes.
    /// Afterwards values of nodes that are gone are discarded, inherited
    /// values of nodes whose ancestors changed are discarded, and eager
    /// attributes are evaluated again.
    pub fn set_root(&mut self, root: A::Node) -> AttrResult<Reindex> {
        let reindex = self.tree.replace_root(root)?;
        for slot in &self.slots {
            forget_all(&*slot.attr, &reindex.dropped);
            if slot.attr.invalidation_kind() == AttrKind::Inherited {
                forget_all(&*slot.attr, &reindex.moved);
            }
        }
        self.prime_all()?;
        Ok(reindex)
    }

    /// Announces that `node` was mutated in place.
    ///
    /// The subtree under `node` is walked again and caches are brought in
    /// line with it (see the module documentation).
    pub fn update(&mut self, node: &A::Node) -> AttrResult<Reindex> {
        let key = node.node_key();
        let reindex = self.tree.reindex(key).map_err(|err| match err {
            TreeError::NotIndexed(node) => AttrError::NodeNotFound { node },
            other => other.into(),
        })?;
        let policy = self.config.invalidation.inherited_on_update;
        let (ancestors, descendants) = {
            let index = self.tree.index();
            let descendants = match policy {
                InheritedPolicy::Subtree => index.descendants(key),
                InheritedPolicy::Keep | InheritedPolicy::All => Vec::new(),
            };
            (index.ancestors(key), descendants)
        };

        for slot in &self.slots {
            let attr = &*slot.attr;
            forget_all(attr, &reindex.dropped);
            attr.forget(key);
            match attr.invalidation_kind() {
                AttrKind::Synthetic => forget_all(attr, &ancestors),
                AttrKind::Inherited => {
                    forget_all(attr, &reindex.moved);
                    match policy {
                        InheritedPolicy::Keep => {}
                        InheritedPolicy::Subtree => forget_all(attr, &descendants),
                        InheritedPolicy::All => attr.invalidate(),
                    }
                }
                AttrKind::Derived | AttrKind::Transformed => {}
            }
        }
        tracing::debug!(
            node = %key,
            ancestors = ancestors.len(),
            dropped = reindex.dropped.len(),
            moved = reindex.moved.len(),
            ?policy,
            "node updated"
        );
        self.prime_all()?;
        Ok(reindex)
    }

    /// Discards every cached inherited value, including those of transformed
    /// attributes over inherited ones.
    pub fn invalidate_inherited(&self) {
        for slot in &self.slots {
            if slot.attr.invalidation_kind() == AttrKind::Inherited {
                slot.attr.invalidate();
            }
        }
    }

    /// Discards every cached value of every attribute.
    pub fn invalidate_all(&self) {
        for slot in &self.slots {
            slot.attr.invalidate();
        }
    }

    fn slot_of(&self, name: &str) -> AttrResult<usize> {
        self.interner
            .lookup(name)
            .and_then(|ident| self.by_name.get(&ident).copied())
            .ok_or_else(|| AttrError::AttributeNotFound {
                name: name.to_string(),
            })
    }

    fn typed<R: Clone + 'static>(&self, slot: usize, name: &str) -> AttrResult<Attr<A, R>> {
        let any = Rc::clone(&self.slots[slot].any);
        match any.downcast::<AttrCore<A, R>>() {
            Ok(core) => Ok(Attr { core }),
            Err(_) => Err(AttrError::AttributeTypeMismatch {
                name: name.to_string(),
                expected: type_name::<R>(),
            }),
        }
    }

    fn prime_all(&self) -> AttrResult<()> {
        for slot in &self.slots {
            slot.attr.prime()?;
        }
        Ok(())
    }
}

fn forget_all(attr: &dyn DynAttr, keys: &[NodeKey]) {
    for &key in keys {
        attr.forget(key);
    }
}
