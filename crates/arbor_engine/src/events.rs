//! Evaluation events.
//!
//! Every reified attribute reports two kinds of event to the [`EventBus`] of
//! its tree: [`EventKind::Invoked`] right before a definition's evaluator
//! runs, and [`EventKind::Produced`] whenever a value is handed out, whether
//! it came from the cache or from the evaluator. Listeners observe events
//! synchronously, in the order they happen.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use arbor_common::{Ident, NodeKey};
use serde::Serialize;

use crate::attr::AttrId;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// An evaluator was about to run.
    Invoked,
    /// A value was returned to a caller.
    Produced,
}

/// One evaluation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// What happened.
    pub kind: EventKind,
    /// The reified attribute involved.
    pub attr: AttrId,
    /// Interned name of the attribute.
    pub name: Ident,
    /// The node the value belongs to.
    pub node: NodeKey,
}

/// A subscribed event handler.
pub type Listener = Rc<dyn Fn(&Event)>;

/// Fan-out of events to subscribed listeners.
#[derive(Default)]
pub struct EventBus {
    listeners: RefCell<Vec<Listener>>,
}

impl EventBus {
    /// Creates a bus without listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener. Listeners cannot be removed.
    pub fn subscribe(&self, listener: impl Fn(&Event) + 'static) {
        self.listeners.borrow_mut().push(Rc::new(listener));
    }

    /// Number of subscribed listeners.
    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Returns `true` if nobody is listening.
    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }

    /// Delivers `event` to every listener in subscription order.
    ///
    /// Listeners may evaluate attributes or subscribe further listeners; the
    /// latter only see subsequent events.
    pub fn emit(&self, event: &Event) {
        if self.listeners.borrow().is_empty() {
            return;
        }
        let listeners = self.listeners.borrow().clone();
        for listener in &listeners {
            listener(event);
        }
    }
}

/// Counts events per attribute and node.
///
/// Clones share their counts, so one clone can be moved into a listener while
/// the other is inspected.
#[derive(Debug, Clone, Default)]
pub struct EvalCounter {
    counts: Rc<RefCell<HashMap<(EventKind, AttrId, NodeKey), usize>>>,
}

impl EvalCounter {
    /// Creates a counter with all counts at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a counter already subscribed to `bus`.
    pub fn attach(bus: &EventBus) -> Self {
        let counter = Self::new();
        bus.subscribe(counter.listener());
        counter
    }

    /// A listener that feeds this counter.
    pub fn listener(&self) -> impl Fn(&Event) + 'static {
        let counts = Rc::clone(&self.counts);
        move |event: &Event| {
            *counts
                .borrow_mut()
                .entry((event.kind, event.attr, event.node))
                .or_insert(0) += 1;
        }
    }

    /// Evaluator invocations of `attr` across all nodes.
    pub fn invocations(&self, attr: AttrId) -> usize {
        self.sum(|kind, id, _| kind == EventKind::Invoked && id == attr)
    }

    /// Evaluator invocations of `attr` at `node`.
    pub fn invocations_at(&self, attr: AttrId, node: NodeKey) -> usize {
        self.sum(|kind, id, key| kind == EventKind::Invoked && id == attr && key == node)
    }

    /// Evaluator invocations of every attribute.
    pub fn total_invocations(&self) -> usize {
        self.sum(|kind, _, _| kind == EventKind::Invoked)
    }

    /// Values of `attr` handed out across all nodes.
    pub fn productions(&self, attr: AttrId) -> usize {
        self.sum(|kind, id, _| kind == EventKind::Produced && id == attr)
    }

    /// Nodes at which `attr`'s evaluator has run at least once.
    pub fn invoked_nodes(&self, attr: AttrId) -> Vec<NodeKey> {
        let mut nodes: Vec<NodeKey> = self
            .counts
            .borrow()
            .keys()
            .filter(|(kind, id, _)| *kind == EventKind::Invoked && *id == attr)
            .map(|(_, _, node)| *node)
            .collect();
        nodes.sort();
        nodes
    }

    /// Resets every count to zero.
    pub fn reset(&self) {
        self.counts.borrow_mut().clear();
    }

    fn sum(&self, pred: impl Fn(EventKind, AttrId, NodeKey) -> bool) -> usize {
        self.counts
            .borrow()
            .iter()
            .filter(|((kind, id, node), _)| pred(*kind, *id, *node))
            .map(|(_, count)| count)
            .sum()
    }
}
