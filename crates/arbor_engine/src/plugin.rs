//! Registry plugins.
//!
//! A plugin is attached to a [`Registry`](crate::Registry) and sees every
//! attribute added after it. It can adjust options before the attribute is
//! built ([`Plugin::remap`]), supply the attribute's cache
//! ([`Plugin::cache_store`]), receive the built attribute
//! ([`Plugin::reified`]), and wrap each evaluator invocation
//! ([`Plugin::around_eval`]). Wrappers nest in attachment order: the first
//! plugin attached is the outermost.

use std::cell::Cell;
use std::rc::Rc;

use arbor_common::NodeKey;

use crate::attr::{AttrId, DynAttr};
use crate::cache::CustomStore;
use crate::definition::{AttrKind, AttrOptions};
use crate::error::AttrResult;

/// Static facts about an attribute being added.
#[derive(Debug, Clone, Copy)]
pub struct AttrMeta<'a> {
    /// Identifier the attribute will receive.
    pub id: AttrId,
    /// Name under which the attribute is being added.
    pub name: &'a str,
    /// Evaluation strategy.
    pub kind: AttrKind,
}

/// One evaluator invocation about to happen.
#[derive(Debug, Clone, Copy)]
pub struct EvalCall<'a> {
    /// The attribute being evaluated.
    pub attr: AttrId,
    /// Name of the attribute.
    pub name: &'a str,
    /// Evaluation strategy.
    pub kind: AttrKind,
    /// The node being evaluated.
    pub node: NodeKey,
}

/// Hooks into attribute reification and evaluation.
pub trait Plugin {
    /// Human-readable plugin name.
    fn name(&self) -> &str;

    /// Adjusts the resolved options of an attribute before it is built.
    fn remap(&self, _meta: &AttrMeta<'_>, _options: &mut AttrOptions) {}

    /// Supplies the cache of a memoized attribute in place of the store its
    /// memoization mode names. The first plugin to answer wins; a store whose
    /// node or value type does not match the attribute is ignored.
    fn cache_store(&self, _meta: &AttrMeta<'_>, _options: &AttrOptions) -> Option<CustomStore> {
        None
    }

    /// Observes an attribute right after it is built.
    fn reified(&self, _attr: &Rc<dyn DynAttr>) {}

    /// Wraps one evaluator invocation.
    ///
    /// `next` runs the rest of the chain and finally the evaluator. A plugin
    /// that returns without calling `next` makes the evaluation fail with
    /// [`AttrError::EvaluationSkipped`](crate::AttrError::EvaluationSkipped).
    fn around_eval(
        &self,
        _call: &EvalCall<'_>,
        next: &mut dyn FnMut() -> AttrResult<()>,
    ) -> AttrResult<()> {
        next()
    }
}

/// Runs `inner` wrapped by every plugin in `plugins`, first one outermost.
pub(crate) fn run_chain(
    plugins: &[Rc<dyn Plugin>],
    call: &EvalCall<'_>,
    inner: &mut dyn FnMut() -> AttrResult<()>,
) -> AttrResult<()> {
    match plugins.split_first() {
        None => inner(),
        Some((first, rest)) => first.around_eval(call, &mut || run_chain(rest, call, inner)),
    }
}

/// Logs every evaluator invocation at `trace` level, with its nesting depth.
///
/// Attached automatically when `trace.evaluations` is enabled in the engine
/// configuration.
#[derive(Debug, Default)]
pub struct TracePlugin {
    depth: Cell<usize>,
}

impl TracePlugin {
    /// Creates the plugin.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Plugin for TracePlugin {
    fn name(&self) -> &str {
        "trace"
    }

    fn reified(&self, attr: &Rc<dyn DynAttr>) {
        tracing::trace!(
            attr = attr.label(),
            kind = %attr.kind(),
            options = ?attr.options(),
            "attribute reified"
        );
    }

    fn around_eval(
        &self,
        call: &EvalCall<'_>,
        next: &mut dyn FnMut() -> AttrResult<()>,
    ) -> AttrResult<()> {
        let depth = self.depth.get();
        self.depth.set(depth + 1);
        tracing::trace!(
            attr = call.name,
            kind = %call.kind,
            node = %call.node,
            depth,
            "evaluating"
        );
        let result = next();
        self.depth.set(depth);
        if let Err(err) = &result {
            tracing::trace!(attr = call.name, node = %call.node, error = %err, "evaluation failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AttrError;
    use std::cell::RefCell;

    struct Recorder {
        label: &'static str,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl Plugin for Recorder {
        fn name(&self) -> &str {
            self.label
        }

        fn around_eval(
            &self,
            _call: &EvalCall<'_>,
            next: &mut dyn FnMut() -> AttrResult<()>,
        ) -> AttrResult<()> {
            self.log.borrow_mut().push(format!("{} before", self.label));
            let result = next();
            self.log.borrow_mut().push(format!("{} after", self.label));
            result
        }
    }

    struct Veto;

    impl Plugin for Veto {
        fn name(&self) -> &str {
            "veto"
        }

        fn around_eval(
            &self,
            _call: &EvalCall<'_>,
            _next: &mut dyn FnMut() -> AttrResult<()>,
        ) -> AttrResult<()> {
            Ok(())
        }
    }

    fn call() -> EvalCall<'static> {
        EvalCall {
            attr: AttrId::from_raw(0),
            name: "x",
            kind: AttrKind::Synthetic,
            node: NodeKey::from_raw(1),
        }
    }

    #[test]
    fn first_plugin_is_outermost() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let plugins: Vec<Rc<dyn Plugin>> = vec![
            Rc::new(Recorder { label: "a", log: Rc::clone(&log) }),
            Rc::new(Recorder { label: "b", log: Rc::clone(&log) }),
        ];
        let inner_log = Rc::clone(&log);
        run_chain(&plugins, &call(), &mut || {
            inner_log.borrow_mut().push("eval".to_string());
            Ok(())
        })
        .unwrap();
        assert_eq!(
            *log.borrow(),
            vec!["a before", "b before", "eval", "b after", "a after"]
        );
    }

    #[test]
    fn skipping_plugin_stops_the_chain() {
        let ran = Cell::new(false);
        let plugins: Vec<Rc<dyn Plugin>> = vec![Rc::new(Veto)];
        run_chain(&plugins, &call(), &mut || {
            ran.set(true);
            Ok(())
        })
        .unwrap();
        assert!(!ran.get());
    }

    #[test]
    fn errors_propagate_through_wrappers() {
        let plugins: Vec<Rc<dyn Plugin>> = vec![Rc::new(TracePlugin::new())];
        let result = run_chain(&plugins, &call(), &mut || Err(AttrError::custom("bad")));
        assert_eq!(result, Err(AttrError::custom("bad")));
    }
}
