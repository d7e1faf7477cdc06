//! Bottom-up evaluation.
//!
//! A synthetic value is cached together with the identity keys of the node's
//! children at evaluation time. A later lookup re-reads the children from the
//! adapter; if the keys differ the entry is stale and the node is evaluated
//! again. Children are only evaluated when the evaluator forces them.

use arbor_common::NodeIdentity;
use arbor_tree::TreeAdapter;

use crate::attr::AttrCore;
use crate::cache::Fingerprint;
use crate::context::SynContext;
use crate::definition::SyntheticFn;
use crate::error::AttrResult;

impl<A: TreeAdapter, R: Clone + 'static> AttrCore<A, R> {
    pub(crate) fn synthesize(&self, f: &SyntheticFn<A, R>, node: &A::Node) -> AttrResult<R> {
        let key = node.node_key();
        let children = self.tree.adapter().children(node);
        let fingerprint = Fingerprint::Children(children.keys());
        if let Some(value) = self.cached(key, &fingerprint) {
            return Ok(self.produced(key, value));
        }
        let recurse = |child: &A::Node| self.get(child);
        let value = self.invoke(key, &|| {
            let ctx = SynContext::new(node, &self.label, &children, &recurse);
            f(&ctx)
        })?;
        self.store(node, fingerprint, value.clone());
        Ok(self.produced(key, value))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    use arbor_tree::Children;

    use crate::{AttrError, Definition, EvalCounter, MemoMode, Registry, SynContext, TreeAdapter};

    /// Integer nodes whose children are looked up in a mutable edge table.
    #[derive(Clone, Default)]
    struct Table {
        edges: Rc<RefCell<HashMap<u32, Vec<u32>>>>,
    }

    impl Table {
        fn new(edges: &[(u32, Vec<u32>)]) -> Self {
            let table = Self::default();
            table.edges.borrow_mut().extend(edges.iter().cloned());
            table
        }

        fn set(&self, node: u32, children: Vec<u32>) {
            self.edges.borrow_mut().insert(node, children);
        }
    }

    impl TreeAdapter for Table {
        type Node = u32;

        fn children(&self, node: &u32) -> Children<u32> {
            Children::List(self.edges.borrow().get(node).cloned().unwrap_or_default())
        }
    }

    fn sum() -> Definition<Table, u32> {
        Definition::synthetic(|ctx: &SynContext<'_, Table, u32>| {
            Ok(*ctx.node() + ctx.child_values()?.into_iter().sum::<u32>())
        })
    }

    fn registry(table: &Table) -> Registry<Table> {
        Registry::new(table.clone(), 1).unwrap()
    }

    #[test]
    fn sums_subtree() {
        let table = Table::new(&[(1, vec![2, 3]), (3, vec![4])]);
        let mut reg = registry(&table);
        let total = reg.add("sum", sum()).unwrap();
        assert_eq!(total.get(&1), Ok(10));
        assert_eq!(total.get(&3), Ok(7));
    }

    #[test]
    fn requery_uses_cache() {
        let table = Table::new(&[(1, vec![2, 3])]);
        let mut reg = registry(&table);
        let counter = EvalCounter::attach(reg.tree().events());
        let total = reg.add("sum", sum()).unwrap();
        total.get(&1).unwrap();
        assert_eq!(counter.invocations(total.id()), 3);
        total.get(&1).unwrap();
        assert_eq!(counter.invocations(total.id()), 3);
    }

    #[test]
    fn unmemoized_recomputes() {
        let table = Table::new(&[(1, vec![2, 3])]);
        let mut reg = registry(&table);
        let counter = EvalCounter::attach(reg.tree().events());
        let total = reg.add("sum", sum().memoize(MemoMode::None)).unwrap();
        total.get(&1).unwrap();
        total.get(&1).unwrap();
        assert_eq!(counter.invocations(total.id()), 6);
        assert_eq!(total.cached_len(), 0);
    }

    #[test]
    fn changed_children_make_entry_stale() {
        let table = Table::new(&[(1, vec![2, 3])]);
        let mut reg = registry(&table);
        let total = reg.add("sum", sum()).unwrap();
        assert_eq!(total.get(&1), Ok(6));
        table.set(1, vec![2, 3, 5]);
        assert_eq!(total.get(&1), Ok(11));
    }

    #[test]
    fn ignored_children_are_not_evaluated() {
        let table = Table::new(&[(1, vec![2, 3]), (3, vec![4, 5])]);
        let mut reg = registry(&table);
        let counter = EvalCounter::attach(reg.tree().events());
        let first = reg
            .add(
                "first",
                Definition::synthetic(|ctx: &SynContext<'_, Table, u32>| match ctx.child(0) {
                    Some(child) => child.attr(),
                    None => Ok(*ctx.node()),
                }),
            )
            .unwrap();
        assert_eq!(first.get(&1), Ok(2));
        assert_eq!(counter.invoked_nodes(first.id()).len(), 2);
    }

    #[test]
    fn asking_for_a_grandchild_fails() {
        let table = Table::new(&[(1, vec![2]), (2, vec![3])]);
        let mut reg = registry(&table);
        let bad = reg
            .add(
                "bad",
                Definition::synthetic(|ctx: &SynContext<'_, Table, u32>| ctx.attr(&3)),
            )
            .unwrap();
        match bad.get(&1) {
            Err(AttrError::NoSuchChild { attr, child, .. }) => {
                assert_eq!(attr, "bad");
                assert_eq!(child, arbor_common::NodeIdentity::node_key(&3u32));
            }
            other => panic!("expected NoSuchChild, got {other:?}"),
        }
    }

    #[test]
    fn evaluator_errors_are_not_cached() {
        let table = Table::new(&[(1, vec![2])]);
        let mut reg = registry(&table);
        let fail = reg
            .add(
                "fail",
                Definition::synthetic(|ctx: &SynContext<'_, Table, u32>| {
                    if ctx.is_leaf() {
                        Err(AttrError::custom("leaf"))
                    } else {
                        ctx.child_values().map(|v| v.len() as u32)
                    }
                }),
            )
            .unwrap();
        assert_eq!(fail.get(&1), Err(AttrError::custom("leaf")));
        assert_eq!(fail.cached_len(), 0);
    }
}
