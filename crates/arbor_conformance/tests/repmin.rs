//! The "replace every leaf with the tree's minimum" scenario: a synthetic
//! minimum, an inherited global minimum that depends on it, and a synthetic
//! rebuild that depends on both.

use arbor_conformance::{balanced_bin, bin_nodes, fork, leaf, random_bin, Bin, BinAdapter, BinNode};
use arbor_engine::{Attr, AttrError, Definition, InhContext, Registry, SynContext};
use rand::rngs::StdRng;
use rand::SeedableRng;

struct Repmin {
    min: Attr<BinAdapter, i64>,
    global_min: Attr<BinAdapter, i64>,
    repmin: Attr<BinAdapter, Bin>,
}

fn attach(reg: &mut Registry<BinAdapter>) -> Repmin {
    let min = reg
        .add(
            "min",
            Definition::synthetic(|ctx: &SynContext<'_, BinAdapter, i64>| match ctx.node().as_ref() {
                BinNode::Leaf(value) => Ok(*value),
                BinNode::Fork(..) => ctx
                    .child_values()?
                    .into_iter()
                    .min()
                    .ok_or_else(|| AttrError::custom("fork without children")),
            }),
        )
        .unwrap();

    let root_min = min.clone();
    let global_min = reg
        .add(
            "global_min",
            Definition::inherited(move |ctx: &InhContext<'_, BinAdapter, i64>| match ctx.parent() {
                Some(parent) => parent.attr(),
                None => root_min.get(ctx.node()),
            }),
        )
        .unwrap();

    let gmin = global_min.clone();
    let repmin = reg
        .add(
            "repmin",
            Definition::synthetic(move |ctx: &SynContext<'_, BinAdapter, Bin>| match ctx.node().as_ref() {
                BinNode::Leaf(_) => Ok(leaf(gmin.get(ctx.node())?)),
                BinNode::Fork(..) => {
                    let [left, right]: [Bin; 2] = ctx
                        .child_values()?
                        .try_into()
                        .map_err(|_| AttrError::custom("fork must have two children"))?;
                    Ok(fork(left, right))
                }
            }),
        )
        .unwrap();

    Repmin {
        min,
        global_min,
        repmin,
    }
}

fn sample() -> Bin {
    fork(leaf(3), fork(leaf(2), leaf(10)))
}

#[test]
fn min_at_root() {
    let root = sample();
    let mut reg = Registry::new(BinAdapter, root.clone()).unwrap();
    let attrs = attach(&mut reg);
    assert_eq!(attrs.min.get(&root), Ok(2));
}

#[test]
fn min_of_each_subtree() {
    let root = sample();
    let mut reg = Registry::new(BinAdapter, root.clone()).unwrap();
    let attrs = attach(&mut reg);
    let BinNode::Fork(left, right) = root.as_ref() else {
        panic!("sample root is a fork");
    };
    assert_eq!(attrs.min.get(left), Ok(3));
    assert_eq!(attrs.min.get(right), Ok(2));
}

#[test]
fn global_min_everywhere() {
    let root = sample();
    let mut reg = Registry::new(BinAdapter, root.clone()).unwrap();
    let attrs = attach(&mut reg);
    for node in bin_nodes(&root) {
        assert_eq!(attrs.global_min.get(&node), Ok(2));
    }
}

#[test]
fn repmin_replaces_every_leaf() {
    let root = sample();
    let mut reg = Registry::new(BinAdapter, root.clone()).unwrap();
    let attrs = attach(&mut reg);
    assert_eq!(
        attrs.repmin.get(&root),
        Ok(fork(leaf(2), fork(leaf(2), leaf(2))))
    );
}

#[test]
fn query_by_name() {
    let root = sample();
    let mut reg = Registry::new(BinAdapter, root.clone()).unwrap();
    attach(&mut reg);
    assert_eq!(reg.query::<i64>("global_min", &root), Ok(2));
    assert_eq!(
        reg.query::<Bin>("repmin", &root),
        Ok(fork(leaf(2), fork(leaf(2), leaf(2))))
    );
    assert_eq!(reg.names(), vec!["global_min", "min", "repmin"]);
}

#[test]
fn repeated_queries_agree() {
    let root = balanced_bin(4, -7);
    let mut reg = Registry::new(BinAdapter, root.clone()).unwrap();
    let attrs = attach(&mut reg);
    let first = attrs.repmin.get(&root).unwrap();
    let second = attrs.repmin.get(&root).unwrap();
    assert_eq!(first, second);
}

#[test]
fn repmin_is_a_fixed_point() {
    let root = sample();
    let mut reg = Registry::new(BinAdapter, root.clone()).unwrap();
    let once = attach(&mut reg).repmin.get(&root).unwrap();

    let mut again = Registry::new(BinAdapter, once.clone()).unwrap();
    let twice = attach(&mut again).repmin.get(&once).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn random_trees_collapse_to_their_minimum() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for leaves in [1, 2, 5, 17, 64] {
        let root = random_bin(&mut rng, leaves);
        let expected = bin_nodes(&root)
            .iter()
            .filter_map(|node| match node.as_ref() {
                BinNode::Leaf(value) => Some(*value),
                BinNode::Fork(..) => None,
            })
            .min()
            .unwrap();

        let mut reg = Registry::new(BinAdapter, root.clone()).unwrap();
        let attrs = attach(&mut reg);
        let rebuilt = attrs.repmin.get(&root).unwrap();
        for node in bin_nodes(&rebuilt) {
            if let BinNode::Leaf(value) = node.as_ref() {
                assert_eq!(*value, expected);
            }
        }
        assert_eq!(bin_nodes(&rebuilt).len(), bin_nodes(&root).len());
    }
}

#[test]
fn single_leaf_tree() {
    let root = leaf(42);
    let mut reg = Registry::new(BinAdapter, root.clone()).unwrap();
    let attrs = attach(&mut reg);
    assert_eq!(attrs.global_min.get(&root), Ok(42));
    assert_eq!(attrs.repmin.get(&root), Ok(leaf(42)));
}
