//! Error types for tree walking and reindexing.

use arbor_common::NodeKey;

/// Errors raised while (re)walking a host tree.
///
/// All are fatal for the walk that produced them: the index is left exactly
/// as it was before the walk started.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// The adapter reported the same node reachable through two paths.
    #[error(
        "{node} is reachable twice (under {} and under {})",
        display_parent(.first_parent),
        display_parent(.second_parent)
    )]
    DuplicateNode {
        /// The aliased node.
        node: NodeKey,
        /// Parent under which the node was first reached (`None` for the root).
        first_parent: Option<NodeKey>,
        /// Parent under which the node was reached again.
        second_parent: Option<NodeKey>,
    },

    /// A node was expected in the index but was never discovered by a walk.
    #[error("{0} is not part of the indexed tree")]
    NotIndexed(NodeKey),

    /// The index has handed out every slot number it can address.
    #[error("the tree index has no node slots left")]
    SlotsExhausted,
}

fn display_parent(parent: &Option<NodeKey>) -> String {
    match parent {
        Some(key) => key.to_string(),
        None => "the root".to_string(),
    }
}
