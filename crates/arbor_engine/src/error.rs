//! Error types for attribute definition, reification, and evaluation.

use arbor_common::NodeKey;
use arbor_tree::TreeError;

/// The result type of every attribute evaluation and registry operation.
pub type AttrResult<T> = Result<T, AttrError>;

/// Errors raised by the attribute engine.
///
/// All variants are raised synchronously at the call that triggered them and
/// are never retried by the engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttrError {
    /// The node is not reachable from the tree root.
    #[error("{node} was not found in the tree")]
    NodeNotFound {
        /// The node that was looked for.
        node: NodeKey,
    },

    /// A synthetic evaluator asked for the value of a node that is not one of
    /// the direct children of the node being evaluated.
    #[error("attribute '{attr}': {child} is not a direct child of {node}")]
    NoSuchChild {
        /// The attribute being evaluated.
        attr: String,
        /// The node being evaluated.
        node: NodeKey,
        /// The node the evaluator asked about.
        child: NodeKey,
    },

    /// The tree adapter produced an invalid tree.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// No attribute with this name has been added to the registry.
    #[error("attribute '{name}' has not been added")]
    AttributeNotFound {
        /// The requested name.
        name: String,
    },

    /// The attribute exists but produces values of a different type.
    #[error("attribute '{name}' does not produce values of type {expected}")]
    AttributeTypeMismatch {
        /// The requested name.
        name: String,
        /// The value type the caller asked for.
        expected: &'static str,
    },

    /// An attribute with this name already exists in the registry.
    #[error("attribute '{name}' is already defined")]
    DuplicateAttribute {
        /// The conflicting name.
        name: String,
    },

    /// A plugin returned without running the evaluator it wrapped.
    #[error("attribute '{attr}': a plugin skipped evaluation for {node}")]
    EvaluationSkipped {
        /// The attribute being evaluated.
        attr: String,
        /// The node being evaluated.
        node: NodeKey,
    },

    /// Failure reported by an evaluator itself.
    #[error("{0}")]
    Custom(String),
}

impl AttrError {
    /// Creates an evaluator-defined error.
    pub fn custom(message: impl Into<String>) -> Self {
        AttrError::Custom(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_such_child_display() {
        let err = AttrError::NoSuchChild {
            attr: "min".to_string(),
            node: NodeKey::from_raw(0x1),
            child: NodeKey::from_raw(0x2),
        };
        assert_eq!(
            err.to_string(),
            "attribute 'min': node#2 is not a direct child of node#1"
        );
    }

    #[test]
    fn tree_error_is_transparent() {
        let err: AttrError = TreeError::NotIndexed(NodeKey::from_raw(0xa)).into();
        assert_eq!(err.to_string(), "node#a is not part of the indexed tree");
    }

    #[test]
    fn custom_message() {
        assert_eq!(AttrError::custom("negative depth").to_string(), "negative depth");
    }

    #[test]
    fn type_mismatch_display() {
        let err = AttrError::AttributeTypeMismatch {
            name: "depth".to_string(),
            expected: "u32",
        };
        assert!(err.to_string().contains("type u32"));
    }
}
