//! Configuration types deserialized from `arbor.toml`.

use serde::{Deserialize, Serialize};

/// Default capacity of bounded (LRU) attribute caches.
pub const DEFAULT_LRU_CAPACITY: usize = 1024;

/// The top-level engine configuration parsed from `arbor.toml`.
///
/// Every section is optional; a missing section takes its default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Options applied to attributes whose definition leaves them unset.
    #[serde(default)]
    pub defaults: AttrDefaults,
    /// How mutation notifications reach inherited attribute caches.
    #[serde(default)]
    pub invalidation: InvalidationConfig,
    /// Evaluation tracing switches.
    #[serde(default)]
    pub trace: TraceConfig,
}

/// Memoization strategy backing a reified attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoMode {
    /// Recompute on every query.
    None,
    /// Unbounded cache keyed by node identity (default).
    #[default]
    Identity,
    /// Bounded cache with least-recently-used eviction.
    Lru,
}

/// Attribute options used when a definition does not set its own.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AttrDefaults {
    /// Memoization strategy.
    #[serde(default)]
    pub memoize: MemoMode,
    /// Capacity for [`MemoMode::Lru`] caches.
    #[serde(default = "default_lru_capacity")]
    pub lru_capacity: usize,
    /// Whether attributes evaluate the whole tree when attached.
    #[serde(default)]
    pub eager: bool,
}

impl Default for AttrDefaults {
    fn default() -> Self {
        Self {
            memoize: MemoMode::default(),
            lru_capacity: DEFAULT_LRU_CAPACITY,
            eager: false,
        }
    }
}

fn default_lru_capacity() -> usize {
    DEFAULT_LRU_CAPACITY
}

/// What `update(node)` does to cached inherited attribute values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InheritedPolicy {
    /// Leave inherited caches alone; callers invalidate them explicitly.
    #[default]
    Keep,
    /// Drop inherited values of the updated node and all its descendants.
    Subtree,
    /// Drop every cached inherited value.
    All,
}

/// Invalidation settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct InvalidationConfig {
    /// Policy for inherited attributes on `update(node)`.
    #[serde(default)]
    pub inherited_on_update: InheritedPolicy,
}

/// Tracing settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TraceConfig {
    /// Attach the evaluation tracing plugin to every attribute.
    #[serde(default)]
    pub evaluations: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.defaults.memoize, MemoMode::Identity);
        assert_eq!(config.defaults.lru_capacity, DEFAULT_LRU_CAPACITY);
        assert!(!config.defaults.eager);
        assert_eq!(config.invalidation.inherited_on_update, InheritedPolicy::Keep);
        assert!(!config.trace.evaluations);
    }

    #[test]
    fn memo_mode_lowercase_names() {
        let json = serde_json::to_string(&MemoMode::Lru).unwrap();
        assert_eq!(json, "\"lru\"");
        let mode: MemoMode = serde_json::from_str("\"none\"").unwrap();
        assert_eq!(mode, MemoMode::None);
    }

    #[test]
    fn policy_lowercase_names() {
        let policy: InheritedPolicy = serde_json::from_str("\"subtree\"").unwrap();
        assert_eq!(policy, InheritedPolicy::Subtree);
        assert!(serde_json::from_str::<InheritedPolicy>("\"Subtree\"").is_err());
    }
}
