//! Reading `arbor.toml`.

use std::path::Path;

use crate::error::ConfigError;
use crate::types::{EngineConfig, MemoMode};

/// Name of the configuration file [`load_config`] looks for.
pub const CONFIG_FILE_NAME: &str = "arbor.toml";

/// Reads `<dir>/arbor.toml`.
pub fn load_config(dir: &Path) -> Result<EngineConfig, ConfigError> {
    let path = dir.join(CONFIG_FILE_NAME);
    let content =
        std::fs::read_to_string(&path).map_err(|source| ConfigError::Read { path, source })?;
    load_config_from_str(&content)
}

/// Parses configuration text. Missing sections and keys take their defaults;
/// values the engine cannot honor are rejected.
pub fn load_config_from_str(content: &str) -> Result<EngineConfig, ConfigError> {
    let config: EngineConfig =
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &EngineConfig) -> Result<(), ConfigError> {
    if config.defaults.lru_capacity == 0 {
        return Err(ConfigError::Invalid {
            key: "defaults.lru_capacity",
            reason: "must be greater than zero",
        });
    }
    if config.defaults.eager && config.defaults.memoize == MemoMode::None {
        return Err(ConfigError::Invalid {
            key: "defaults.eager",
            reason: "has no effect when memoize is \"none\"",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InheritedPolicy;

    #[test]
    fn parse_empty_config() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[defaults]
memoize = "lru"
lru_capacity = 64
eager = true

[invalidation]
inherited_on_update = "all"

[trace]
evaluations = true
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.defaults.memoize, MemoMode::Lru);
        assert_eq!(config.defaults.lru_capacity, 64);
        assert!(config.defaults.eager);
        assert_eq!(config.invalidation.inherited_on_update, InheritedPolicy::All);
        assert!(config.trace.evaluations);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let toml = r#"
[defaults]
memoize = "none"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.defaults.memoize, MemoMode::None);
        assert_eq!(config.defaults.lru_capacity, crate::types::DEFAULT_LRU_CAPACITY);
    }

    #[test]
    fn zero_capacity_errors() {
        let toml = r#"
[defaults]
lru_capacity = 0
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "defaults.lru_capacity",
                ..
            }
        ));
    }

    #[test]
    fn eager_without_memo_errors() {
        let toml = r#"
[defaults]
memoize = "none"
eager = true
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(err.to_string().contains("eager"));
    }

    #[test]
    fn unknown_memo_mode_is_parse_error() {
        let toml = r#"
[defaults]
memoize = "weak"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[invalidation]\ninherited_on_update = \"subtree\"\n",
        )
        .unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(
            config.invalidation.inherited_on_update,
            InheritedPolicy::Subtree
        );
    }

    #[test]
    fn missing_file_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(dir.path()).unwrap_err();
        match err {
            ConfigError::Read { path, .. } => assert!(path.ends_with(CONFIG_FILE_NAME)),
            other => panic!("expected a read error, got {other}"),
        }
    }
}
