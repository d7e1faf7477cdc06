//! Errors raised while reading `arbor.toml`.

use std::path::PathBuf;

/// Why an engine configuration could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// The file that was read.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or does not match the expected schema.
    #[error("malformed configuration: {0}")]
    Parse(String),

    /// A setting holds a value the engine cannot use.
    #[error("invalid `{key}`: {reason}")]
    Invalid {
        /// Dotted path of the offending setting.
        key: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_names_the_setting() {
        let err = ConfigError::Invalid {
            key: "defaults.lru_capacity",
            reason: "must be greater than zero",
        };
        assert_eq!(
            err.to_string(),
            "invalid `defaults.lru_capacity`: must be greater than zero"
        );
    }

    #[test]
    fn read_error_shows_path_and_cause() {
        let err = ConfigError::Read {
            path: PathBuf::from("/tmp/arbor.toml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert_eq!(err.to_string(), "cannot read /tmp/arbor.toml: no such file");
        assert!(std::error::Error::source(&err).is_some());
    }
}
