//! TOML configuration for the engine and the rule-based policy.
//!
//! Every field is optional; omitted values keep their defaults.
//!
//! ```toml
//! [search]
//! max_depth = 5
//! branch_cap = 6
//! spawn_policy = "full_expectation"
//! parallel = true
//!
//! [rules]
//! threshold = 16
//! ```

use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::expectimax::ExpectimaxConfig;
use crate::rules::RulesConfig;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid toml: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub search: ExpectimaxConfig,
    pub rules: RulesConfig,
}

impl Config {
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        contents.parse()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.search.validate()?;
        self.rules.validate()
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cfg: Self = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expectimax::SpawnPolicy;

    #[test]
    fn empty_document_is_the_default() {
        assert_eq!("".parse::<Config>().unwrap(), Config::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg: Config = r#"
            [search]
            max_depth = 6
            spawn_policy = "full_expectation"
            fallback_seed = 42

            [rules]
            threshold = 16
        "#
        .parse()
        .unwrap();
        assert_eq!(cfg.search.max_depth, 6);
        assert_eq!(cfg.search.min_depth, 3);
        assert_eq!(cfg.search.branch_cap, 5);
        assert_eq!(cfg.search.spawn_policy, SpawnPolicy::FullExpectation);
        assert_eq!(cfg.search.fallback_seed, Some(42));
        assert_eq!(cfg.rules.threshold, 16);
        assert_eq!(cfg.rules.min_threshold, RulesConfig::default().min_threshold);
    }

    #[test]
    fn custom_weights_are_read_row_by_row() {
        let cfg: Config = r#"
            [search]
            weights = [[4.0, 3.0, 2.0, 1.0], [0.0, 0.0, 0.0, 0.0], [0.0, 0.0, 0.0, 0.0], [0.0, 0.0, 0.0, 0.5]]
        "#
        .parse()
        .unwrap();
        assert_eq!(cfg.search.weights[0], [4.0, 3.0, 2.0, 1.0]);
        assert_eq!(cfg.search.weights[3][3], 0.5);
    }

    #[test]
    fn rejects_invalid_values() {
        let err = "[search]\nmin_depth = 5\nmax_depth = 2\n".parse::<Config>().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{err}");
        let err = "[search]\nmax_dept = 2\n".parse::<Config>().unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)), "{err}");
        let err = "[search]\nspawn_policy = \"sometimes\"\n".parse::<Config>().unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)), "{err}");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Config::from_toml("/nonexistent/expectimax.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
