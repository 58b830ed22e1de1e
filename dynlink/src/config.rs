//! Linker configuration.
//!
//! Configuration is read from TOML:
//!
//! ```toml
//! relink_policy = "chained"
//! max_chain_length = 8
//! unstable_relink_threshold = 8
//! type_filtering = true
//! ```
//!
//! Every key is optional.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a call site keeps bindings across relinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelinkPolicy {
    /// Keep only the most recent binding.
    #[default]
    Monomorphic,
    /// Keep up to `max_chain_length` bindings, newest first.
    Chained,
}

/// Tuning knobs for a dynamic linker and its call sites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkerConfig {
    pub relink_policy: RelinkPolicy,
    /// Bindings kept by a chained call site.
    pub max_chain_length: usize,
    /// Relinks after which a call site reports itself unstable to linkers.
    /// Zero disables the report.
    pub unstable_relink_threshold: u64,
    /// Skip linkers whose declared receiver types exclude the receiver.
    pub type_filtering: bool,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            relink_policy: RelinkPolicy::Monomorphic,
            max_chain_length: 8,
            unstable_relink_threshold: 8,
            type_filtering: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration syntax: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl LinkerConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: LinkerConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_chain_length == 0 {
            return Err(ConfigError::Invalid("max_chain_length must be at least 1".to_string()));
        }
        Ok(())
    }
}
