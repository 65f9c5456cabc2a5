// Engine configuration
// Deserializable from JSON; every field has a default.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parser::DEFAULT_MAX_DEPTH;

/// Default number of compiled expressions kept by the engine cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 512;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("max_depth must be at least 1")]
    ZeroMaxDepth,
}

/// Tunables for a [`crate::FilterEngine`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Maximum expression nesting accepted by the parser
    pub max_depth: usize,

    /// Compiled expressions to keep; 0 disables caching
    pub cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_depth: DEFAULT_MAX_DEPTH,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Load from a JSON object such as `{"max_depth": 64}`.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_cache_capacity(mut self, cache_capacity: usize) -> Self {
        self.cache_capacity = cache_capacity;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::ZeroMaxDepth);
        }
        Ok(())
    }
}
