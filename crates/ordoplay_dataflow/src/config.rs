// SPDX-License-Identifier: MIT OR Apache-2.0
//! Engine configuration, stored as RON.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default cap on successful calculations within one recalculation
pub const DEFAULT_MAX_CALCULATIONS: usize = 1000;

/// Graph-wide policy for dependency cycles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecursionPolicy {
    /// Each node's `allow_recursion` flag decides
    #[default]
    PerNode,
    /// Every node may take part in a cycle
    AlwaysAllow,
    /// No cycles, regardless of node flags
    Forbid,
}

impl RecursionPolicy {
    /// Resolve the effective recursion permission for a node flag
    pub fn resolve(self, node_allows: bool) -> bool {
        match self {
            Self::PerNode => node_allows,
            Self::AlwaysAllow => true,
            Self::Forbid => false,
        }
    }
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Successful calculations allowed before a cascade is treated as runaway
    pub max_calculations: usize,
    /// Cycle policy
    pub recursion: RecursionPolicy,
    /// Recalculate automatically after connect, disconnect, delete and value edits
    pub auto_recalculate: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_calculations: DEFAULT_MAX_CALCULATIONS,
            recursion: RecursionPolicy::default(),
            auto_recalculate: true,
        }
    }
}

impl EngineConfig {
    /// Parse a config from a RON string
    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(source)?)
    }

    /// Serialize to pretty RON
    pub fn to_ron(&self) -> Result<String, ConfigError> {
        let config = ron::ser::PrettyConfig::default()
            .depth_limit(2)
            .separate_tuple_members(true);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Load a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_ron(&content)?;
        tracing::debug!("Loaded engine config from {:?}", path);
        Ok(config)
    }

    /// Save to a config file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.max_calculations, 1000);
        assert_eq!(config.recursion, RecursionPolicy::PerNode);
        assert!(config.auto_recalculate);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = EngineConfig::from_ron("(recursion: AlwaysAllow)").unwrap();
        assert_eq!(config.recursion, RecursionPolicy::AlwaysAllow);
        assert_eq!(config.max_calculations, DEFAULT_MAX_CALCULATIONS);
    }

    #[test]
    fn test_serialization() {
        let config = EngineConfig {
            max_calculations: 64,
            recursion: RecursionPolicy::Forbid,
            auto_recalculate: false,
        };
        let ron_str = config.to_ron().unwrap();
        let loaded = EngineConfig::from_ron(&ron_str).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_malformed_config() {
        assert!(matches!(
            EngineConfig::from_ron("(max_calculations: \"lots\")"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_policy_resolution() {
        assert!(RecursionPolicy::PerNode.resolve(true));
        assert!(!RecursionPolicy::PerNode.resolve(false));
        assert!(RecursionPolicy::AlwaysAllow.resolve(false));
        assert!(!RecursionPolicy::Forbid.resolve(true));
    }
}
