//! Runtime configuration
//!
//! Loaded from TOML at startup, falls back to defaults if no config file
//! exists or it cannot be parsed.

use crate::types::Strategy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TendrilConfig {
    /// Execution engine limits and strategy.
    pub engine: EngineConfig,
    /// Scheduler tick loop.
    pub scheduler: SchedulerConfig,
    /// Log filter and optional log file.
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Gas granted to each top-level invocation. One unit per evaluated node.
    pub gas_limit: u64,
    /// Default execution strategy for verbs.
    pub strategy: Strategy,
    /// Maximum nesting of lambda applications and verb calls.
    pub max_call_depth: usize,
    /// Maximum depth of expressions being evaluated at once, counted across
    /// function bodies and verb calls. Each level holds native stack.
    pub max_nesting: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Tick interval in milliseconds.
    pub tick_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// Default tracing filter when RUST_LOG is unset.
    pub filter: String,
    /// Append logs to this file in addition to stderr.
    pub file: Option<String>,
}

// ============================================================
// Defaults
// ============================================================

impl Default for EngineConfig {
    fn default() -> Self {
        Self { gas_limit: 100_000, strategy: Strategy::Interpret, max_call_depth: 128, max_nesting: 256 }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { tick_ms: 100 }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { filter: "tendril=info".into(), file: None }
    }
}

// ============================================================
// Loading
// ============================================================

impl TendrilConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match Self::from_toml(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {} - using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {} - using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}
