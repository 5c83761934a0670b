//! Engine tuning
//!
//! A small, serializable set of knobs for the resolution engine. Callers
//! that load these from disk parse the file themselves and hand the string
//! to [`EngineConfig::from_toml_str`]; the core performs no I/O.

use std::time::Duration;

use serde::Deserialize;

/// Tuning knobs for a resolution engine instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Hard cap on expression nesting depth.
    pub max_expression_depth: usize,

    /// Iteration cap for hidden-state fixed-point resolution.
    /// When unset, the cap is `2 * node_count + 10`.
    pub hidden_iteration_cap: Option<usize>,

    /// How long the scheduler waits after the last data-model change before
    /// starting a new pass, in milliseconds.
    pub debounce_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_expression_depth: 64,
            hidden_iteration_cap: None,
            debounce_ms: 50,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Effective hidden iteration cap for a tree of `node_count` nodes.
    pub fn hidden_cap_for(&self, node_count: usize) -> usize {
        self.hidden_iteration_cap.unwrap_or(2 * node_count + 10)
    }
}
