//! Engine tuning knobs.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Minimum interval between visible chunk updates
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,

    /// Quiet period before a debounced save is written
    #[serde(default = "default_save_debounce_ms")]
    pub save_debounce_ms: u64,

    /// Characters of surrounding text on each side of a selection
    #[serde(default = "default_context_budget")]
    pub context_budget: usize,

    /// Revisions kept for undo (0 = unlimited)
    #[serde(default = "default_history_levels")]
    pub history_levels: usize,
}

fn default_throttle_ms() -> u64 {
    80
}

fn default_save_debounce_ms() -> u64 {
    2000
}

fn default_context_budget() -> usize {
    400
}

fn default_history_levels() -> usize {
    100
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            throttle_ms: default_throttle_ms(),
            save_debounce_ms: default_save_debounce_ms(),
            context_budget: default_context_budget(),
            history_levels: default_history_levels(),
        }
    }
}

impl EngineConfig {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.throttle(), Duration::from_millis(80));
        assert_eq!(config.save_debounce(), Duration::from_secs(2));
        assert_eq!(config.context_budget, 400);
        assert_eq!(config.history_levels, 100);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{ "throttleMs": 20 }"#).unwrap();
        assert_eq!(config.throttle_ms, 20);
        assert_eq!(config.save_debounce_ms, 2000);
    }
}
