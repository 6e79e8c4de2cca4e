use redline_editor::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_CONFIG_NAME: &str = "redline.config.json";

/// Redline configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Engine timing and budgets
    #[serde(default)]
    pub engine: EngineConfig,

    /// Characters per chunk when replaying a suggestion as a stream
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Colored terminal output
    #[serde(default = "default_color")]
    pub color: bool,
}

fn default_chunk_size() -> usize {
    16
}

fn default_color() -> bool {
    true
}

impl Config {
    /// Load config from a directory
    pub fn load(cwd: &str) -> anyhow::Result<Self> {
        let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            // Return default config if none exists
            Ok(Config::default())
        }
    }

    /// Apply the color preference to terminal output
    pub fn apply_color(&self) {
        if !self.color {
            colored::control::set_override(false);
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            chunk_size: default_chunk_size(),
            color: default_color(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "engine": { "throttleMs": 40, "contextBudget": 120 },
            "chunkSize": 4,
            "color": false
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.engine.throttle_ms, 40);
        assert_eq!(config.engine.context_budget, 120);
        assert_eq!(config.engine.save_debounce_ms, 2000);
        assert_eq!(config.chunk_size, 4);
        assert!(!config.color);
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.chunk_size, 16);
        assert!(config.color);
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = dir.path().display().to_string();

        assert_eq!(Config::load(&cwd).unwrap().chunk_size, 16);

        std::fs::write(dir.path().join(DEFAULT_CONFIG_NAME), r#"{ "chunkSize": 3 }"#).unwrap();
        assert_eq!(Config::load(&cwd).unwrap().chunk_size, 3);
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DEFAULT_CONFIG_NAME), "{ not json").unwrap();

        assert!(Config::load(&dir.path().display().to_string()).is_err());
    }
}
