//! Configuration management with YAML support

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub agents: HashMap<String, AgentConfig>,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub cleaner: CleanerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

/// Per-agent reader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub status: Option<String>, // 'active', 'frozen', 'deprecated'

    /// Overrides the agent's storage root
    #[serde(default)]
    pub base_path: Option<String>,
}

/// Search and indexing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_mode")]
    pub default_mode: String,

    #[serde(default = "default_rrf_k")]
    pub rrf_k: u32,

    #[serde(default = "default_fetch_limit")]
    pub keyword_fetch_limit: usize,

    #[serde(default = "default_fetch_limit")]
    pub semantic_fetch_limit: usize,

    #[serde(default = "default_min_score")]
    pub semantic_min_score: f32,

    #[serde(default = "default_strict_min_score")]
    pub semantic_strict_min_score: f32,

    #[serde(default = "default_semantic_model")]
    pub semantic_model: String,

    #[serde(default = "default_batch_size")]
    pub embedding_batch_size: usize,

    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,

    #[serde(default)]
    pub auto_embed_on_extraction: bool,
}

/// Text cleaner budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanerConfig {
    #[serde(default = "default_threshold")]
    pub threshold: usize,

    #[serde(default = "default_head_frac")]
    pub head_frac: f64,

    #[serde(default = "default_mid_frac")]
    pub mid_frac: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_database_path() -> String {
    "~/.local/share/gennie/gennie.db".to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_mode() -> String {
    "hybrid".to_string()
}

fn default_rrf_k() -> u32 {
    60
}

fn default_fetch_limit() -> usize {
    200
}

fn default_min_score() -> f32 {
    0.3
}

fn default_strict_min_score() -> f32 {
    0.5
}

fn default_semantic_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

fn default_batch_size() -> usize {
    64
}

fn default_max_page_size() -> usize {
    100
}

fn default_threshold() -> usize {
    2048
}

fn default_head_frac() -> f64 {
    0.4
}

fn default_mid_frac() -> f64 {
    0.2
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_mode: default_mode(),
            rrf_k: default_rrf_k(),
            keyword_fetch_limit: default_fetch_limit(),
            semantic_fetch_limit: default_fetch_limit(),
            semantic_min_score: default_min_score(),
            semantic_strict_min_score: default_strict_min_score(),
            semantic_model: default_semantic_model(),
            embedding_batch_size: default_batch_size(),
            max_page_size: default_max_page_size(),
            auto_embed_on_extraction: false,
        }
    }
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            head_frac: default_head_frac(),
            mid_frac: default_mid_frac(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    /// Searches in order:
    /// 1. Provided path
    /// 2. ./gennie.yaml (current directory)
    /// 3. ~/.config/gennie/gennie.yaml
    pub fn load(path: &str) -> Result<Self> {
        let search_paths = vec![
            shellexpand::tilde(path).to_string(),
            "gennie.yaml".to_string(),
            shellexpand::tilde("~/.config/gennie/gennie.yaml").to_string(),
        ];

        for search_path in &search_paths {
            if std::path::Path::new(search_path).exists() {
                let content = std::fs::read_to_string(search_path)
                    .with_context(|| format!("Failed to read config {}", search_path))?;
                let config: Config = serde_yaml::from_str(&content)
                    .with_context(|| format!("Invalid config {}", search_path))?;
                return Ok(config);
            }
        }

        Ok(Config::default())
    }

    /// Get the database path, expanding ~ to home directory
    pub fn database_path(&self) -> PathBuf {
        let expanded = shellexpand::tilde(&self.database.path).to_string();
        PathBuf::from(expanded)
    }

    /// Check if an agent reader is enabled
    /// Returns false if:
    /// - Agent is explicitly disabled
    /// - Agent status is 'frozen' or 'deprecated'
    pub fn is_agent_enabled(&self, agent: &str) -> bool {
        self.agents.get(agent).map_or(true, |a| {
            if !a.enabled {
                return false;
            }
            !matches!(a.status.as_deref(), Some("frozen") | Some("deprecated"))
        })
    }

    /// Get the storage root override for an agent, if configured
    pub fn agent_path(&self, agent: &str) -> Option<PathBuf> {
        self.agents
            .get(agent)
            .and_then(|a| a.base_path.as_ref())
            .map(|p| PathBuf::from(shellexpand::tilde(p).to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.search.rrf_k, 60);
        assert_eq!(config.search.max_page_size, 100);
        assert_eq!(config.cleaner.threshold, 2048);
        assert!(config.search.semantic_strict_min_score > config.search.semantic_min_score);
        assert!(config.is_agent_enabled("cursor"));
    }

    #[test]
    fn test_agent_enabled_with_frozen_status() {
        let mut config = Config::default();
        config.agents.insert(
            "copilot".to_string(),
            AgentConfig {
                enabled: true,
                status: Some("frozen".to_string()),
                base_path: None,
            },
        );
        assert!(!config.is_agent_enabled("copilot"));
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
database:
  path: ~/.local/share/gennie/test.db

agents:
  claude_code:
    enabled: true
    base_path: /tmp/claude
  cursor:
    enabled: false

search:
  rrf_k: 30
  semantic_strict_min_score: 0.7
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.database.path, "~/.local/share/gennie/test.db");
        assert!(config.is_agent_enabled("claude_code"));
        assert!(!config.is_agent_enabled("cursor"));
        assert_eq!(config.agent_path("claude_code"), Some(PathBuf::from("/tmp/claude")));
        assert_eq!(config.search.rrf_k, 30);
        assert_eq!(config.search.max_page_size, 100);
        assert_eq!(config.logging.level, "info");
    }
}
