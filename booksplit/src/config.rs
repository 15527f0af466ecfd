//! booksplit configuration management.

use anyhow::Result;
use llm_client::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::SplitError;
use crate::patterns::{PatternConfig, PatternSettings};

const DEFAULT_WINDOW_SIZE: usize = 3000;
const DEFAULT_OVERLAP: usize = 500;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitterConfig {
    /// Nominal analysis window length in characters
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Characters shared by consecutive windows
    #[serde(default = "default_overlap")]
    pub overlap: usize,

    /// Proposals at or below this confidence are dropped unless their
    /// quality label says "good"
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    /// Fewer surviving proposals than this triggers the equal split
    #[serde(default = "default_min_segment_count")]
    pub min_segment_count: usize,

    /// Number of segments produced by the equal split
    #[serde(default = "default_fallback_segments")]
    pub fallback_segments: usize,

    /// Titles for equal-split segments; missing entries become 第N章
    #[serde(default)]
    pub fallback_titles: Vec<String>,

    /// Titles of earlier proposals included in each window prompt
    #[serde(default = "default_context_segments")]
    pub context_segments: usize,

    /// Neighbor context given to boundary rewrites
    #[serde(default = "default_rewrite_context_chars")]
    pub rewrite_context_chars: usize,

    /// Chunks shorter than this are fragments
    #[serde(default = "default_fragment_min_chars")]
    pub fragment_min_chars: usize,

    /// Minimum length of a complete chunk in the final validation
    #[serde(default = "default_complete_min_chars")]
    pub complete_min_chars: usize,

    /// Concurrent metadata requests during enrichment
    #[serde(default = "default_enrich_concurrency")]
    pub enrich_concurrency: usize,

    #[serde(default)]
    pub retry: RetrySettings,

    /// Overrides for the built-in pattern tables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patterns: Option<PatternSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f32,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_window_size() -> usize {
    DEFAULT_WINDOW_SIZE
}

fn default_overlap() -> usize {
    DEFAULT_OVERLAP
}

fn default_confidence_threshold() -> f32 {
    DEFAULT_CONFIDENCE_THRESHOLD
}

fn default_min_segment_count() -> usize {
    3
}

fn default_fallback_segments() -> usize {
    4
}

fn default_context_segments() -> usize {
    3
}

fn default_rewrite_context_chars() -> usize {
    200
}

fn default_fragment_min_chars() -> usize {
    30
}

fn default_complete_min_chars() -> usize {
    10
}

fn default_enrich_concurrency() -> usize {
    4
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_backoff_factor() -> f32 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_factor: default_backoff_factor(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            overlap: default_overlap(),
            confidence_threshold: default_confidence_threshold(),
            min_segment_count: default_min_segment_count(),
            fallback_segments: default_fallback_segments(),
            fallback_titles: Vec::new(),
            context_segments: default_context_segments(),
            rewrite_context_chars: default_rewrite_context_chars(),
            fragment_min_chars: default_fragment_min_chars(),
            complete_min_chars: default_complete_min_chars(),
            enrich_concurrency: default_enrich_concurrency(),
            retry: RetrySettings::default(),
            patterns: None,
        }
    }
}

impl SplitterConfig {
    /// Get the config file path: ~/.config/cli-programs/booksplit.toml
    pub fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("cli-programs")
            .join("booksplit.toml"))
    }

    /// Load config from file, returning default if file doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: SplitterConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Check the values the pipeline relies on.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.window_size == 0 {
            return Err(SplitError::InvalidConfig(
                "window_size must be greater than 0".to_string(),
            ));
        }
        if self.overlap.saturating_mul(2) >= self.window_size {
            return Err(SplitError::InvalidConfig(format!(
                "overlap ({}) must be less than half of window_size ({})",
                self.overlap, self.window_size
            )));
        }
        if self.fallback_segments == 0 {
            return Err(SplitError::InvalidConfig(
                "fallback_segments must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(SplitError::InvalidConfig(format!(
                "confidence_threshold must be within 0.0-1.0, got {}",
                self.confidence_threshold
            )));
        }
        if self.retry.backoff_factor < 1.0 {
            return Err(SplitError::InvalidConfig(format!(
                "retry.backoff_factor must be at least 1.0, got {}",
                self.retry.backoff_factor
            )));
        }
        Ok(())
    }

    /// Compile the pattern tables, applying any overrides.
    pub fn pattern_config(&self) -> crate::error::Result<PatternConfig> {
        match &self.patterns {
            Some(settings) => PatternConfig::from_settings(settings),
            None => Ok(PatternConfig::default()),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry.max_retries,
            initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            backoff_factor: self.retry.backoff_factor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SplitterConfig::default();
        assert_eq!(config.window_size, 3000);
        assert_eq!(config.overlap, 500);
        assert_eq!(config.confidence_threshold, 0.2);
        assert_eq!(config.min_segment_count, 3);
        assert_eq!(config.fallback_segments, 4);
        assert!(config.fallback_titles.is_empty());
        assert!(config.patterns.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_path() {
        let path = SplitterConfig::config_path();
        assert!(path.is_ok());
        let path = path.unwrap();
        assert!(path.ends_with("cli-programs/booksplit.toml"));
    }

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
window_size = 2000
overlap = 300
confidence_threshold = 0.5
fallback_titles = ["序", "破", "急"]

[retry]
max_retries = 5

[patterns]
terminal_punctuation = "。"
"#;
        let config: SplitterConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.window_size, 2000);
        assert_eq!(config.overlap, 300);
        assert_eq!(config.confidence_threshold, 0.5);
        assert_eq!(config.fallback_titles.len(), 3);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.initial_delay_ms, 1000);

        let patterns = config.pattern_config().unwrap();
        assert!(patterns.ends_with_terminal("終わり。"));
        assert!(!patterns.ends_with_terminal("The end."));
    }

    #[test]
    fn test_parse_empty_config() {
        let config: SplitterConfig = toml::from_str("").unwrap();
        assert_eq!(config.window_size, 3000);
        assert_eq!(config.fragment_min_chars, 30);
        assert_eq!(config.retry.backoff_factor, 2.0);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_window = SplitterConfig {
            window_size: 0,
            ..SplitterConfig::default()
        };
        assert!(matches!(zero_window.validate(), Err(SplitError::InvalidConfig(_))));

        let wide_overlap = SplitterConfig {
            overlap: 1500,
            ..SplitterConfig::default()
        };
        assert!(wide_overlap.validate().is_err());

        let bad_threshold = SplitterConfig {
            confidence_threshold: 1.5,
            ..SplitterConfig::default()
        };
        assert!(bad_threshold.validate().is_err());

        let no_fallback = SplitterConfig {
            fallback_segments: 0,
            ..SplitterConfig::default()
        };
        assert!(no_fallback.validate().is_err());
    }

    #[test]
    fn test_retry_policy_conversion() {
        let policy = SplitterConfig::default().retry_policy();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.initial_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(30));
    }

    #[test]
    fn test_save_and_load_roundtrip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("booksplit.toml");
        let config = SplitterConfig {
            window_size: 1234,
            ..SplitterConfig::default()
        };
        config.save_to(&path).unwrap();

        let loaded = SplitterConfig::load_from(&path).unwrap();
        assert_eq!(loaded.window_size, 1234);
        assert!(loaded.patterns.is_none());
    }

    #[test]
    fn test_missing_file_gives_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = SplitterConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded.window_size, 3000);
    }
}
