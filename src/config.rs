use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, Result};

const APP_DIR: &str = "auto-draft";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,

    /// Model catalog id that overrides the stored default.
    pub model: Option<String>,

    #[serde(default = "default_feed_timeout")]
    pub feed_timeout_secs: u64,

    #[serde(default = "default_feed_concurrency")]
    pub feed_concurrency: usize,

    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_secs: u64,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Record failed generations as `failed` instead of leaving them pending.
    #[serde(default)]
    pub mark_failed_ingestions: bool,

    #[serde(default = "default_topic_lease")]
    pub topic_lease_minutes: u32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR);
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("blog.db").to_string_lossy().to_string()
}

fn default_feed_timeout() -> u64 {
    10
}

fn default_feed_concurrency() -> usize {
    1
}

fn default_generation_timeout() -> u64 {
    180
}

fn default_max_output_tokens() -> u32 {
    4096
}

fn default_topic_lease() -> u32 {
    30
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            anthropic_api_key: None,
            openai_api_key: None,
            model: None,
            feed_timeout_secs: default_feed_timeout(),
            feed_concurrency: default_feed_concurrency(),
            generation_timeout_secs: default_generation_timeout(),
            max_output_tokens: default_max_output_tokens(),
            mark_failed_ingestions: false,
            topic_lease_minutes: default_topic_lease(),
            user_agent: default_user_agent(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load from `path`, writing a default file there if none exists.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str::<Config>(&content)?
        } else {
            let config = Config::default();
            config.save_to(path)?;
            config
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    pub fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.feed_timeout_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn topic_lease(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.topic_lease_minutes))
    }

    // Keys missing from the file fall back to the conventional env vars.
    fn apply_env(&mut self) {
        if self.anthropic_api_key.is_none() {
            self.anthropic_api_key = non_empty_env("ANTHROPIC_API_KEY");
        }
        if self.openai_api_key.is_none() {
            self.openai_api_key = non_empty_env("OPENAI_API_KEY");
        }
    }

    fn validate(&self) -> Result<()> {
        if self.feed_timeout_secs == 0 {
            return Err(AppError::Config("feed_timeout_secs must be positive".into()));
        }
        if self.generation_timeout_secs == 0 {
            return Err(AppError::Config(
                "generation_timeout_secs must be positive".into(),
            ));
        }
        if self.feed_concurrency == 0 {
            return Err(AppError::Config("feed_concurrency must be at least 1".into()));
        }
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();

        assert!(path.exists());
        assert_eq!(config.feed_timeout_secs, 10);
        assert_eq!(config.max_output_tokens, 4096);
        assert!(!config.mark_failed_ingestions);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "db_path = \"/tmp/blog.db\"\nmodel = \"gpt-4o\"\nmark_failed_ingestions = true\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();

        assert_eq!(config.db_path, "/tmp/blog.db");
        assert_eq!(config.model.as_deref(), Some("gpt-4o"));
        assert!(config.mark_failed_ingestions);
        assert_eq!(config.generation_timeout(), Duration::from_secs(180));
        assert_eq!(config.topic_lease(), chrono::Duration::minutes(30));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "feed_timeout_secs = 0\n").unwrap();

        assert!(matches!(Config::load_from(&path), Err(AppError::Config(_))));
    }
}
