use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub analysis: AnalysisConfig,
    pub parser: ParserConfig,
    pub stats: StatsConfig,
    pub journal: JournalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub base_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub enabled: bool,
    pub ollama_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Maximum length, in characters, of a title derived from the user's input.
    pub title_max_chars: usize,
    /// Maximum number of entries kept in a category or mood list.
    pub max_tags: usize,
    /// Used when neither the reply nor the input yields a title.
    pub untitled_title: String,
    pub fallback_interpretation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    pub rating_min: i64,
    pub rating_max: i64,
    /// Rating shown for records that carry no valid rating.
    pub default_rating: i64,
    /// Records rated at or above this are counted as lucid.
    pub lucid_rating_threshold: i64,
    /// Case-insensitive marker in the narrative or categories that flags a lucid dream.
    pub lucid_keyword: String,
    pub high_vividness_threshold: f64,
    pub window_days: u32,
    pub histogram_top_n: usize,
    pub gallery_top_n: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    pub min_input_chars: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: "~/.dreamlog".to_string(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ollama_url: "http://localhost:11434".to_string(),
            model: "qwen2.5:3b".to_string(),
            temperature: 0.3,
            max_tokens: 1000,
            timeout_seconds: 120,
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            title_max_chars: 60,
            max_tags: 5,
            untitled_title: "İsimsiz Rüya".to_string(),
            fallback_interpretation: "Rüyanız ilginç semboller içeriyor.".to_string(),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            rating_min: 1,
            rating_max: 10,
            default_rating: 5,
            lucid_rating_threshold: 8,
            lucid_keyword: "lucid".to_string(),
            high_vividness_threshold: 7.0,
            window_days: 7,
            histogram_top_n: 6,
            gallery_top_n: 8,
        }
    }
}

impl StatsConfig {
    /// Whether `rating` lies inside the configured scale.
    pub fn is_valid_rating(&self, rating: i64) -> bool {
        (self.rating_min..=self.rating_max).contains(&rating)
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            min_input_chars: 10,
        }
    }
}

impl AppConfig {
    /// Load config from `~/.dreamlog/config.toml`, creating defaults if missing.
    pub fn load() -> Result<Self> {
        let base_dir = Self::default_base_dir()?;
        let config_path = base_dir.join("config.toml");

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = AppConfig::default();
            config.ensure_dirs()?;
            let toml_str = toml::to_string_pretty(&config)
                .map_err(|e| CoreError::Config(format!("failed to serialize config: {e}")))?;
            fs::write(&config_path, toml_str)?;
            Ok(config)
        }
    }

    /// Load config from a specific path (for testing or custom setups).
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("failed to read config: {e}")))?;
        let config: AppConfig = toml::from_str(&contents)
            .map_err(|e| CoreError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.stats.rating_min > self.stats.rating_max {
            return Err(CoreError::Config(format!(
                "stats.rating_min ({}) exceeds stats.rating_max ({})",
                self.stats.rating_min, self.stats.rating_max
            )));
        }
        if self.parser.max_tags == 0 {
            return Err(CoreError::Config("parser.max_tags must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Returns the resolved base directory (expands `~`).
    pub fn base_dir(&self) -> Result<PathBuf> {
        resolve_tilde(&self.storage.base_dir)
    }

    /// Returns the default base directory (`~/.dreamlog`).
    pub fn default_base_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Config("could not determine home directory".to_string()))?;
        Ok(home.join(".dreamlog"))
    }

    /// Returns the path to the SQLite database.
    pub fn db_path(&self) -> Result<PathBuf> {
        Ok(self.base_dir()?.join("dreamlog.db"))
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(self.base_dir()?)?;
        Ok(())
    }
}

/// Expand `~` to the user's home directory.
fn resolve_tilde(path: &str) -> Result<PathBuf> {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Config("could not determine home directory".to_string()))?;
        Ok(home.join(rest))
    } else if path == "~" {
        dirs::home_dir()
            .ok_or_else(|| CoreError::Config("could not determine home directory".to_string()))
    } else {
        Ok(PathBuf::from(path))
    }
}

/// Initialize tracing/logging with env filter.
///
/// Respects `RUST_LOG` env var. Defaults to `info` level. Logs go to stderr so
/// command output on stdout stays machine-readable.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.parser.title_max_chars, 60);
        assert_eq!(config.parser.max_tags, 5);
        assert_eq!(config.stats.rating_min, 1);
        assert_eq!(config.stats.rating_max, 10);
        assert_eq!(config.stats.default_rating, 5);
        assert_eq!(config.journal.min_input_chars, 10);
        assert!(config.analysis.enabled);
    }

    #[test]
    fn test_load_from_toml() {
        let toml_content = r#"
[storage]
base_dir = "/tmp/test-dreamlog"

[analysis]
model = "llama3.2"
temperature = 0.7

[stats]
lucid_keyword = "berrak"
window_days = 30
"#;
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(toml_content.as_bytes()).unwrap();

        let config = AppConfig::load_from(f.path()).unwrap();
        assert_eq!(config.storage.base_dir, "/tmp/test-dreamlog");
        assert_eq!(config.analysis.model, "llama3.2");
        assert!((config.analysis.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.stats.lucid_keyword, "berrak");
        assert_eq!(config.stats.window_days, 30);
        // defaults for fields not specified
        assert_eq!(config.stats.rating_max, 10);
        assert_eq!(config.analysis.ollama_url, "http://localhost:11434");
        assert_eq!(config.parser.untitled_title, "İsimsiz Rüya");
        assert_eq!(
            config.db_path().unwrap(),
            PathBuf::from("/tmp/test-dreamlog/dreamlog.db")
        );
    }

    #[test]
    fn test_load_rejects_inverted_rating_scale() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"[stats]\nrating_min = 10\nrating_max = 1\n").unwrap();

        let err = AppConfig::load_from(f.path()).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn test_ensure_dirs_creates_only_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("journal");
        let config = AppConfig {
            storage: StorageConfig {
                base_dir: base.to_string_lossy().into_owned(),
            },
            ..Default::default()
        };

        config.ensure_dirs().unwrap();
        assert!(base.is_dir());
        assert_eq!(fs::read_dir(&base).unwrap().count(), 0);
    }

    #[test]
    fn test_is_valid_rating() {
        let stats = StatsConfig::default();
        assert!(stats.is_valid_rating(1));
        assert!(stats.is_valid_rating(10));
        assert!(!stats.is_valid_rating(0));
        assert!(!stats.is_valid_rating(11));
    }
}
