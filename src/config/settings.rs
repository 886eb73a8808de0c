//! Configuration settings for Podwise.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub episodes: EpisodeSettings,
    pub summarizer: SummarizerSettings,
    pub rate_limit: RateLimitSettings,
    pub youtube: YoutubeSettings,
    pub sheets: SheetsSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for application data (state file, caches).
    pub data_dir: String,
    /// Directory where markdown summaries are written.
    pub output_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.podwise".to_string(),
            output_dir: "~/Documents/PodcastNotes".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Episode database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EpisodeSettings {
    /// Path to the Apple Podcasts SQLite library.
    pub db_path: String,
    /// Earliest play date to consider (YYYY-MM-DD).
    pub since_date: String,
}

impl Default for EpisodeSettings {
    fn default() -> Self {
        Self {
            db_path: "~/Library/Group Containers/243LU875E5.groups.com.apple.podcasts/Documents/MTLibrary.sqlite".to_string(),
            since_date: "2025-01-01".to_string(),
        }
    }
}

/// Summarization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerSettings {
    /// Default model alias (see the model table; e.g. "sonnet", "haiku", "gpt-4o").
    pub default_model: String,
    /// Transcripts longer than this are split into chunks.
    pub max_chunk_chars: usize,
    /// Maximum completion tokens requested per call.
    pub max_tokens: u32,
    /// Bounded retry attempts on rate-limit errors.
    pub max_rate_limit_retries: u32,
}

impl Default for SummarizerSettings {
    fn default() -> Self {
        Self {
            default_model: "sonnet".to_string(),
            max_chunk_chars: 500_000,
            max_tokens: 4096,
            max_rate_limit_retries: 5,
        }
    }
}

/// Request pacing settings for the LLM provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Whether pacing is applied at all (overridden by --no-rate-limit).
    pub enabled: bool,
    /// Provider tokens-per-minute ceiling.
    pub tokens_per_minute: u64,
    /// Fraction of the ceiling actually used.
    pub safety_margin: f64,
    /// Floor for the per-request delay, in seconds.
    pub min_delay_seconds: f64,
    /// Ceiling for the per-request delay, in seconds.
    pub max_delay_seconds: f64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            tokens_per_minute: 30_000,
            safety_margin: 0.8,
            min_delay_seconds: 0.5,
            max_delay_seconds: 5.0,
        }
    }
}

/// YouTube transcript search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YoutubeSettings {
    /// Maximum search results considered per query variant.
    pub max_results: usize,
    /// Require higher match confidence before accepting a video.
    pub strict_matching: bool,
    /// Optional Netscape-format cookie file (exported out-of-band) passed
    /// to yt-dlp to avoid IP blocks.
    pub cookie_file: Option<String>,
}

impl Default for YoutubeSettings {
    fn default() -> Self {
        Self {
            max_results: 5,
            strict_matching: false,
            cookie_file: None,
        }
    }
}

/// Google Sheets export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsSettings {
    /// Worksheet tab that receives summary rows.
    pub tab_name: String,
    /// Append batches per minute ceiling.
    pub writes_per_minute: u32,
}

impl Default for SheetsSettings {
    fn default() -> Self {
        Self {
            tab_name: "Summary".to_string(),
            writes_per_minute: 50,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::PodwiseError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("podwise")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded markdown output directory path.
    pub fn output_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.output_dir)
    }

    /// Get the expanded Apple Podcasts database path.
    pub fn episode_db_path(&self) -> PathBuf {
        Self::expand_path(&self.episodes.db_path)
    }

    /// Path to the processing-state file.
    pub fn state_path(&self) -> PathBuf {
        self.data_dir().join("state.json")
    }

    /// Directory holding cached transcripts.
    pub fn transcript_cache_dir(&self) -> PathBuf {
        self.data_dir().join("transcripts")
    }

    /// Directory holding cached summaries.
    pub fn summary_cache_dir(&self) -> PathBuf {
        self.data_dir().join("summaries")
    }

    /// Parse the configured since-date.
    pub fn since_date(&self) -> crate::error::Result<chrono::NaiveDate> {
        chrono::NaiveDate::parse_from_str(&self.episodes.since_date, "%Y-%m-%d").map_err(|e| {
            crate::error::PodwiseError::Config(format!(
                "Invalid episodes.since_date '{}': {}",
                self.episodes.since_date, e
            ))
        })
    }
}
