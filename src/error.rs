//! Error types for Podwise.

use thiserror::Error;

/// Library-level error type for Podwise operations.
#[derive(Error, Debug)]
pub enum PodwiseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Episode database error: {0}")]
    EpisodeStore(String),

    #[error("Transcript fetch failed: {0}")]
    TranscriptFetch(String),

    #[error("State store error: {0}")]
    State(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Unknown model: {0}. Run 'podwise models' to see available aliases.")]
    UnknownModel(String),

    #[error("Malformed LLM response: {reason}. Response excerpt: {excerpt}")]
    MalformedResponse { reason: String, excerpt: String },

    #[error("Rate limited by provider")]
    RateLimited,

    #[error("Rate limit retries exhausted after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    #[error("LLM provider error: {0}")]
    Provider(String),

    #[error("Markdown write failed: {0}")]
    MarkdownSink(String),

    #[error("Spreadsheet export failed: {0}")]
    SheetsSink(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl PodwiseError {
    /// Whether this error indicates a configuration problem that should
    /// abort the whole batch rather than fail a single episode.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PodwiseError::Config(_)
                | PodwiseError::UnknownModel(_)
                | PodwiseError::InvalidStateTransition { .. }
        )
    }
}

/// Result type alias for Podwise operations.
pub type Result<T> = std::result::Result<T, PodwiseError>;
