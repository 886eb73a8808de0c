//! Transcript discovery and caching.
//!
//! Provides a trait-based interface for transcript providers (YouTube via
//! yt-dlp today) plus a durable per-episode cache. Both positive and
//! negative lookups are cached; transient provider errors are not.

mod cache;
mod youtube;

pub use cache::TranscriptCache;
pub use youtube::YoutubeProvider;

use crate::episodes::Episode;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal result of a transcript lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptStatus {
    Found,
    NotFound,
}

/// Cached transcript lookup for one episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptRecord {
    pub episode_id: i64,
    pub status: TranscriptStatus,
    #[serde(default)]
    pub video_id: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    /// Match confidence (0.0 to 1.0) for found transcripts.
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Why the match was selected or rejected.
    #[serde(default)]
    pub match_reason: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl TranscriptRecord {
    pub fn is_found(&self) -> bool {
        self.status == TranscriptStatus::Found
    }
}

/// Outcome of a provider lookup. Both variants are terminal and cacheable;
/// a provider signals transient trouble (network, tool failure) by
/// returning `Err` instead.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Found {
        video_id: String,
        source_url: String,
        text: String,
        confidence: f64,
        match_reason: String,
    },
    NotFound {
        reason: String,
    },
}

impl FetchOutcome {
    pub fn into_record(self, episode_id: i64) -> TranscriptRecord {
        match self {
            FetchOutcome::Found {
                video_id,
                source_url,
                text,
                confidence,
                match_reason,
            } => TranscriptRecord {
                episode_id,
                status: TranscriptStatus::Found,
                video_id: Some(video_id),
                source_url: Some(source_url),
                text: Some(text),
                confidence: Some(confidence),
                match_reason: Some(match_reason),
                fetched_at: Utc::now(),
            },
            FetchOutcome::NotFound { reason } => TranscriptRecord {
                episode_id,
                status: TranscriptStatus::NotFound,
                video_id: None,
                source_url: None,
                text: None,
                confidence: None,
                match_reason: Some(reason),
                fetched_at: Utc::now(),
            },
        }
    }
}

/// Trait for transcript providers.
#[async_trait]
pub trait TranscriptProvider: Send + Sync {
    /// Search for this episode and fetch its transcript if a confident
    /// match exists.
    async fn search_and_fetch(&self, episode: &Episode) -> Result<FetchOutcome>;
}
