//! On-disk transcript cache, one JSON file per episode.

use super::{FetchOutcome, TranscriptProvider, TranscriptRecord};
use crate::episodes::Episode;
use crate::error::Result;
use std::path::PathBuf;
use tracing::debug;

/// Durable cache of transcript lookups keyed by episode id.
pub struct TranscriptCache {
    dir: PathBuf,
}

impl TranscriptCache {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn record_path(&self, episode_id: i64) -> PathBuf {
        self.dir.join(format!("{}.json", episode_id))
    }

    /// Load the cached record for an episode, if any.
    pub fn get(&self, episode_id: i64) -> Result<Option<TranscriptRecord>> {
        let path = self.record_path(episode_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let record: TranscriptRecord = serde_json::from_str(&content)?;
        Ok(Some(record))
    }

    /// Persist a record, replacing any previous one for the episode.
    pub fn store(&self, record: &TranscriptRecord) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let content = serde_json::to_string_pretty(record)?;
        std::fs::write(self.record_path(record.episode_id), content)?;
        Ok(())
    }

    /// Return the cached record, or run the provider and cache its outcome.
    ///
    /// Found and not-found outcomes are both cached. A provider error is
    /// propagated without writing anything, so the next run retries.
    pub async fn get_or_fetch(
        &self,
        episode: &Episode,
        provider: &dyn TranscriptProvider,
        force_refetch: bool,
    ) -> Result<TranscriptRecord> {
        if !force_refetch {
            if let Some(record) = self.get(episode.id)? {
                debug!(episode_id = episode.id, status = ?record.status, "transcript cache hit");
                return Ok(record);
            }
        }

        let outcome: FetchOutcome = provider.search_and_fetch(episode).await?;
        let record = outcome.into_record(episode.id);
        self.store(&record)?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PodwiseError;
    use crate::transcripts::TranscriptStatus;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct FakeProvider {
        outcome: fn() -> Result<FetchOutcome>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TranscriptProvider for FakeProvider {
        async fn search_and_fetch(&self, _episode: &Episode) -> Result<FetchOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }
    }

    fn episode() -> Episode {
        Episode {
            id: 42,
            title: "Test Episode".to_string(),
            podcast_name: "Test Podcast".to_string(),
            podcast_author: "Host".to_string(),
            duration_seconds: 3600.0,
            playhead_seconds: 3600.0,
            date_played: None,
            date_published: None,
            feed_url: None,
            guid: None,
        }
    }

    #[tokio::test]
    async fn test_found_outcome_is_cached() {
        let dir = tempdir().unwrap();
        let cache = TranscriptCache::new(dir.path().to_path_buf());
        let provider = FakeProvider {
            outcome: || {
                Ok(FetchOutcome::Found {
                    video_id: "abc123def45".to_string(),
                    source_url: "https://www.youtube.com/watch?v=abc123def45".to_string(),
                    text: "hello world".to_string(),
                    confidence: 0.9,
                    match_reason: "Channel matches podcast".to_string(),
                })
            },
            calls: AtomicUsize::new(0),
        };

        let first = cache
            .get_or_fetch(&episode(), &provider, false)
            .await
            .unwrap();
        assert!(first.is_found());

        let second = cache
            .get_or_fetch(&episode(), &provider, false)
            .await
            .unwrap();
        assert_eq!(second.text.as_deref(), Some("hello world"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_not_found_is_cached_but_force_refetches() {
        let dir = tempdir().unwrap();
        let cache = TranscriptCache::new(dir.path().to_path_buf());
        let provider = FakeProvider {
            outcome: || {
                Ok(FetchOutcome::NotFound {
                    reason: "No YouTube matches found".to_string(),
                })
            },
            calls: AtomicUsize::new(0),
        };

        let first = cache
            .get_or_fetch(&episode(), &provider, false)
            .await
            .unwrap();
        assert_eq!(first.status, TranscriptStatus::NotFound);

        cache
            .get_or_fetch(&episode(), &provider, false)
            .await
            .unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        cache
            .get_or_fetch(&episode(), &provider, true)
            .await
            .unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_provider_error_is_not_cached() {
        let dir = tempdir().unwrap();
        let cache = TranscriptCache::new(dir.path().to_path_buf());
        let provider = FakeProvider {
            outcome: || Err(PodwiseError::TranscriptFetch("network down".to_string())),
            calls: AtomicUsize::new(0),
        };

        let err = cache.get_or_fetch(&episode(), &provider, false).await;
        assert!(err.is_err());
        assert!(cache.get(42).unwrap().is_none());

        // Next run hits the provider again.
        let _ = cache.get_or_fetch(&episode(), &provider, false).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }
}
