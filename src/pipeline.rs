//! Processing pipeline for podcast summarization.
//!
//! Coordinates the full workflow per episode: transcript lookup,
//! summarization, markdown output, and state transitions. Every step is
//! cached and state-checked, so interrupting and re-running a batch only
//! redoes the missing work.

use crate::config::Settings;
use crate::episodes::Episode;
use crate::error::Result;
use crate::markdown::MarkdownSink;
use crate::state::{ProcessingStatus, StateTracker, TransitionMeta};
use crate::summarizer::{
    provider_for, resolve_model, RateLimiter, Summarizer, Summary, SummaryCache,
};
use crate::transcripts::{TranscriptCache, TranscriptProvider, YoutubeProvider};
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use tracing::{info, instrument, warn};

/// Options controlling a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Re-process episodes that are already summarized or exported.
    pub force: bool,
    /// Retry episodes previously marked transcript-not-found.
    pub retry_not_found: bool,
    /// Concurrent transcript prefetch fan-out (0 disables prefetch).
    pub prefetch: usize,
}

/// Per-episode outcome of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Summary written to this markdown file.
    Summarized { output_file: PathBuf },
    /// Nothing to do; the state store says this episode is done.
    Skipped { reason: String },
    /// No transcript could be found (terminal until retried).
    NoTranscript { reason: String },
    /// A transient error; the episode is eligible again next run.
    Failed { error: String },
}

#[derive(Debug, Clone)]
pub struct EpisodeResult {
    pub episode_id: i64,
    pub podcast_name: String,
    pub episode_title: String,
    pub outcome: Outcome,
}

/// Episodes split into already-done and still-to-process.
pub struct RunPlan {
    pub skipped: Vec<EpisodeResult>,
    pub to_process: Vec<Episode>,
}

/// The main pipeline: wires the episode store's output through transcripts,
/// summarization, and the markdown sink, tracking state throughout.
pub struct Pipeline {
    state: StateTracker,
    transcript_cache: TranscriptCache,
    transcript_provider: Box<dyn TranscriptProvider>,
    summarizer: Summarizer,
    summary_cache: SummaryCache,
    markdown: MarkdownSink,
}

impl Pipeline {
    /// Build a pipeline from settings. Resolves the model alias up front
    /// so an unknown model aborts before any episode is touched.
    pub fn new(settings: &Settings, model: Option<&str>, rate_limit: bool) -> Result<Self> {
        let alias = model.unwrap_or(&settings.summarizer.default_model);
        let spec = resolve_model(alias)?;
        let provider = provider_for(&spec)?;

        let prompts = crate::config::Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let rate_limiter = if rate_limit && settings.rate_limit.enabled {
            Some(RateLimiter::new(settings.rate_limit.clone()))
        } else {
            None
        };

        let summarizer = Summarizer::new(
            provider,
            spec,
            prompts,
            settings.summarizer.clone(),
            rate_limiter,
        );

        Ok(Self {
            state: StateTracker::load(settings.state_path())?,
            transcript_cache: TranscriptCache::new(settings.transcript_cache_dir()),
            transcript_provider: Box::new(YoutubeProvider::new(settings.youtube.clone())),
            summarizer,
            summary_cache: SummaryCache::new(settings.summary_cache_dir()),
            markdown: MarkdownSink::new(settings.output_dir()),
        })
    }

    /// Build a pipeline from explicit components.
    pub fn with_components(
        state: StateTracker,
        transcript_cache: TranscriptCache,
        transcript_provider: Box<dyn TranscriptProvider>,
        summarizer: Summarizer,
        summary_cache: SummaryCache,
        markdown: MarkdownSink,
    ) -> Self {
        Self {
            state,
            transcript_cache,
            transcript_provider,
            summarizer,
            summary_cache,
            markdown,
        }
    }

    pub fn state(&self) -> &StateTracker {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut StateTracker {
        &mut self.state
    }

    pub fn summary_cache(&self) -> &SummaryCache {
        &self.summary_cache
    }

    pub fn model_alias(&self) -> &str {
        self.summarizer.model_alias()
    }

    /// Split episodes into already-done and to-process according to the
    /// state store and the force/retry flags. Mutates nothing.
    pub fn plan(&self, episodes: Vec<Episode>, options: &PipelineOptions) -> RunPlan {
        let mut skipped = Vec::new();
        let mut to_process = Vec::new();

        for episode in episodes {
            if self
                .state
                .should_process(episode.id, options.force, options.retry_not_found)
            {
                to_process.push(episode);
            } else {
                let status = self
                    .state
                    .get(episode.id)
                    .map(|r| r.status)
                    .unwrap_or(ProcessingStatus::Pending);
                let outcome = match status {
                    ProcessingStatus::TranscriptNotFound => Outcome::NoTranscript {
                        reason: "previously marked transcript-not-found (use --retry)".to_string(),
                    },
                    _ => Outcome::Skipped {
                        reason: format!("already {}", status),
                    },
                };
                skipped.push(EpisodeResult {
                    episode_id: episode.id,
                    podcast_name: episode.podcast_name,
                    episode_title: episode.title,
                    outcome,
                });
            }
        }

        RunPlan {
            skipped,
            to_process,
        }
    }

    /// Warm the transcript cache concurrently before the sequential run.
    /// Failures are left for the main loop to surface. Cached transcripts
    /// are reused; only not-found markers are refetched, under retry.
    pub async fn prefetch_transcripts(
        &self,
        episodes: &[Episode],
        retry_not_found: bool,
        concurrency: usize,
    ) {
        let cache = &self.transcript_cache;
        let provider = self.transcript_provider.as_ref();
        stream::iter(episodes)
            .map(|episode| async move {
                let refetch = retry_not_found
                    && matches!(
                        cache.get(episode.id),
                        Ok(Some(record)) if !record.is_found()
                    );
                if let Err(e) = cache.get_or_fetch(episode, provider, refetch).await {
                    warn!(episode_id = episode.id, "prefetch failed: {}", e);
                }
            })
            .buffer_unordered(concurrency.max(1))
            .collect::<Vec<()>>()
            .await;
    }

    /// Process one episode end to end.
    ///
    /// Returns `Err` only for fatal errors that should abort the whole
    /// batch; per-episode trouble comes back as a `Failed` outcome with
    /// the state store updated accordingly.
    #[instrument(skip(self, episode, options), fields(episode_id = episode.id))]
    pub async fn process_episode(
        &mut self,
        episode: &Episode,
        options: &PipelineOptions,
    ) -> Result<EpisodeResult> {
        let result = |outcome: Outcome| EpisodeResult {
            episode_id: episode.id,
            podcast_name: episode.podcast_name.clone(),
            episode_title: episode.title.clone(),
            outcome,
        };
        let meta = || TransitionMeta::for_episode(&episode.podcast_name, &episode.title);

        self.state
            .transition(episode.id, ProcessingStatus::FetchingTranscript, meta())?;

        // A cached transcript is never discarded: a refetch only replaces
        // a not-found marker, and only under the explicit retry flag.
        let refetch = options.retry_not_found
            && matches!(
                self.transcript_cache.get(episode.id),
                Ok(Some(record)) if !record.is_found()
            );
        let transcript = match self
            .transcript_cache
            .get_or_fetch(episode, self.transcript_provider.as_ref(), refetch)
            .await
        {
            Ok(record) => record,
            Err(e) if !e.is_fatal() => {
                let error = e.to_string();
                self.state.transition(
                    episode.id,
                    ProcessingStatus::Failed,
                    meta().with_error(error.clone()),
                )?;
                return Ok(result(Outcome::Failed { error }));
            }
            Err(e) => return Err(e),
        };

        if !transcript.is_found() {
            let reason = transcript
                .match_reason
                .unwrap_or_else(|| "no transcript found".to_string());
            self.state.transition(
                episode.id,
                ProcessingStatus::TranscriptNotFound,
                meta().with_error(reason.clone()),
            )?;
            return Ok(result(Outcome::NoTranscript { reason }));
        }

        self.state
            .transition(episode.id, ProcessingStatus::Summarizing, meta())?;

        let cached_summary = if options.force {
            None
        } else {
            self.summary_cache.get(episode.id)?
        };
        let summary: Summary = match cached_summary {
            Some(summary) => {
                info!(episode_id = episode.id, "reusing cached summary");
                summary
            }
            None => {
                let text = transcript.text.as_deref().unwrap_or_default();
                match self.summarizer.summarize(episode, text).await {
                    Ok(summary) => {
                        self.summary_cache.store(episode.id, &summary)?;
                        summary
                    }
                    Err(e) if !e.is_fatal() => {
                        let error = e.to_string();
                        self.state.transition(
                            episode.id,
                            ProcessingStatus::Failed,
                            meta().with_error(error.clone()),
                        )?;
                        return Ok(result(Outcome::Failed { error }));
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        self.state
            .transition(episode.id, ProcessingStatus::Summarized, meta())?;

        let output_file = match self.markdown.write_summary(
            episode,
            &summary,
            transcript.source_url.as_deref(),
            transcript.text.as_deref(),
        ) {
            Ok(path) => path,
            Err(e) => {
                let error = e.to_string();
                self.state.transition(
                    episode.id,
                    ProcessingStatus::Failed,
                    meta().with_error(error.clone()),
                )?;
                return Ok(result(Outcome::Failed { error }));
            }
        };

        let mut exported_meta = meta().with_output_file(output_file.display().to_string());
        if let Some(video_id) = &transcript.video_id {
            exported_meta = exported_meta.with_video_id(video_id.clone());
        }
        self.state
            .transition(episode.id, ProcessingStatus::Exported, exported_meta)?;

        Ok(result(Outcome::Summarized { output_file }))
    }
}
