//! LLM-based episode summarization.
//!
//! Short transcripts are summarized in a single extraction call; long ones
//! are split at sentence boundaries, each chunk summarized separately, and
//! the partial summaries merged with a synthesis call.

mod provider;
mod rate_limit;

pub use provider::{
    available_models, provider_for, resolve_model, AnthropicProvider, CompletionProvider,
    ModelSpec, OpenRouterProvider, Provider,
};
pub use rate_limit::{backoff_delay, estimate_tokens, RateLimiter};

use crate::config::{Prompts, SummarizerSettings};
use crate::episodes::Episode;
use crate::error::{PodwiseError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, instrument, warn};

/// Fixed category vocabulary the model is asked to pick from.
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "Tech",
    "Finance",
    "News",
    "Health",
    "Humor",
    "Science",
    "Business",
    "Relationships",
];

/// A named framework or mental model discussed in an episode.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Framework {
    pub name: String,
    pub description: String,
}

/// A quotable statement with attribution.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Soundbite {
    pub quote: String,
    pub speaker: String,
}

/// Books, people, tools, and links mentioned in an episode.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct References {
    pub books: Vec<String>,
    pub people: Vec<String>,
    pub tools: Vec<String>,
    pub links: Vec<String>,
}

/// Structured summary of one episode.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Summary {
    pub tldr: String,
    pub who_should_listen: String,
    pub key_insights: Vec<String>,
    pub frameworks: Vec<Framework>,
    pub soundbites: Vec<Soundbite>,
    pub takeaways: Vec<String>,
    pub references: References,
    pub categories: Vec<String>,
}

const REQUIRED_KEYS: &[&str] = &[
    "tldr",
    "who_should_listen",
    "key_insights",
    "frameworks",
    "soundbites",
    "takeaways",
    "references",
    "categories",
];

/// Parse a model response into a summary.
///
/// Tolerates code fences and surrounding prose by extracting the outermost
/// JSON object, then requires every summary key to be present.
pub fn parse_summary(response: &str) -> Result<Summary> {
    let excerpt = |s: &str| s.chars().take(200).collect::<String>();

    let start = response.find('{');
    let end = response.rfind('}');
    let (start, end) = match (start, end) {
        (Some(s), Some(e)) if e > s => (s, e),
        _ => {
            return Err(PodwiseError::MalformedResponse {
                reason: "no JSON object in response".to_string(),
                excerpt: excerpt(response),
            })
        }
    };

    let json: serde_json::Value =
        serde_json::from_str(&response[start..=end]).map_err(|e| {
            PodwiseError::MalformedResponse {
                reason: format!("invalid JSON: {}", e),
                excerpt: excerpt(&response[start..=end]),
            }
        })?;

    for key in REQUIRED_KEYS {
        if json.get(key).is_none() {
            return Err(PodwiseError::MalformedResponse {
                reason: format!("missing key '{}'", key),
                excerpt: excerpt(&response[start..=end]),
            });
        }
    }

    let summary: Summary =
        serde_json::from_value(json).map_err(|e| PodwiseError::MalformedResponse {
            reason: format!("unexpected shape: {}", e),
            excerpt: excerpt(&response[start..=end]),
        })?;

    Ok(normalize_summary(summary))
}

/// Clamp list lengths and category vocabulary to the documented bounds.
fn normalize_summary(mut summary: Summary) -> Summary {
    summary.key_insights.truncate(7);
    summary.soundbites.truncate(7);

    // At most 3 categories, at most one outside the fixed vocabulary.
    let mut categories = Vec::new();
    let mut novel_used = false;
    for category in summary.categories {
        if categories.len() >= 3 {
            break;
        }
        let known = DEFAULT_CATEGORIES
            .iter()
            .find(|c| c.eq_ignore_ascii_case(&category));
        let value = match known {
            Some(canonical) => canonical.to_string(),
            None if !novel_used => {
                novel_used = true;
                category
            }
            None => "Other".to_string(),
        };
        if !categories.contains(&value) {
            categories.push(value);
        }
    }
    if categories.is_empty() {
        categories.push("Other".to_string());
    }
    summary.categories = categories;
    summary
}

/// Split a transcript into chunks at sentence boundaries.
///
/// Text at or under the limit comes back as a single chunk. Splitting
/// prefers sentence ends; a single sentence longer than the limit becomes
/// its own oversized chunk rather than being cut mid-sentence.
pub fn chunk_transcript(text: &str, max_chars: usize) -> Vec<String> {
    if text.len() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        if !current.is_empty() && current.len() + sentence.len() + 1 > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(sentence.trim());
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Split on sentence-ending punctuation followed by whitespace.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if matches!(b, b'.' | b'?' | b'!') && bytes.get(i + 1) == Some(&b' ') {
            sentences.push(&text[start..=i]);
            start = i + 2;
        }
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

/// Summarizes transcripts through a completion provider, with chunking,
/// request pacing, and bounded retry on rate limits.
pub struct Summarizer {
    provider: Box<dyn CompletionProvider>,
    model: ModelSpec,
    prompts: Prompts,
    settings: SummarizerSettings,
    rate_limiter: Option<RateLimiter>,
}

impl Summarizer {
    pub fn new(
        provider: Box<dyn CompletionProvider>,
        model: ModelSpec,
        prompts: Prompts,
        settings: SummarizerSettings,
        rate_limiter: Option<RateLimiter>,
    ) -> Self {
        Self {
            provider,
            model,
            prompts,
            settings,
            rate_limiter,
        }
    }

    pub fn model_alias(&self) -> &str {
        self.model.alias
    }

    /// Summarize a transcript, chunking when it exceeds the configured
    /// threshold (one extraction call per chunk plus one synthesis call).
    #[instrument(skip(self, episode, transcript), fields(episode_id = episode.id))]
    pub async fn summarize(&mut self, episode: &Episode, transcript: &str) -> Result<Summary> {
        let chunks = chunk_transcript(transcript, self.settings.max_chunk_chars);

        if chunks.len() == 1 {
            let prompt = self.extraction_prompt(episode, &chunks[0], None);
            let response = self.complete_with_retry(&prompt).await?;
            return parse_summary(&response);
        }

        info!(
            episode_id = episode.id,
            chunks = chunks.len(),
            "transcript exceeds chunk limit, summarizing in parts"
        );

        let total = chunks.len();
        let mut partials = Vec::with_capacity(total);
        for (i, chunk) in chunks.iter().enumerate() {
            let prompt = self.extraction_prompt(episode, chunk, Some((i + 1, total)));
            let response = self.complete_with_retry(&prompt).await?;
            partials.push(format!("=== Part {} ===\n{}", i + 1, response));
        }

        let mut vars = HashMap::new();
        vars.insert("podcast_name".to_string(), episode.podcast_name.clone());
        vars.insert("episode_title".to_string(), episode.title.clone());
        vars.insert("chunk_summaries".to_string(), partials.join("\n\n"));
        let synthesis = self
            .prompts
            .render_with_custom(&self.prompts.synthesis.user, &vars);

        let response = self.complete_with_retry(&synthesis).await?;
        parse_summary(&response)
    }

    fn extraction_prompt(
        &self,
        episode: &Episode,
        transcript: &str,
        part: Option<(usize, usize)>,
    ) -> String {
        let title = match part {
            Some((i, n)) => format!("{} (Part {}/{})", episode.title, i, n),
            None => episode.title.clone(),
        };
        let host = if episode.podcast_author.is_empty() {
            "Unknown".to_string()
        } else {
            episode.podcast_author.clone()
        };

        let mut vars = HashMap::new();
        vars.insert("podcast_name".to_string(), episode.podcast_name.clone());
        vars.insert("episode_title".to_string(), title);
        vars.insert("host".to_string(), host);
        vars.insert("duration".to_string(), episode.duration_formatted());
        vars.insert("transcript".to_string(), transcript.to_string());
        self.prompts
            .render_with_custom(&self.prompts.extraction.user, &vars)
    }

    /// One paced completion call, retried with exponential backoff on 429
    /// up to the configured attempt limit.
    async fn complete_with_retry(&mut self, prompt: &str) -> Result<String> {
        let tokens = estimate_tokens(prompt);
        let max_attempts = self.settings.max_rate_limit_retries;

        for attempt in 0..=max_attempts {
            if let Some(limiter) = &mut self.rate_limiter {
                limiter.acquire(tokens).await;
            }

            match self
                .provider
                .complete(prompt, self.model.model_id, self.settings.max_tokens)
                .await
            {
                Err(PodwiseError::RateLimited) if attempt < max_attempts => {
                    let delay = backoff_delay(attempt);
                    warn!(
                        attempt = attempt + 1,
                        delay_secs = delay.as_secs(),
                        "rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(PodwiseError::RateLimited) => {
                    return Err(PodwiseError::RateLimitExceeded {
                        attempts: max_attempts + 1,
                    })
                }
                other => return other,
            }
        }

        unreachable!("retry loop always returns")
    }
}

/// Durable per-episode summary cache, one JSON file per episode.
pub struct SummaryCache {
    dir: PathBuf,
}

impl SummaryCache {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path(&self, episode_id: i64) -> PathBuf {
        self.dir.join(format!("{}.json", episode_id))
    }

    pub fn get(&self, episode_id: i64) -> Result<Option<Summary>> {
        let path = self.path(episode_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let summary = serde_json::from_str(&content)?;
        Ok(Some(summary))
    }

    /// Persist a summary, replacing any previous one.
    pub fn store(&self, episode_id: i64, summary: &Summary) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let content = serde_json::to_string_pretty(summary)?;
        std::fs::write(self.path(episode_id), content)?;
        debug!(episode_id, "cached summary");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn valid_response() -> String {
        serde_json::json!({
            "tldr": "An episode about markets.",
            "who_should_listen": "Investors.",
            "key_insights": ["Insight one", "Insight two"],
            "frameworks": [{"name": "Barbell", "description": "Avoid the middle"}],
            "soundbites": [{"quote": "Markets can stay irrational.", "speaker": "Jane Doe"}],
            "takeaways": ["Read more"],
            "references": {"books": [], "people": [], "tools": [], "links": []},
            "categories": ["Finance"]
        })
        .to_string()
    }

    struct ScriptedProvider {
        calls: Arc<AtomicUsize>,
        rate_limit_first_n: usize,
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        async fn complete(
            &self,
            _prompt: &str,
            _model_id: &str,
            _max_tokens: u32,
        ) -> Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.rate_limit_first_n {
                Err(PodwiseError::RateLimited)
            } else {
                Ok(valid_response())
            }
        }
    }

    fn episode() -> Episode {
        Episode {
            id: 9,
            title: "The Big Episode".to_string(),
            podcast_name: "Odd Lots".to_string(),
            podcast_author: "Joe and Tracy".to_string(),
            duration_seconds: 3600.0,
            playhead_seconds: 3600.0,
            date_played: Some(Utc::now()),
            date_published: None,
            feed_url: None,
            guid: None,
        }
    }

    fn summarizer(provider: ScriptedProvider, max_chunk_chars: usize) -> Summarizer {
        let settings = SummarizerSettings {
            max_chunk_chars,
            ..Default::default()
        };
        Summarizer::new(
            Box::new(provider),
            resolve_model("sonnet").unwrap(),
            Prompts::default(),
            settings,
            None,
        )
    }

    #[test]
    fn test_parse_summary_with_code_fence_and_prose() {
        let wrapped = format!("Here you go:\n```json\n{}\n```\nDone.", valid_response());
        let summary = parse_summary(&wrapped).unwrap();
        assert_eq!(summary.tldr, "An episode about markets.");
        assert_eq!(summary.categories, vec!["Finance"]);
    }

    #[test]
    fn test_parse_summary_missing_key() {
        let err = parse_summary(r#"{"tldr": "only this"}"#).unwrap_err();
        match err {
            PodwiseError::MalformedResponse { reason, .. } => {
                assert!(reason.contains("missing key"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_summary_no_json() {
        let err = parse_summary("I could not produce a summary.").unwrap_err();
        assert!(matches!(err, PodwiseError::MalformedResponse { .. }));
    }

    #[test]
    fn test_summary_json_round_trip() {
        let summary = parse_summary(&valid_response()).unwrap();
        let json = serde_json::to_value(&summary).unwrap();
        let reparsed: Summary = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(serde_json::to_value(&reparsed).unwrap(), json);
    }

    #[test]
    fn test_normalize_clamps_lists_and_categories() {
        let mut summary = Summary {
            key_insights: (0..10).map(|i| format!("insight {i}")).collect(),
            categories: vec![
                "tech".to_string(),
                "Quantum Gardening".to_string(),
                "Knitting".to_string(),
                "Finance".to_string(),
            ],
            ..Default::default()
        };
        summary = normalize_summary(summary);
        assert_eq!(summary.key_insights.len(), 7);
        // Known category canonicalized, one novel kept, second novel -> Other
        assert_eq!(
            summary.categories,
            vec!["Tech", "Quantum Gardening", "Other"]
        );
    }

    #[test]
    fn test_empty_categories_become_other() {
        let summary = normalize_summary(Summary::default());
        assert_eq!(summary.categories, vec!["Other"]);
    }

    #[test]
    fn test_chunk_transcript_short_text_single_chunk() {
        let chunks = chunk_transcript("Short text. Nothing to split.", 1000);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_chunk_transcript_splits_at_sentences() {
        let text = "First sentence here. Second sentence here. Third sentence here.";
        let chunks = chunk_transcript(text, 30);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.ends_with('.'), "chunk not on boundary: {chunk:?}");
        }
        let rejoined = chunks.join(" ");
        assert_eq!(rejoined, text);
    }

    #[tokio::test]
    async fn test_single_chunk_is_one_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = ScriptedProvider {
            calls: calls.clone(),
            rate_limit_first_n: 0,
        };
        let mut summarizer = summarizer(provider, 500_000);
        summarizer
            .summarize(&episode(), "A short transcript. Nothing fancy.")
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_chunked_transcript_makes_n_plus_one_calls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = ScriptedProvider {
            calls: calls.clone(),
            rate_limit_first_n: 0,
        };
        let mut summarizer = summarizer(provider, 40);
        let transcript = "One sentence here. Two sentence here. Three sentence here. \
                          Four sentence here. Five sentence here. Six sentence here.";
        let chunks = chunk_transcript(transcript, 40).len();
        assert!(chunks > 1);
        summarizer.summarize(&episode(), transcript).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), chunks + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_retries_then_succeeds() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = ScriptedProvider {
            calls: calls.clone(),
            rate_limit_first_n: 2,
        };
        let mut summarizer = summarizer(provider, 500_000);
        summarizer
            .summarize(&episode(), "A short transcript.")
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_exhaustion() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = ScriptedProvider {
            calls,
            rate_limit_first_n: usize::MAX,
        };
        let mut summarizer = summarizer(provider, 500_000);
        let err = summarizer
            .summarize(&episode(), "A short transcript.")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PodwiseError::RateLimitExceeded { attempts: 6 }
        ));
    }

    #[test]
    fn test_summary_cache_round_trip() {
        let dir = tempdir().unwrap();
        let cache = SummaryCache::new(dir.path().to_path_buf());
        assert!(cache.get(9).unwrap().is_none());

        let summary = parse_summary(&valid_response()).unwrap();
        cache.store(9, &summary).unwrap();
        let loaded = cache.get(9).unwrap().unwrap();
        assert_eq!(loaded.tldr, summary.tldr);
    }
}
