//! YouTube transcript provider.
//!
//! Searches YouTube via yt-dlp, scores candidates against episode metadata
//! (guest names, channel, duration, title overlap), and downloads caption
//! tracks for the winning video.

use super::{FetchOutcome, TranscriptProvider};
use crate::config::YoutubeSettings;
use crate::episodes::Episode;
use crate::error::{PodwiseError, Result};
use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, instrument, warn};

/// A candidate video returned by a YouTube search.
#[derive(Debug, Clone)]
pub struct VideoCandidate {
    pub video_id: String,
    pub title: String,
    pub url: String,
    pub channel: Option<String>,
    pub duration_seconds: Option<f64>,
}

/// Result of scoring candidates against an episode.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub candidate: Option<VideoCandidate>,
    /// Normalized confidence, 0.0 to 1.0.
    pub confidence: f64,
    pub reason: String,
    pub guests_found: Vec<String>,
    pub guests_missing: Vec<String>,
}

/// Query strategies tried in order until one returns results.
const QUERY_VARIANTS: [QueryVariant; 4] = [
    QueryVariant::Primary,
    QueryVariant::GuestFocused,
    QueryVariant::ShortTitle,
    QueryVariant::TitleOnly,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryVariant {
    /// Cleaned podcast name plus guest names or truncated title.
    Primary,
    /// Podcast name plus extracted guest names only.
    GuestFocused,
    /// Podcast name plus first 40 characters of the title.
    ShortTitle,
    /// Title alone, for clip-sharing podcasts whose name never matches.
    TitleOnly,
}

/// YouTube transcript provider backed by yt-dlp.
pub struct YoutubeProvider {
    settings: YoutubeSettings,
    http: reqwest::Client,
    guest_start_re: Regex,
    guest_role_re: Regex,
    guest_with_re: Regex,
    guest_on_re: Regex,
    episode_number_re: Regex,
    ep_prefix_re: Regex,
    paren_suffix_re: Regex,
    pipe_suffix_re: Regex,
}

impl YoutubeProvider {
    pub fn new(settings: YoutubeSettings) -> Self {
        Self {
            settings,
            http: reqwest::Client::new(),
            // "John Smith:" or "John Smith & Jane Doe -" at the start
            guest_start_re: Regex::new(
                r"^([A-Z][a-z]+(?:\s+[A-Z][a-z]+)+)(?:\s*[&,]\s*(?:[A-Z][a-z]+(?:\s+[A-Z][a-z]+)+))*\s*[:\u{2013}\-]",
            )
            .expect("Invalid regex"),
            // "... Cloudflare CEO Matthew Prince ..."
            guest_role_re: Regex::new(
                r"\b(?:CEO|CTO|CFO|CPO|COO|CSO|President|Chairman|Co-Founder|Co-CEO)\s+([A-Z][a-z]+\s+[A-Z][a-z]+)",
            )
            .expect("Invalid regex"),
            // "with Sundar Pichai" -- case-sensitive so [A-Z][a-z]+ stays a name
            guest_with_re: Regex::new(r"\bwith\s+([A-Z][a-z]+\s+[A-Z][a-z]+)")
                .expect("Invalid regex"),
            // "Sam Altman on the Future of OpenAI"
            guest_on_re: Regex::new(r"^([A-Z][a-z]+(?:\s+[A-Z][a-z]+)+)\s+on\s+")
                .expect("Invalid regex"),
            episode_number_re: Regex::new(r"^#?\d+\s*[\-\u{2013}:]\s*").expect("Invalid regex"),
            ep_prefix_re: Regex::new(r"(?i)^Ep\.?\s*\d+\s*[\-\u{2013}:]\s*")
                .expect("Invalid regex"),
            paren_suffix_re: Regex::new(r"\s*\([^)]*\).*$").expect("Invalid regex"),
            pipe_suffix_re: Regex::new(r"\s*\|.*$").expect("Invalid regex"),
        }
    }

    /// Core podcast name: text before any parenthesized or piped suffix.
    fn clean_podcast_name(&self, name: &str) -> String {
        let name = self.paren_suffix_re.replace(name, "");
        let name = self.pipe_suffix_re.replace(&name, "");
        name.trim().to_string()
    }

    /// Title without episode-number prefixes or pipe suffixes.
    fn clean_title(&self, title: &str) -> String {
        let title = self.episode_number_re.replace(title, "");
        let title = self.ep_prefix_re.replace(&title, "");
        let title = self.pipe_suffix_re.replace(&title, "");
        title.trim().to_string()
    }

    /// Build a search query for an episode using the given strategy.
    /// Returns None when the variant has nothing to work with.
    pub fn build_search_query(&self, episode: &Episode, variant: QueryVariant) -> Option<String> {
        let podcast_name = self.clean_podcast_name(&episode.podcast_name);
        let title = self.clean_title(&episode.title);
        let guests = self.extract_guest_names(&episode.title);
        let guest_part = guests.join(" ");

        let query = match variant {
            QueryVariant::TitleOnly => truncate(&title, 60).to_string(),
            QueryVariant::ShortTitle => format!("{} {}", podcast_name, truncate(&title, 40)),
            QueryVariant::GuestFocused => {
                if guest_part.is_empty() {
                    return None;
                }
                format!("{} {}", podcast_name, guest_part)
            }
            QueryVariant::Primary => {
                if guest_part.is_empty() {
                    format!("{} {}", podcast_name, truncate(&title, 60))
                } else {
                    format!("{} {}", podcast_name, guest_part)
                }
            }
        };

        let query = query.trim().to_string();
        if query.is_empty() {
            None
        } else {
            Some(query)
        }
    }

    /// Extract guest names from an episode title using common patterns.
    pub fn extract_guest_names(&self, title: &str) -> Vec<String> {
        let mut guests = Vec::new();

        // "Christian Klein: SAP's Vision for AI" (possibly multiple names)
        if let Some(m) = self.guest_start_re.find(title) {
            let names_part = m
                .as_str()
                .trim_end_matches([':', '-', '\u{2013}'])
                .trim();
            for name in names_part.split(['&', ',']) {
                let name = name.trim();
                if is_likely_name(name) {
                    guests.push(name.to_string());
                }
            }
            if !guests.is_empty() {
                return guests;
            }
        }

        // "An Interview with Cloudflare CEO Matthew Prince"
        if let Some(caps) = self.guest_role_re.captures(title) {
            let name = caps[1].trim();
            if is_likely_name(name) {
                guests.push(name.to_string());
                return guests;
            }
        }

        // "The Future of AI with Sundar Pichai"
        if let Some(caps) = self.guest_with_re.captures(title) {
            let name = caps[1].trim();
            if is_likely_name(name) {
                guests.push(name.to_string());
            }
            return guests;
        }

        // "Sam Altman on the Future of OpenAI"
        if let Some(caps) = self.guest_on_re.captures(title) {
            let name = caps[1].trim();
            if name.split_whitespace().count() >= 2 {
                guests.push(name.to_string());
            }
            return guests;
        }

        guests
    }

    /// Score candidates and pick the best one.
    ///
    /// Scoring: +20 per guest name found in the video title, -25 per guest
    /// name missing, +15 for a channel matching the podcast name, +10 for
    /// duration within 10% (+5 within 20%), +1 per overlapping title word.
    /// The raw score is normalized over 50 into a 0-1 confidence, capped at
    /// 0.3 when expected guests are entirely absent.
    pub fn find_best_match(
        &self,
        episode: &Episode,
        candidates: &[VideoCandidate],
    ) -> MatchResult {
        if candidates.is_empty() {
            return MatchResult {
                candidate: None,
                confidence: 0.0,
                reason: "No YouTube matches found".to_string(),
                guests_found: Vec::new(),
                guests_missing: Vec::new(),
            };
        }

        let expected_guests = self.extract_guest_names(&episode.title);
        let podcast_name_clean = self.clean_podcast_name(&episode.podcast_name).to_lowercase();

        let mut best: Option<(i64, &VideoCandidate, Vec<String>, Vec<String>, Vec<String>)> = None;

        for candidate in candidates {
            let mut score: i64 = 0;
            let mut reasons = Vec::new();
            let mut guests_found = Vec::new();
            let mut guests_missing = Vec::new();

            for guest in &expected_guests {
                if name_appears_in_text(guest, &candidate.title) {
                    score += 20;
                    guests_found.push(guest.clone());
                    reasons.push(format!("Guest '{}' found in title", guest));
                } else {
                    score -= 25;
                    guests_missing.push(guest.clone());
                    reasons.push(format!("Guest '{}' not in title", guest));
                }
            }

            if let Some(channel) = &candidate.channel {
                let channel_lower = channel.to_lowercase();
                if channel_lower.contains(&podcast_name_clean)
                    || podcast_name_clean.contains(&channel_lower)
                {
                    score += 15;
                    reasons.push("Channel matches podcast".to_string());
                }
            }

            if let Some(duration) = candidate.duration_seconds {
                if episode.duration_seconds > 0.0 {
                    let diff = (duration - episode.duration_seconds).abs()
                        / episode.duration_seconds;
                    if diff < 0.1 {
                        score += 10;
                        reasons.push("Duration within 10%".to_string());
                    } else if diff < 0.2 {
                        score += 5;
                        reasons.push("Duration within 20%".to_string());
                    }
                }
            }

            let common = common_title_words(&episode.title, &candidate.title);
            if common > 0 {
                score += common as i64;
                reasons.push(format!("{} common words", common));
            }

            let better = match &best {
                Some((best_score, ..)) => score > *best_score,
                None => true,
            };
            if better {
                best = Some((score, candidate, guests_found, guests_missing, reasons));
            }
        }

        let (score, candidate, guests_found, guests_missing, reasons) =
            best.expect("candidates is non-empty");

        let mut confidence = (score.clamp(0, 50) as f64) / 50.0;
        // A title missing every expected guest is probably a different episode.
        if !expected_guests.is_empty() && guests_found.is_empty() {
            confidence = confidence.min(0.3);
        }

        let reason = if reasons.is_empty() {
            "Basic match".to_string()
        } else {
            reasons.join("; ")
        };

        MatchResult {
            candidate: Some(candidate.clone()),
            confidence: (confidence * 100.0).round() / 100.0,
            reason,
            guests_found,
            guests_missing,
        }
    }

    /// Validate a scored match against the confidence threshold
    /// (0.7 under strict matching, otherwise 0.5).
    pub fn validate_match(&self, episode: &Episode, result: &MatchResult) -> Option<String> {
        if result.candidate.is_none() {
            return Some("No match found".to_string());
        }

        let threshold = if self.settings.strict_matching { 0.7 } else { 0.5 };
        if result.confidence < threshold {
            return Some(format!(
                "Low confidence ({:.2} < {})",
                result.confidence, threshold
            ));
        }

        let expected = self.extract_guest_names(&episode.title);
        if !expected.is_empty() && result.guests_found.is_empty() {
            return Some(format!(
                "Expected guests {:?} not found in video title",
                expected
            ));
        }

        None
    }

    fn cookie_args(&self) -> Vec<String> {
        match &self.settings.cookie_file {
            Some(path) => vec![
                "--cookies".to_string(),
                shellexpand::tilde(path).to_string(),
            ],
            None => Vec::new(),
        }
    }

    /// Run a flat yt-dlp search and parse one JSON object per result line.
    async fn search(&self, query: &str) -> Result<Vec<VideoCandidate>> {
        let search_spec = format!("ytsearch{}:{}", self.settings.max_results, query);
        let mut args = vec![
            "--dump-json".to_string(),
            "--no-download".to_string(),
            "--no-warnings".to_string(),
            "--flat-playlist".to_string(),
            "--ignore-errors".to_string(),
        ];
        args.extend(self.cookie_args());
        args.push(search_spec);

        let output = tokio::process::Command::new("yt-dlp")
            .args(&args)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    PodwiseError::ToolNotFound("yt-dlp".to_string())
                } else {
                    PodwiseError::ToolFailed(format!("Failed to run yt-dlp: {}", e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PodwiseError::ToolFailed(format!(
                "yt-dlp search failed: {}",
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut candidates = Vec::new();
        for line in stdout.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let Ok(json) = serde_json::from_str::<serde_json::Value>(line) else {
                continue;
            };
            let Some(video_id) = json["id"].as_str() else {
                continue;
            };
            candidates.push(VideoCandidate {
                video_id: video_id.to_string(),
                title: json["title"].as_str().unwrap_or("").to_string(),
                url: json["url"]
                    .as_str()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| {
                        format!("https://www.youtube.com/watch?v={}", video_id)
                    }),
                channel: json["channel"]
                    .as_str()
                    .or_else(|| json["uploader"].as_str())
                    .map(|s| s.to_string()),
                duration_seconds: json["duration"].as_f64(),
            });
        }

        Ok(candidates)
    }

    /// Search with fallback query strategies, returning the first
    /// non-empty result set.
    async fn search_with_fallback(&self, episode: &Episode) -> Result<Vec<VideoCandidate>> {
        for variant in QUERY_VARIANTS {
            let Some(query) = self.build_search_query(episode, variant) else {
                continue;
            };
            debug!(?variant, %query, "searching YouTube");
            let candidates = self.search(&query).await?;
            if !candidates.is_empty() {
                return Ok(candidates);
            }
        }
        Ok(Vec::new())
    }

    /// Fetch the caption track for a video. Returns None when the video has
    /// no usable English captions; errors are transient (tool or network).
    async fn fetch_captions(&self, video_id: &str) -> Result<Option<String>> {
        let url = format!("https://www.youtube.com/watch?v={}", video_id);
        let mut args = vec![
            "--dump-json".to_string(),
            "--no-download".to_string(),
            "--no-warnings".to_string(),
        ];
        args.extend(self.cookie_args());
        args.push(url);

        let output = tokio::process::Command::new("yt-dlp")
            .args(&args)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    PodwiseError::ToolNotFound("yt-dlp".to_string())
                } else {
                    PodwiseError::ToolFailed(format!("Failed to run yt-dlp: {}", e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PodwiseError::ToolFailed(format!(
                "yt-dlp metadata fetch failed for {}: {}",
                video_id,
                stderr.trim()
            )));
        }

        let json: serde_json::Value =
            serde_json::from_str(&String::from_utf8_lossy(&output.stdout)).map_err(|e| {
                PodwiseError::ToolFailed(format!("Failed to parse yt-dlp output: {}", e))
            })?;

        let Some(track_url) = caption_track_url(&json) else {
            return Ok(None);
        };

        let response = self.http.get(&track_url).send().await?;
        if !response.status().is_success() {
            return Err(PodwiseError::TranscriptFetch(format!(
                "Caption download for {} returned HTTP {}",
                video_id,
                response.status()
            )));
        }
        let body: serde_json::Value = response.json().await?;
        Ok(parse_json3_captions(&body))
    }
}

#[async_trait]
impl TranscriptProvider for YoutubeProvider {
    #[instrument(skip(self, episode), fields(episode_id = episode.id))]
    async fn search_and_fetch(&self, episode: &Episode) -> Result<FetchOutcome> {
        let candidates = self.search_with_fallback(episode).await?;
        if candidates.is_empty() {
            return Ok(FetchOutcome::NotFound {
                reason: "No YouTube matches found".to_string(),
            });
        }

        let result = self.find_best_match(episode, &candidates);
        if let Some(rejection) = self.validate_match(episode, &result) {
            if let Some(candidate) = &result.candidate {
                warn!(
                    video_title = %candidate.title,
                    confidence = result.confidence,
                    "rejected YouTube match: {}",
                    rejection
                );
            }
            return Ok(FetchOutcome::NotFound { reason: rejection });
        }

        let candidate = result.candidate.expect("validated match has a candidate");
        match self.fetch_captions(&candidate.video_id).await? {
            Some(text) => Ok(FetchOutcome::Found {
                video_id: candidate.video_id.clone(),
                source_url: format!(
                    "https://www.youtube.com/watch?v={}",
                    candidate.video_id
                ),
                text,
                confidence: result.confidence,
                match_reason: result.reason,
            }),
            None => Ok(FetchOutcome::NotFound {
                reason: format!("Video {} has no English captions", candidate.video_id),
            }),
        }
    }
}

/// Truncate at a char boundary without splitting a codepoint.
fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Words that start titles but are never someone's first name.
const NON_NAME_WORDS: &[&str] = &[
    "weekly", "daily", "monthly", "annual", "special", "bonus", "live", "episode", "update",
    "news", "market", "breaking", "exclusive", "part", "volume", "series", "chapter", "intro",
    "outro", "preview", "the", "and", "with", "for", "from", "about", "into", "over",
];

fn is_likely_name(text: &str) -> bool {
    let parts: Vec<&str> = text.split_whitespace().collect();
    if parts.len() < 2 {
        return false;
    }
    if NON_NAME_WORDS.contains(&parts[0].to_lowercase().as_str()) {
        return false;
    }
    parts
        .iter()
        .all(|p| p.chars().next().is_some_and(|c| c.is_uppercase()))
}

/// Whether a guest name appears in text, allowing split first/last names
/// and "First L." abbreviations.
fn name_appears_in_text(name: &str, text: &str) -> bool {
    let text_lower = text.to_lowercase();
    let name_lower = name.to_lowercase();

    if text_lower.contains(&name_lower) {
        return true;
    }

    let parts: Vec<&str> = name_lower.split_whitespace().collect();
    if parts.len() < 2 {
        return false;
    }
    let first = parts[0];
    let last = parts[parts.len() - 1];

    if text_lower.contains(first) && text_lower.contains(last) {
        return true;
    }

    // "First L." abbreviation
    if let Some(initial) = last.chars().next() {
        let pattern = format!("{} {}", first, initial);
        if text_lower.contains(&pattern) {
            return true;
        }
    }

    // Distinctive last name alone, on a word boundary
    text_lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word == last)
}

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "is", "it", "|", "-", "\u{2013}",
];

fn common_title_words(a: &str, b: &str) -> usize {
    let words = |s: &str| -> std::collections::HashSet<String> {
        s.to_lowercase()
            .split_whitespace()
            .filter(|w| !STOP_WORDS.contains(w))
            .map(|w| w.to_string())
            .collect()
    };
    words(a).intersection(&words(b)).count()
}

/// Preferred English caption languages, manual tracks first.
const CAPTION_LANGS: &[&str] = &["en", "en-US", "en-GB", "en-orig"];

/// Pick a json3 caption track URL from yt-dlp video metadata.
fn caption_track_url(info: &serde_json::Value) -> Option<String> {
    for field in ["subtitles", "automatic_captions"] {
        let Some(tracks) = info[field].as_object() else {
            continue;
        };
        for lang in CAPTION_LANGS {
            let Some(formats) = tracks.get(*lang).and_then(|v| v.as_array()) else {
                continue;
            };
            for format in formats {
                if format["ext"].as_str() == Some("json3") {
                    if let Some(url) = format["url"].as_str() {
                        return Some(url.to_string());
                    }
                }
            }
        }
    }
    None
}

/// Flatten a json3 caption document into plain text.
fn parse_json3_captions(body: &serde_json::Value) -> Option<String> {
    let events = body["events"].as_array()?;
    let mut text = String::new();
    for event in events {
        let Some(segs) = event["segs"].as_array() else {
            continue;
        };
        for seg in segs {
            if let Some(s) = seg["utf8"].as_str() {
                text.push_str(s);
            }
        }
        if !text.ends_with(' ') {
            text.push(' ');
        }
    }
    let cleaned: String = text.replace('\n', " ").split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn provider() -> YoutubeProvider {
        YoutubeProvider::new(YoutubeSettings::default())
    }

    fn episode(podcast: &str, title: &str, duration: f64) -> Episode {
        Episode {
            id: 1,
            title: title.to_string(),
            podcast_name: podcast.to_string(),
            podcast_author: "Host".to_string(),
            duration_seconds: duration,
            playhead_seconds: duration,
            date_played: Some(Utc::now()),
            date_published: None,
            feed_url: None,
            guid: None,
        }
    }

    fn candidate(title: &str, channel: Option<&str>, duration: Option<f64>) -> VideoCandidate {
        VideoCandidate {
            video_id: "abc123def45".to_string(),
            title: title.to_string(),
            url: "https://www.youtube.com/watch?v=abc123def45".to_string(),
            channel: channel.map(|s| s.to_string()),
            duration_seconds: duration,
        }
    }

    #[test]
    fn test_extract_guest_names_start_pattern() {
        let p = provider();
        assert_eq!(
            p.extract_guest_names("Christian Klein: SAP's Vision for AI"),
            vec!["Christian Klein"]
        );
        assert_eq!(
            p.extract_guest_names("John Smith & Jane Doe: Building Things"),
            vec!["John Smith", "Jane Doe"]
        );
    }

    #[test]
    fn test_extract_guest_names_role_and_with_patterns() {
        let p = provider();
        assert_eq!(
            p.extract_guest_names("An Interview with Cloudflare CEO Matthew Prince"),
            vec!["Matthew Prince"]
        );
        assert_eq!(
            p.extract_guest_names("The Future of AI with Sundar Pichai"),
            vec!["Sundar Pichai"]
        );
        assert_eq!(
            p.extract_guest_names("Sam Altman on the Future of OpenAI"),
            vec!["Sam Altman"]
        );
    }

    #[test]
    fn test_extract_guest_names_ignores_non_names() {
        let p = provider();
        assert!(p
            .extract_guest_names("Weekly Update: markets in turmoil")
            .is_empty());
        assert!(p.extract_guest_names("Breaking News - rates up").is_empty());
    }

    #[test]
    fn test_build_search_query_cleans_podcast_name() {
        let p = provider();
        let ep = episode(
            "20VC (Venture Capital | Funding)",
            "#123 - Jason Lemkin: SaaS in 2025",
            3600.0,
        );
        let query = p
            .build_search_query(&ep, QueryVariant::Primary)
            .unwrap();
        assert!(query.starts_with("20VC"));
        assert!(query.contains("Jason Lemkin"));
        assert!(!query.contains('#'));
    }

    #[test]
    fn test_guest_focused_variant_requires_guests() {
        let p = provider();
        let ep = episode("Odd Lots", "The lumber market explained", 3600.0);
        assert!(p
            .build_search_query(&ep, QueryVariant::GuestFocused)
            .is_none());
    }

    #[test]
    fn test_match_scoring_prefers_guest_and_channel() {
        let p = provider();
        let ep = episode("Odd Lots", "Jane Doe: The Uranium Squeeze", 3600.0);
        let candidates = vec![
            candidate("Something unrelated entirely", None, Some(600.0)),
            candidate(
                "Jane Doe on The Uranium Squeeze",
                Some("Odd Lots"),
                Some(3500.0),
            ),
        ];
        let result = p.find_best_match(&ep, &candidates);
        let best = result.candidate.clone().unwrap();
        assert_eq!(best.title, "Jane Doe on The Uranium Squeeze");
        assert!(result.confidence >= 0.5, "confidence {}", result.confidence);
        assert_eq!(result.guests_found, vec!["Jane Doe"]);
        assert!(p.validate_match(&ep, &result).is_none());
    }

    #[test]
    fn test_missing_guest_caps_confidence() {
        let p = provider();
        let ep = episode("The Podcast", "Jane Doe: On Everything", 3600.0);
        let candidates = vec![candidate(
            "On Everything full episode",
            Some("The Podcast"),
            Some(3600.0),
        )];
        let result = p.find_best_match(&ep, &candidates);
        assert!(result.confidence <= 0.3);
        assert!(p.validate_match(&ep, &result).is_some());
    }

    #[test]
    fn test_strict_matching_raises_threshold() {
        let mut settings = YoutubeSettings::default();
        settings.strict_matching = true;
        let p = YoutubeProvider::new(settings);
        let ep = episode("Odd Lots", "The lumber market explained", 3600.0);
        // Overlapping words only: low raw score, passes 0.5 but not 0.7
        let result = MatchResult {
            candidate: Some(candidate("The lumber market explained", None, None)),
            confidence: 0.6,
            reason: "3 common words".to_string(),
            guests_found: Vec::new(),
            guests_missing: Vec::new(),
        };
        assert!(p.validate_match(&ep, &result).is_some());
    }

    #[test]
    fn test_name_appears_in_text_variations() {
        assert!(name_appears_in_text("Christian Klein", "SAP CEO Christian Klein interview"));
        assert!(name_appears_in_text("Christian Klein", "Christian K. on enterprise AI"));
        assert!(name_appears_in_text("Christian Klein", "Interview with Klein"));
        assert!(!name_appears_in_text("Christian Klein", "A show about databases"));
    }

    #[test]
    fn test_caption_track_prefers_manual_subtitles() {
        let info = serde_json::json!({
            "subtitles": {
                "en": [
                    {"ext": "vtt", "url": "https://example.com/vtt"},
                    {"ext": "json3", "url": "https://example.com/manual"}
                ]
            },
            "automatic_captions": {
                "en": [{"ext": "json3", "url": "https://example.com/auto"}]
            }
        });
        assert_eq!(
            caption_track_url(&info).as_deref(),
            Some("https://example.com/manual")
        );
    }

    #[test]
    fn test_parse_json3_captions() {
        let body = serde_json::json!({
            "events": [
                {"segs": [{"utf8": "hello "}, {"utf8": "world"}]},
                {"tStartMs": 100},
                {"segs": [{"utf8": "again\n"}]}
            ]
        });
        assert_eq!(
            parse_json3_captions(&body).as_deref(),
            Some("hello world again")
        );
    }
}
