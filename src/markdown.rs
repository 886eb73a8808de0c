//! Markdown summary files with YAML frontmatter.
//!
//! Files are named `{date}_{podcast-slug}_{episode-slug}.md`. A name
//! collision with a different episode gets a numeric suffix instead of
//! silently clobbering the existing note.

use crate::episodes::Episode;
use crate::error::Result;
use crate::summarizer::Summary;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::info;

static GUEST_WITH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+with\s+").expect("Invalid regex"));

/// Convert text to a filesystem-friendly slug.
pub fn slugify(text: &str, max_length: usize) -> String {
    let mut slug = String::new();
    let mut last_hyphen = true;
    for c in text.to_lowercase().chars() {
        if c.is_alphanumeric() {
            slug.push(c);
            last_hyphen = false;
        } else if (c.is_whitespace() || c == '-' || c == '_') && !last_hyphen {
            slug.push('-');
            last_hyphen = true;
        }
        // Other punctuation is dropped entirely.
    }
    let slug: String = slug.chars().take(max_length).collect();
    slug.trim_matches('-').to_string()
}

/// Base filename for an episode summary, without collision handling.
pub fn filename_base(episode: &Episode) -> String {
    let date_str = episode
        .date_played
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let podcast_slug = slugify(&episode.podcast_name, 30);
    let episode_slug = slugify(&episode.title, 40);
    format!("{}_{}_{}.md", date_str, podcast_slug, episode_slug)
}

/// Extract a guest name from common title patterns, for frontmatter.
fn guest_from_title(title: &str) -> Option<String> {
    if GUEST_WITH_RE.is_match(title) {
        let after = GUEST_WITH_RE.split(title).last()?;
        let guest = after
            .split('|')
            .next()?
            .split(',')
            .next()?
            .trim()
            .to_string();
        if !guest.is_empty() {
            return Some(guest);
        }
    }
    if title.contains(" - ") && title.to_lowercase().contains("interview") {
        let first = title.split(" - ").next()?.trim().to_string();
        if !first.is_empty() {
            return Some(first);
        }
    }
    None
}

/// Quote a frontmatter value, escaping embedded quotes and backslashes.
fn yaml_quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn frontmatter(episode: &Episode, summary: &Summary, youtube_url: Option<&str>) -> String {
    let date_listened = episode
        .date_played
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    let date_published = episode
        .date_published
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    let host = if episode.podcast_author.is_empty() {
        "Unknown"
    } else {
        &episode.podcast_author
    };

    let mut lines = vec![
        "---".to_string(),
        format!("podcast: {}", yaml_quote(&episode.podcast_name)),
        format!("episode: {}", yaml_quote(&episode.title)),
    ];
    if let Some(guest) = guest_from_title(&episode.title) {
        lines.push(format!("guest: {}", yaml_quote(&guest)));
    }
    lines.push(format!("host: {}", yaml_quote(host)));
    lines.push(format!("date_listened: {}", date_listened));
    lines.push(format!("date_published: {}", date_published));
    lines.push(format!("duration: {}", yaml_quote(&episode.duration_formatted())));
    lines.push(format!("categories: [{}]", summary.categories.join(", ")));
    if let Some(url) = youtube_url {
        lines.push(format!("youtube_url: {}", yaml_quote(url)));
    }
    lines.push("---".to_string());
    lines.join("\n")
}

/// Render the full markdown document for an episode summary.
pub fn render_summary(
    episode: &Episode,
    summary: &Summary,
    youtube_url: Option<&str>,
    transcript_text: Option<&str>,
) -> String {
    let mut sections = Vec::new();

    sections.push(frontmatter(episode, summary, youtube_url));
    sections.push(format!("\n# {}\n", episode.title));

    sections.push("## TL;DR".to_string());
    sections.push(format!("{}\n", summary.tldr));

    sections.push("## Who Should Listen".to_string());
    sections.push(format!("{}\n", summary.who_should_listen));

    sections.push("## Key Insights".to_string());
    for insight in &summary.key_insights {
        sections.push(format!("- {}", insight));
    }
    sections.push(String::new());

    if !summary.frameworks.is_empty() {
        sections.push("## Frameworks & Models".to_string());
        for fw in &summary.frameworks {
            sections.push(format!("### {}", fw.name));
            sections.push(format!("{}\n", fw.description));
        }
    }

    if !summary.soundbites.is_empty() {
        sections.push("## Soundbites".to_string());
        for sb in &summary.soundbites {
            let quote = sb.quote.replace('\n', " ");
            sections.push(format!("> \"{}\"", quote));
            sections.push(format!("> — {}\n", sb.speaker));
        }
    }

    sections.push("## Key Takeaways / Action Items".to_string());
    for takeaway in &summary.takeaways {
        sections.push(format!("- [ ] {}", takeaway));
    }
    sections.push(String::new());

    let refs = &summary.references;
    let has_refs = !(refs.books.is_empty()
        && refs.people.is_empty()
        && refs.tools.is_empty()
        && refs.links.is_empty());
    if has_refs {
        sections.push("## References Mentioned".to_string());
        if !refs.books.is_empty() {
            sections.push("\n### Books".to_string());
            for book in &refs.books {
                sections.push(format!("- {}", book));
            }
        }
        if !refs.people.is_empty() {
            sections.push("\n### People".to_string());
            for person in &refs.people {
                sections.push(format!("- {}", person));
            }
        }
        if !refs.tools.is_empty() {
            sections.push("\n### Tools / Products".to_string());
            for tool in &refs.tools {
                sections.push(format!("- {}", tool));
            }
        }
        if !refs.links.is_empty() {
            sections.push("\n### Links".to_string());
            for link in &refs.links {
                if link.starts_with("http") {
                    sections.push(format!("- [{}]({})", link, link));
                } else {
                    sections.push(format!("- {}", link));
                }
            }
        }
        sections.push(String::new());
    }

    sections.push("## Personal Notes".to_string());
    sections
        .push("*Add your own thoughts, connections, and follow-up items here.*\n".to_string());

    if let Some(text) = transcript_text {
        if !text.is_empty() {
            sections.push("---\n".to_string());
            sections.push("## Full Transcript".to_string());
            sections.push(String::new());
            sections.push("<details>".to_string());
            sections.push("<summary>Click to expand transcript</summary>".to_string());
            sections.push(String::new());
            sections.push(text.to_string());
            sections.push(String::new());
            sections.push("</details>".to_string());
            sections.push(String::new());
        }
    }

    sections.join("\n")
}

/// Writes summary markdown files to the notes directory.
pub struct MarkdownSink {
    output_dir: PathBuf,
}

impl MarkdownSink {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Pick a path that does not collide with an existing file: the base
    /// name, then `-2`, `-3`, and so on.
    fn available_path(&self, base_name: &str) -> PathBuf {
        let candidate = self.output_dir.join(base_name);
        if !candidate.exists() {
            return candidate;
        }
        let stem = base_name.trim_end_matches(".md");
        for n in 2.. {
            let candidate = self.output_dir.join(format!("{}-{}.md", stem, n));
            if !candidate.exists() {
                return candidate;
            }
        }
        unreachable!()
    }

    /// Write a summary file and return its path.
    ///
    /// The content is rendered fully before the write, so a failure never
    /// leaves a partial file behind.
    pub fn write_summary(
        &self,
        episode: &Episode,
        summary: &Summary,
        youtube_url: Option<&str>,
        transcript_text: Option<&str>,
    ) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;
        let content = render_summary(episode, summary, youtube_url, transcript_text);
        let path = self.available_path(&filename_base(episode));
        std::fs::write(&path, content)?;
        info!(path = %path.display(), "wrote summary");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summarizer::{Framework, References, Soundbite};
    use chrono::TimeZone;
    use chrono::Utc;
    use tempfile::tempdir;

    fn episode() -> Episode {
        Episode {
            id: 1,
            title: "The Future of AI with Sundar Pichai".to_string(),
            podcast_name: "Decoder".to_string(),
            podcast_author: "Nilay Patel".to_string(),
            duration_seconds: 4500.0,
            playhead_seconds: 4500.0,
            date_played: Some(Utc.with_ymd_and_hms(2025, 6, 15, 10, 0, 0).unwrap()),
            date_published: Some(Utc.with_ymd_and_hms(2025, 6, 10, 0, 0, 0).unwrap()),
            feed_url: None,
            guid: None,
        }
    }

    fn summary() -> Summary {
        Summary {
            tldr: "AI everywhere.".to_string(),
            who_should_listen: "Tech watchers.".to_string(),
            key_insights: vec!["Scale matters".to_string()],
            frameworks: vec![Framework {
                name: "Moats".to_string(),
                description: "Distribution wins".to_string(),
            }],
            soundbites: vec![Soundbite {
                quote: "We are early.".to_string(),
                speaker: "Sundar Pichai".to_string(),
            }],
            takeaways: vec!["Try Gemini".to_string()],
            references: References {
                links: vec!["https://example.com".to_string()],
                ..Default::default()
            },
            categories: vec!["Tech".to_string()],
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello, World!", 50), "hello-world");
        assert_eq!(slugify("  Multiple   Spaces  ", 50), "multiple-spaces");
        assert_eq!(slugify("Très Étrange Épisode", 50), "très-étrange-épisode");
        assert_eq!(slugify("truncated here", 9), "truncated");
    }

    #[test]
    fn test_filename_base() {
        assert_eq!(
            filename_base(&episode()),
            "2025-06-15_decoder_the-future-of-ai-with-sundar-pichai.md"
        );
    }

    #[test]
    fn test_guest_extraction_in_frontmatter() {
        let content = render_summary(&episode(), &summary(), None, None);
        assert!(content.contains("guest: \"Sundar Pichai\""));
        assert!(content.contains("host: \"Nilay Patel\""));
        assert!(content.contains("date_listened: 2025-06-15"));
        assert!(content.contains("categories: [Tech]"));
    }

    #[test]
    fn test_frontmatter_escapes_embedded_quotes() {
        let mut ep = episode();
        ep.title = "The \"Big\" Episode with Sundar Pichai".to_string();
        let content = render_summary(&ep, &summary(), None, None);
        assert!(content.contains(r#"episode: "The \"Big\" Episode with Sundar Pichai""#));
    }

    #[test]
    fn test_render_sections() {
        let content = render_summary(
            &episode(),
            &summary(),
            Some("https://www.youtube.com/watch?v=abc123def45"),
            Some("Full transcript text here."),
        );
        assert!(content.starts_with("---\n"));
        assert!(content.contains("## TL;DR"));
        assert!(content.contains("### Moats"));
        assert!(content.contains("> \"We are early.\""));
        assert!(content.contains("- [ ] Try Gemini"));
        assert!(content.contains("- [https://example.com](https://example.com)"));
        assert!(content.contains("youtube_url: \"https://www.youtube.com/watch?v=abc123def45\""));
        assert!(content.contains("<summary>Click to expand transcript</summary>"));
    }

    #[test]
    fn test_write_collision_gets_suffix() {
        let dir = tempdir().unwrap();
        let sink = MarkdownSink::new(dir.path().to_path_buf());

        let first = sink
            .write_summary(&episode(), &summary(), None, None)
            .unwrap();
        let second = sink
            .write_summary(&episode(), &summary(), None, None)
            .unwrap();
        let third = sink
            .write_summary(&episode(), &summary(), None, None)
            .unwrap();

        assert_ne!(first, second);
        assert!(second
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("-2.md"));
        assert!(third
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("-3.md"));
        assert!(first.exists() && second.exists() && third.exists());
    }
}
