//! Google Sheets export for summarized episodes.
//!
//! Talks to the Sheets v4 values API with a bearer token from the
//! environment. Rows are deduplicated against the sheet's title column and
//! against the local sync marker, so re-running export is idempotent.

use crate::episodes::Episode;
use crate::error::{PodwiseError, Result};
use crate::state::{StateRecord, StateTracker};
use crate::summarizer::{Soundbite, Summary};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Rows appended per API call.
const APPEND_BATCH_SIZE: usize = 100;

pub const SHEET_HEADERS: [&str; 11] = [
    "Podcast Name",
    "Episode Title",
    "Date Listened",
    "Duration",
    "Date Created",
    "Guests",
    "TL;DR",
    "Category",
    "Key Insights",
    "Frameworks",
    "Soundbites",
];

/// The sheet's single-select category column vocabulary.
pub const ALLOWED_CATEGORIES: [&str; 8] = [
    "Tech",
    "Entertainment",
    "News/Politics",
    "Finance/Economics/Investing",
    "Health",
    "Humor",
    "History",
    "Other",
];

/// Summary categories folded into the sheet vocabulary.
const CATEGORY_MAP: &[(&str, &str)] = &[
    ("tech", "Tech"),
    ("technology", "Tech"),
    ("science", "Tech"),
    ("ai", "Tech"),
    ("entertainment", "Entertainment"),
    ("humor", "Entertainment"),
    ("comedy", "Entertainment"),
    ("news", "News/Politics"),
    ("politics", "News/Politics"),
    ("finance", "Finance/Economics/Investing"),
    ("economics", "Finance/Economics/Investing"),
    ("investing", "Finance/Economics/Investing"),
    ("business", "Finance/Economics/Investing"),
    ("health", "Health"),
    ("history", "History"),
    ("relationships", "Other"),
];

/// Collapse summary categories into the single sheet category, taking the
/// first one that maps.
pub fn map_category(categories: &[String]) -> String {
    for category in categories {
        let lower = category.to_lowercase();
        let lower = lower.trim();
        if let Some((_, mapped)) = CATEGORY_MAP.iter().find(|(from, _)| *from == lower) {
            return mapped.to_string();
        }
        if let Some(allowed) = ALLOWED_CATEGORIES
            .iter()
            .find(|a| a.eq_ignore_ascii_case(lower))
        {
            return allowed.to_string();
        }
    }
    "Other".to_string()
}

/// Unique soundbite speakers that are not the host.
pub fn guests_from_soundbites(soundbites: &[Soundbite], host: &str) -> Vec<String> {
    let host_lower = host.to_lowercase();
    let mut guests = Vec::new();
    for sb in soundbites {
        let speaker = sb.speaker.trim();
        if speaker.is_empty() {
            continue;
        }
        let speaker_lower = speaker.to_lowercase();
        if speaker_lower == host_lower || speaker_lower == "unknown" {
            continue;
        }
        if !guests.iter().any(|g: &String| g.to_lowercase() == speaker_lower) {
            guests.push(speaker.to_string());
        }
    }
    guests
}

fn bullets<I: IntoIterator<Item = String>>(items: I) -> String {
    items
        .into_iter()
        .map(|item| format!("\u{2022} {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

fn row_from_parts(
    podcast_name: &str,
    episode_title: &str,
    date_listened: String,
    duration: String,
    date_created: String,
    host: &str,
    summary: &Summary,
) -> Vec<String> {
    let guests = guests_from_soundbites(&summary.soundbites, host).join(", ");
    let insights = bullets(summary.key_insights.iter().cloned());
    let frameworks = bullets(
        summary
            .frameworks
            .iter()
            .take(5)
            .map(|fw| format!("{}: {}", fw.name, fw.description)),
    );
    let soundbites = bullets(
        summary
            .soundbites
            .iter()
            .take(3)
            .map(|sb| format!("\"{}\" \u{2014}{}", sb.quote, sb.speaker)),
    );

    vec![
        podcast_name.to_string(),
        episode_title.to_string(),
        date_listened,
        duration,
        date_created,
        guests,
        summary.tldr.clone(),
        map_category(&summary.categories),
        insights,
        frameworks,
        soundbites,
    ]
}

/// Build a sheet row from full episode metadata.
pub fn format_row(episode: &Episode, summary: &Summary) -> Vec<String> {
    row_from_parts(
        &episode.podcast_name,
        &episode.title,
        episode
            .date_played
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        episode.duration_formatted(),
        episode
            .date_published
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        &episode.podcast_author,
        summary,
    )
}

/// Build a sheet row from a state record when the episode is no longer in
/// the library database. Duration and publish date are unavailable.
pub fn format_row_from_record(record: &StateRecord, summary: &Summary) -> Vec<String> {
    row_from_parts(
        &record.podcast_name,
        &record.episode_title,
        record.updated_at.format("%Y-%m-%d").to_string(),
        String::new(),
        String::new(),
        "",
        summary,
    )
}

/// One prepared row for export.
pub struct ExportEntry {
    pub episode_id: i64,
    pub episode_title: String,
    pub row: Vec<String>,
}

#[derive(Debug, Default, PartialEq)]
pub struct ExportStats {
    pub exported: usize,
    pub duplicates: usize,
}

/// Appends summary rows to a Google Sheet over the values API.
pub struct SheetsExporter {
    http: reqwest::Client,
    token: String,
    sheet_id: String,
    tab_name: String,
    writes_per_minute: u32,
}

impl SheetsExporter {
    /// Build an exporter from `GOOGLE_SHEETS_TOKEN` and `GOOGLE_SHEET_ID`.
    pub fn from_env(tab_name: String, writes_per_minute: u32) -> Result<Self> {
        let token = std::env::var("GOOGLE_SHEETS_TOKEN").map_err(|_| {
            PodwiseError::Config(
                "GOOGLE_SHEETS_TOKEN not set. Export an OAuth access token with \
                 spreadsheets scope before syncing."
                    .to_string(),
            )
        })?;
        let sheet_id = std::env::var("GOOGLE_SHEET_ID").map_err(|_| {
            PodwiseError::Config("GOOGLE_SHEET_ID not set.".to_string())
        })?;
        Ok(Self {
            http: reqwest::Client::new(),
            token,
            sheet_id,
            tab_name,
            writes_per_minute,
        })
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/{}/values/{}",
            SHEETS_API_BASE, self.sheet_id, range
        )
    }

    async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>> {
        let response = self
            .http
            .get(self.values_url(range))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PodwiseError::SheetsSink(format!(
                "reading range {} returned {}: {}",
                range,
                status,
                text.chars().take(300).collect::<String>()
            )));
        }
        let json: serde_json::Value = response.json().await?;
        let rows = json["values"]
            .as_array()
            .map(|rows| {
                rows.iter()
                    .map(|row| {
                        row.as_array()
                            .map(|cells| {
                                cells
                                    .iter()
                                    .filter_map(|c| c.as_str().map(|s| s.to_string()))
                                    .collect()
                            })
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }

    async fn append(&self, rows: &[Vec<String>]) -> Result<()> {
        let url = format!(
            "{}:append?valueInputOption=RAW&insertDataOption=INSERT_ROWS",
            self.values_url(&format!("{}!A1", self.tab_name))
        );
        let body = serde_json::json!({ "values": rows });
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PodwiseError::SheetsSink(format!(
                "append returned {}: {}",
                status,
                text.chars().take(300).collect::<String>()
            )));
        }
        Ok(())
    }

    /// Episode titles already present in the tab's title column.
    pub async fn existing_titles(&self) -> Result<HashSet<String>> {
        let range = format!("{}!B2:B", self.tab_name);
        let rows = self.get_values(&range).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .collect())
    }

    /// Write the header row if the tab is empty.
    async fn ensure_headers(&self) -> Result<()> {
        let range = format!("{}!A1:K1", self.tab_name);
        let rows = self.get_values(&range).await?;
        if rows.is_empty() {
            let headers: Vec<String> = SHEET_HEADERS.iter().map(|h| h.to_string()).collect();
            self.append(&[headers]).await?;
            debug!("wrote sheet headers");
        }
        Ok(())
    }

    /// Export entries, skipping anything already synced or already present
    /// in the sheet (repairing the local marker in the latter case).
    pub async fn export(
        &self,
        entries: Vec<ExportEntry>,
        state: &mut StateTracker,
    ) -> Result<ExportStats> {
        let mut stats = ExportStats::default();

        self.ensure_headers().await?;
        let mut existing = self.existing_titles().await?;

        let mut pending: Vec<ExportEntry> = Vec::new();
        for entry in entries {
            if state.is_synced(entry.episode_id) {
                stats.duplicates += 1;
                continue;
            }
            if existing.contains(&entry.episode_title)
                || existing.contains(entry.episode_title.trim())
            {
                stats.duplicates += 1;
                state.mark_synced(entry.episode_id)?;
                continue;
            }
            existing.insert(entry.episode_title.clone());
            pending.push(entry);
        }

        if pending.is_empty() {
            return Ok(stats);
        }
        info!(rows = pending.len(), "appending rows to sheet");

        let write_delay = Duration::from_secs_f64(60.0 / self.writes_per_minute.max(1) as f64);
        for (i, batch) in pending.chunks(APPEND_BATCH_SIZE).enumerate() {
            if i > 0 {
                tokio::time::sleep(write_delay).await;
            }
            let rows: Vec<Vec<String>> = batch.iter().map(|e| e.row.clone()).collect();
            match self.append(&rows).await {
                Ok(()) => {
                    for entry in batch {
                        state.mark_synced(entry.episode_id)?;
                        stats.exported += 1;
                    }
                }
                Err(e) => {
                    // Partial progress keeps its markers; the rest retries
                    // on the next sync.
                    warn!("batch append failed: {}", e);
                    return Err(e);
                }
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn summary() -> Summary {
        Summary {
            tldr: "Big episode.".to_string(),
            who_should_listen: "Everyone.".to_string(),
            key_insights: vec!["One".to_string(), "Two".to_string()],
            frameworks: vec![],
            soundbites: vec![
                Soundbite {
                    quote: "Quote one.".to_string(),
                    speaker: "Jane Doe".to_string(),
                },
                Soundbite {
                    quote: "Quote two.".to_string(),
                    speaker: "Nilay Patel".to_string(),
                },
                Soundbite {
                    quote: "Quote three.".to_string(),
                    speaker: "Unknown".to_string(),
                },
            ],
            takeaways: vec![],
            references: Default::default(),
            categories: vec!["Business".to_string(), "Tech".to_string()],
        }
    }

    #[test]
    fn test_map_category() {
        assert_eq!(map_category(&["Business".to_string()]), "Finance/Economics/Investing");
        assert_eq!(map_category(&["science".to_string()]), "Tech");
        assert_eq!(map_category(&["Humor".to_string()]), "Entertainment");
        assert_eq!(map_category(&["History".to_string()]), "History");
        assert_eq!(map_category(&["Quantum Gardening".to_string()]), "Other");
        assert_eq!(map_category(&[]), "Other");
    }

    #[test]
    fn test_guests_exclude_host_and_unknown() {
        let guests = guests_from_soundbites(&summary().soundbites, "Nilay Patel");
        assert_eq!(guests, vec!["Jane Doe"]);
    }

    #[test]
    fn test_format_row_shape() {
        let episode = Episode {
            id: 1,
            title: "An Episode".to_string(),
            podcast_name: "Decoder".to_string(),
            podcast_author: "Nilay Patel".to_string(),
            duration_seconds: 5400.0,
            playhead_seconds: 5400.0,
            date_played: Some(Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()),
            date_published: Some(Utc.with_ymd_and_hms(2025, 2, 27, 0, 0, 0).unwrap()),
            feed_url: None,
            guid: None,
        };
        let row = format_row(&episode, &summary());
        assert_eq!(row.len(), SHEET_HEADERS.len());
        assert_eq!(row[0], "Decoder");
        assert_eq!(row[2], "2025-03-01");
        assert_eq!(row[3], "1h 30m");
        assert_eq!(row[5], "Jane Doe");
        assert_eq!(row[7], "Finance/Economics/Investing");
        assert!(row[8].contains("\u{2022} One"));
        // Top 3 soundbites only
        assert_eq!(row[10].matches('\u{2022}').count(), 3);
    }
}
