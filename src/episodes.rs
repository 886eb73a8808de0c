//! Episode store: read-only adapter over the Apple Podcasts library.
//!
//! Reads listening history from the macOS Apple Podcasts SQLite database.
//! Episodes are never mutated by the pipeline; this module only queries.

use crate::error::{PodwiseError, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rusqlite::Connection;
use std::path::Path;
use tracing::{debug, instrument};

/// Core Data epoch: Jan 1, 2001 00:00:00 UTC.
/// Unix timestamp = core data timestamp + this offset.
const CORE_DATA_EPOCH_OFFSET: i64 = 978_307_200;

/// A podcast episode from the listening history.
#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    /// Native row id in the Apple Podcasts library (stable identity).
    pub id: i64,
    pub title: String,
    pub podcast_name: String,
    pub podcast_author: String,
    pub duration_seconds: f64,
    pub playhead_seconds: f64,
    pub date_played: Option<DateTime<Utc>>,
    pub date_published: Option<DateTime<Utc>>,
    pub feed_url: Option<String>,
    pub guid: Option<String>,
}

impl Episode {
    /// Progress percentage (0-100), or None if duration is unknown.
    /// A playhead at 0 typically means the episode finished and was reset.
    pub fn progress_percent(&self) -> Option<u32> {
        if self.duration_seconds <= 0.0 {
            return None;
        }
        if self.playhead_seconds <= 0.0 {
            return Some(100);
        }
        Some(((self.playhead_seconds / self.duration_seconds) * 100.0) as u32)
    }

    /// Whether this is a partial listen (< 90% complete).
    pub fn is_partial(&self) -> bool {
        match self.progress_percent() {
            Some(p) => p < 90,
            None => false,
        }
    }

    /// Duration as "Xh Ym" or "Xm".
    pub fn duration_formatted(&self) -> String {
        if self.duration_seconds <= 0.0 {
            return "?".to_string();
        }
        let total_mins = (self.duration_seconds / 60.0) as u64;
        let hours = total_mins / 60;
        let mins = total_mins % 60;
        if hours > 0 {
            format!("{}h {}m", hours, mins)
        } else {
            format!("{}m", mins)
        }
    }

    /// Status label for list display.
    pub fn status_label(&self) -> String {
        match self.progress_percent() {
            None => "?".to_string(),
            Some(p) if p >= 90 => "done".to_string(),
            Some(p) => format!("{}%", p),
        }
    }
}

/// Convert a Core Data timestamp to a UTC datetime.
fn core_data_to_datetime(ts: Option<f64>) -> Option<DateTime<Utc>> {
    let ts = ts?;
    if ts <= 0.0 {
        return None;
    }
    Utc.timestamp_opt(ts as i64 + CORE_DATA_EPOCH_OFFSET, 0).single()
}

/// Filters applied to the episode listing.
#[derive(Debug, Clone, Default)]
pub struct EpisodeFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// Case-insensitive substring match on the podcast name.
    pub podcast: Option<String>,
    pub complete_only: bool,
    pub limit: Option<usize>,
}

impl EpisodeFilter {
    /// Apply this filter to an episode list, preserving order. Limit last.
    pub fn apply(&self, episodes: Vec<Episode>) -> Vec<Episode> {
        let mut filtered: Vec<Episode> = episodes
            .into_iter()
            .filter(|ep| {
                if let Some(from) = self.from {
                    match ep.date_played {
                        Some(d) if d.date_naive() >= from => {}
                        _ => return false,
                    }
                }
                if let Some(to) = self.to {
                    match ep.date_played {
                        Some(d) if d.date_naive() <= to => {}
                        _ => return false,
                    }
                }
                if let Some(ref search) = self.podcast {
                    if !ep
                        .podcast_name
                        .to_lowercase()
                        .contains(&search.to_lowercase())
                    {
                        return false;
                    }
                }
                if self.complete_only && ep.is_partial() {
                    return false;
                }
                true
            })
            .collect();

        if let Some(limit) = self.limit {
            filtered.truncate(limit);
        }
        filtered
    }
}

/// Read-only store over the Apple Podcasts library database.
pub struct EpisodeStore {
    conn: Connection,
}

impl EpisodeStore {
    /// Open the episode database. Fails if the library file does not exist.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PodwiseError::EpisodeStore(format!(
                "Apple Podcasts database not found at {}",
                path.display()
            )));
        }
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        )?;
        Ok(Self { conn })
    }

    /// Open an in-memory database with the library schema (for tests).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            r#"
            CREATE TABLE ZMTPODCAST (
                Z_PK INTEGER PRIMARY KEY,
                ZTITLE TEXT,
                ZAUTHOR TEXT,
                ZFEEDURL TEXT
            );
            CREATE TABLE ZMTEPISODE (
                Z_PK INTEGER PRIMARY KEY,
                ZTITLE TEXT,
                ZPODCAST INTEGER,
                ZDURATION REAL,
                ZPLAYHEAD REAL,
                ZLASTDATEPLAYED REAL,
                ZPUBDATE REAL,
                ZGUID TEXT
            );
            "#,
        )?;
        Ok(Self { conn })
    }

    /// Mutable connection access for test fixtures.
    #[cfg(test)]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// List episodes played on or after the given date, most recent first.
    #[instrument(skip(self))]
    pub fn list_since(&self, since: NaiveDate) -> Result<Vec<Episode>> {
        let since_ts = since
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp() - CORE_DATA_EPOCH_OFFSET)
            .unwrap_or(0);

        let mut stmt = self.conn.prepare(
            r#"
            SELECT
                e.Z_PK,
                e.ZTITLE,
                p.ZTITLE,
                p.ZAUTHOR,
                COALESCE(e.ZDURATION, 0),
                COALESCE(e.ZPLAYHEAD, 0),
                e.ZLASTDATEPLAYED,
                e.ZPUBDATE,
                p.ZFEEDURL,
                e.ZGUID
            FROM ZMTEPISODE e
            JOIN ZMTPODCAST p ON e.ZPODCAST = p.Z_PK
            WHERE e.ZLASTDATEPLAYED IS NOT NULL
              AND e.ZLASTDATEPLAYED >= ?1
            ORDER BY e.ZLASTDATEPLAYED DESC
            "#,
        )?;

        let rows = stmt.query_map([since_ts], |row| {
            Ok(Episode {
                id: row.get(0)?,
                title: row
                    .get::<_, Option<String>>(1)?
                    .unwrap_or_else(|| "Untitled".to_string()),
                podcast_name: row
                    .get::<_, Option<String>>(2)?
                    .unwrap_or_else(|| "Unknown Podcast".to_string()),
                podcast_author: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                duration_seconds: row.get(4)?,
                playhead_seconds: row.get(5)?,
                date_played: core_data_to_datetime(row.get::<_, Option<f64>>(6)?),
                date_published: core_data_to_datetime(row.get::<_, Option<f64>>(7)?),
                feed_url: row.get(8)?,
                guid: row.get(9)?,
            })
        })?;

        let episodes: Vec<Episode> = rows.collect::<std::result::Result<_, _>>()?;
        debug!("Loaded {} episodes since {}", episodes.len(), since);
        Ok(episodes)
    }

    /// Count of played episodes per podcast, most-listened first.
    pub fn count_by_podcast(&self, since: NaiveDate) -> Result<Vec<(String, u32)>> {
        let since_ts = since
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp() - CORE_DATA_EPOCH_OFFSET)
            .unwrap_or(0);

        let mut stmt = self.conn.prepare(
            r#"
            SELECT p.ZTITLE, COUNT(*)
            FROM ZMTEPISODE e
            JOIN ZMTPODCAST p ON e.ZPODCAST = p.Z_PK
            WHERE e.ZLASTDATEPLAYED IS NOT NULL
              AND e.ZLASTDATEPLAYED >= ?1
            GROUP BY p.ZTITLE
            ORDER BY COUNT(*) DESC
            "#,
        )?;

        let rows = stmt.query_map([since_ts], |row| {
            Ok((
                row.get::<_, Option<String>>(0)?
                    .unwrap_or_else(|| "Unknown Podcast".to_string()),
                row.get::<_, u32>(1)?,
            ))
        })?;

        Ok(rows.collect::<std::result::Result<_, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;

    fn insert_episode(
        store: &EpisodeStore,
        id: i64,
        title: &str,
        podcast_id: i64,
        duration: f64,
        playhead: f64,
        played_core_data_ts: f64,
    ) {
        store
            .connection()
            .execute(
                "INSERT INTO ZMTEPISODE (Z_PK, ZTITLE, ZPODCAST, ZDURATION, ZPLAYHEAD, ZLASTDATEPLAYED, ZPUBDATE, ZGUID)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, NULL)",
                params![id, title, podcast_id, duration, playhead, played_core_data_ts],
            )
            .unwrap();
    }

    fn fixture_store() -> EpisodeStore {
        let store = EpisodeStore::in_memory().unwrap();
        store
            .connection()
            .execute(
                "INSERT INTO ZMTPODCAST (Z_PK, ZTITLE, ZAUTHOR, ZFEEDURL) VALUES (1, 'Odd Lots', 'Bloomberg', NULL)",
                [],
            )
            .unwrap();
        // Core Data ts 780000000 ~= Sep 2025
        insert_episode(&store, 10, "Metals", 1, 3600.0, 3500.0, 780_000_000.0);
        insert_episode(&store, 11, "Grain Markets", 1, 3600.0, 900.0, 780_100_000.0);
        store
    }

    #[test]
    fn test_list_since_orders_most_recent_first() {
        let store = fixture_store();
        let episodes = store
            .list_since(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
            .unwrap();
        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[0].id, 11);
        assert_eq!(episodes[1].id, 10);
    }

    #[test]
    fn test_progress_and_partial() {
        let store = fixture_store();
        let episodes = store
            .list_since(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
            .unwrap();
        let metals = episodes.iter().find(|e| e.id == 10).unwrap();
        assert_eq!(metals.progress_percent(), Some(97));
        assert!(!metals.is_partial());

        let grain = episodes.iter().find(|e| e.id == 11).unwrap();
        assert_eq!(grain.progress_percent(), Some(25));
        assert!(grain.is_partial());
    }

    #[test]
    fn test_playhead_zero_counts_as_complete() {
        let ep = Episode {
            id: 1,
            title: "t".into(),
            podcast_name: "p".into(),
            podcast_author: "".into(),
            duration_seconds: 1800.0,
            playhead_seconds: 0.0,
            date_played: None,
            date_published: None,
            feed_url: None,
            guid: None,
        };
        assert_eq!(ep.progress_percent(), Some(100));
        assert!(!ep.is_partial());
    }

    #[test]
    fn test_filter_complete_only_and_limit() {
        let store = fixture_store();
        let episodes = store
            .list_since(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
            .unwrap();

        let filter = EpisodeFilter {
            complete_only: true,
            ..Default::default()
        };
        let complete = filter.apply(episodes.clone());
        assert_eq!(complete.len(), 1);
        assert_eq!(complete[0].id, 10);

        let filter = EpisodeFilter {
            limit: Some(1),
            ..Default::default()
        };
        assert_eq!(filter.apply(episodes).len(), 1);
    }

    #[test]
    fn test_filter_podcast_substring() {
        let store = fixture_store();
        let episodes = store
            .list_since(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
            .unwrap();
        let filter = EpisodeFilter {
            podcast: Some("odd".to_string()),
            ..Default::default()
        };
        assert_eq!(filter.apply(episodes.clone()).len(), 2);

        let filter = EpisodeFilter {
            podcast: Some("acquired".to_string()),
            ..Default::default()
        };
        assert!(filter.apply(episodes).is_empty());
    }

    #[test]
    fn test_duration_formatted() {
        let mut ep = Episode {
            id: 1,
            title: "t".into(),
            podcast_name: "p".into(),
            podcast_author: "".into(),
            duration_seconds: 5400.0,
            playhead_seconds: 0.0,
            date_played: None,
            date_published: None,
            feed_url: None,
            guid: None,
        };
        assert_eq!(ep.duration_formatted(), "1h 30m");
        ep.duration_seconds = 1500.0;
        assert_eq!(ep.duration_formatted(), "25m");
        ep.duration_seconds = 0.0;
        assert_eq!(ep.duration_formatted(), "?");
    }
}
