//! Export command implementation: push summaries to Google Sheets.

use crate::cli::Output;
use crate::config::Settings;
use crate::episodes::{Episode, EpisodeStore};
use crate::sheets::{format_row, format_row_from_record, ExportEntry, ExportStats, SheetsExporter};
use crate::state::{ProcessingStatus, StateTracker};
use crate::summarizer::SummaryCache;
use anyhow::Result;
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::debug;

/// Run the export command.
pub async fn run_export(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    settings: Settings,
) -> Result<()> {
    let mut state = StateTracker::load(settings.state_path())?;
    let stats = sync_range(&settings, &mut state, from, to).await?;

    if stats.exported == 0 && stats.duplicates == 0 {
        Output::info("No summarized episodes to sync yet.");
    } else {
        Output::success(&format!(
            "Synced {} rows to Google Sheets ({} already present)",
            stats.exported, stats.duplicates
        ));
    }
    Ok(())
}

/// Push every exported-but-unsynced summary to the configured sheet.
///
/// Rows are built from the episode library when it is reachable; episodes
/// no longer in the library fall back to the leaner state-record row.
pub async fn sync_exported(
    settings: &Settings,
    state: &mut StateTracker,
) -> crate::error::Result<ExportStats> {
    sync_range(settings, state, None, None).await
}

/// Like [`sync_exported`], limited to records last processed in the given
/// date range.
async fn sync_range(
    settings: &Settings,
    state: &mut StateTracker,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> crate::error::Result<ExportStats> {
    let exporter = SheetsExporter::from_env(
        settings.sheets.tab_name.clone(),
        settings.sheets.writes_per_minute,
    )?;
    let cache = SummaryCache::new(settings.summary_cache_dir());

    let episodes: HashMap<i64, Episode> = match EpisodeStore::open(&settings.episode_db_path()) {
        Ok(store) => store
            .list_since(settings.since_date()?)?
            .into_iter()
            .map(|ep| (ep.id, ep))
            .collect(),
        Err(e) => {
            debug!("episode library unavailable for export rows: {}", e);
            HashMap::new()
        }
    };

    let mut entries = Vec::new();
    for record in state.list_records() {
        if record.status != ProcessingStatus::Exported {
            continue;
        }
        let date = record.updated_at.date_naive();
        if from.is_some_and(|d| date < d) || to.is_some_and(|d| date > d) {
            continue;
        }
        let Some(summary) = cache.get(record.episode_id)? else {
            debug!(episode_id = record.episode_id, "no cached summary, skipping");
            continue;
        };
        let row = match episodes.get(&record.episode_id) {
            Some(episode) => format_row(episode, &summary),
            None => format_row_from_record(record, &summary),
        };
        entries.push(ExportEntry {
            episode_id: record.episode_id,
            episode_title: record.episode_title.clone(),
            row,
        });
    }

    let spinner = Output::spinner("Syncing to Google Sheets...");
    let result = exporter.export(entries, state).await;
    spinner.finish_and_clear();
    result
}
