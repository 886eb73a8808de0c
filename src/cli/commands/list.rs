//! List command implementation.

use crate::cli::{FilterArgs, Output};
use crate::config::Settings;
use crate::episodes::{EpisodeFilter, EpisodeStore};
use crate::state::StateTracker;
use anyhow::Result;

/// Run the list command.
pub async fn run_list(filter: FilterArgs, settings: Settings) -> Result<()> {
    let store = EpisodeStore::open(&settings.episode_db_path())?;
    let since = match filter.from {
        Some(date) => date,
        None => settings.since_date()?,
    };
    let episode_filter = EpisodeFilter {
        from: filter.from,
        to: filter.to,
        podcast: filter.podcast,
        complete_only: filter.complete_only,
        limit: filter.limit,
    };
    let episodes = episode_filter.apply(store.list_since(since)?);

    if episodes.is_empty() {
        Output::info("No listened episodes matched the filters.");
        return Ok(());
    }

    let state = StateTracker::load(settings.state_path())?;

    Output::header(&format!("Listened Episodes ({})", episodes.len()));
    for episode in &episodes {
        let processing = state
            .get(episode.id)
            .map(|r| r.status.as_str())
            .unwrap_or("-");
        Output::episode_line(
            &episode.title,
            &episode.podcast_name,
            &episode.duration_formatted(),
            processing,
        );
    }

    Ok(())
}
