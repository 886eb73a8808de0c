//! Stats command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::episodes::EpisodeStore;
use anyhow::Result;

/// Run the stats command.
pub async fn run_stats(settings: Settings) -> Result<()> {
    let store = EpisodeStore::open(&settings.episode_db_path())?;
    let counts = store.count_by_podcast(settings.since_date()?)?;

    if counts.is_empty() {
        Output::info("No listening history found.");
        return Ok(());
    }

    Output::header(&format!(
        "Episodes per Podcast (since {})",
        settings.episodes.since_date
    ));
    let total: u32 = counts.iter().map(|(_, n)| n).sum();
    for (podcast, count) in &counts {
        Output::kv(podcast, &count.to_string());
    }
    println!();
    Output::kv("Total", &total.to_string());

    Ok(())
}
