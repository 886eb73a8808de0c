//! Status command implementation.

use crate::cli::output::preview;
use crate::cli::Output;
use crate::config::Settings;
use crate::state::StateTracker;
use anyhow::Result;

/// Run the status command.
pub async fn run_status(limit: usize, settings: Settings) -> Result<()> {
    let state = StateTracker::load(settings.state_path())?;
    let stats = state.stats();

    if stats.total == 0 {
        Output::info("No episodes processed yet. Use 'podwise run' to start.");
        return Ok(());
    }

    Output::header("Processing State");
    Output::kv("Tracked", &stats.total.to_string());
    Output::kv("Exported", &stats.exported.to_string());
    Output::kv("Summarized", &stats.summarized.to_string());
    Output::kv("No transcript", &stats.no_transcript.to_string());
    Output::kv("Failed", &stats.failed.to_string());

    let records = state.list_records();
    Output::header(&format!(
        "Recent Activity ({} of {})",
        records.len().min(limit),
        records.len()
    ));
    for record in records.iter().take(limit) {
        let mut line = format!(
            "{} [{}] {}",
            record.updated_at.format("%Y-%m-%d"),
            record.status,
            preview(&record.episode_title, 50)
        );
        if let Some(error) = &record.error {
            line.push_str(&format!(" - {}", preview(error, 60)));
        }
        Output::list_item(&line);
    }

    Ok(())
}
