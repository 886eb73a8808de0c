//! Run command implementation: the full summarization pipeline.

use crate::cli::output::preview;
use crate::cli::{FilterArgs, Output};
use crate::config::Settings;
use crate::episodes::{EpisodeFilter, EpisodeStore};
use crate::pipeline::{Outcome, Pipeline, PipelineOptions};
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct RunParams {
    pub filter: FilterArgs,
    pub force: bool,
    pub retry: bool,
    pub dry_run: bool,
    pub no_rate_limit: bool,
    pub model: Option<String>,
    pub auto_sync: bool,
    pub prefetch: usize,
}

/// Run the pipeline command.
pub async fn run_pipeline(params: RunParams, settings: Settings) -> Result<()> {
    let store = EpisodeStore::open(&settings.episode_db_path())?;
    let since = match params.filter.from {
        Some(date) => date,
        None => settings.since_date()?,
    };
    let filter = EpisodeFilter {
        from: params.filter.from,
        to: params.filter.to,
        podcast: params.filter.podcast.clone(),
        complete_only: params.filter.complete_only,
        limit: params.filter.limit,
    };
    let episodes = filter.apply(store.list_since(since)?);

    if episodes.is_empty() {
        Output::info("No listened episodes matched the filters.");
        return Ok(());
    }

    // Resolving the model here aborts on a bad alias before any episode
    // is touched.
    let mut pipeline = Pipeline::new(
        &settings,
        params.model.as_deref(),
        !params.no_rate_limit,
    )?;
    Output::info(&format!(
        "Found {} episodes (model: {})",
        episodes.len(),
        pipeline.model_alias()
    ));

    let options = PipelineOptions {
        force: params.force,
        retry_not_found: params.retry,
        prefetch: params.prefetch,
    };
    let plan = pipeline.plan(episodes, &options);

    if !plan.skipped.is_empty() {
        Output::info(&format!(
            "{} already processed (use --force to redo)",
            plan.skipped.len()
        ));
    }

    if params.dry_run {
        if plan.to_process.is_empty() {
            Output::success("Nothing to do.");
        } else {
            Output::header(&format!("Would process {} episodes", plan.to_process.len()));
            for episode in &plan.to_process {
                Output::episode_line(
                    &episode.title,
                    &episode.podcast_name,
                    &episode.duration_formatted(),
                    &episode.status_label(),
                );
            }
        }
        return Ok(());
    }

    if plan.to_process.is_empty() {
        Output::success("Nothing to do.");
        return Ok(());
    }

    // Ctrl-C finishes the current episode, then stops. State is flushed
    // after every transition, so a rerun resumes cleanly.
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.store(true, Ordering::SeqCst);
            }
        });
    }

    if params.prefetch > 0 && plan.to_process.len() > 1 {
        let spinner = Output::spinner(&format!(
            "Prefetching transcripts for {} episodes...",
            plan.to_process.len()
        ));
        pipeline
            .prefetch_transcripts(&plan.to_process, params.retry, params.prefetch)
            .await;
        spinner.finish_and_clear();
    }

    let pb = Output::progress_bar(plan.to_process.len() as u64, "");
    let mut summarized = 0usize;
    let mut no_transcript = Vec::new();
    let mut failed = Vec::new();
    let mut interrupted = false;

    for episode in &plan.to_process {
        if cancel.load(Ordering::SeqCst) {
            interrupted = true;
            break;
        }
        pb.set_message(preview(&episode.title, 40));

        let result = pipeline.process_episode(episode, &options).await?;
        match result.outcome {
            Outcome::Summarized { output_file } => {
                summarized += 1;
                pb.println(format!(
                    "  + {} -> {}",
                    preview(&result.episode_title, 60),
                    output_file.display()
                ));
            }
            Outcome::NoTranscript { reason } => {
                pb.println(format!(
                    "  - {} (no transcript: {})",
                    preview(&result.episode_title, 60),
                    reason
                ));
                no_transcript.push(result.episode_title);
            }
            Outcome::Failed { error } => {
                pb.println(format!(
                    "  ! {} ({})",
                    preview(&result.episode_title, 60),
                    error
                ));
                failed.push((result.episode_title, error));
            }
            Outcome::Skipped { .. } => {}
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    Output::header("Run Summary");
    Output::kv("Summarized", &summarized.to_string());
    Output::kv("Skipped", &plan.skipped.len().to_string());
    Output::kv("No transcript", &no_transcript.len().to_string());
    Output::kv("Failed", &failed.len().to_string());
    for (title, error) in &failed {
        Output::list_item(&format!("{}: {}", preview(title, 60), error));
    }

    if interrupted {
        Output::warning("Interrupted. Re-run the same command to resume.");
    }

    if params.auto_sync && summarized > 0 {
        let stats =
            super::export::sync_exported(&settings, pipeline.state_mut()).await?;
        Output::success(&format!(
            "Synced {} rows to Google Sheets ({} already present)",
            stats.exported, stats.duplicates
        ));
    }

    if !failed.is_empty() {
        anyhow::bail!("{} episodes failed; they will retry on the next run", failed.len());
    }
    Ok(())
}
