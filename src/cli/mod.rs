//! CLI module for Podwise.

pub mod commands;
mod output;

pub use output::Output;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

/// Podwise - Podcast Listening History Summarizer
///
/// Reads your Apple Podcasts listening history, finds transcripts on
/// YouTube, summarizes episodes with an LLM, and writes markdown notes.
#[derive(Parser, Debug)]
#[command(name = "podwise")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Episode selection filters shared by `run` and `list`.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Only episodes played on or after this date (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Only episodes played on or before this date (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Only podcasts whose name contains this text (case-insensitive)
    #[arg(short, long)]
    pub podcast: Option<String>,

    /// Only episodes played to (near) completion
    #[arg(long)]
    pub complete_only: bool,

    /// Maximum number of episodes
    #[arg(short, long)]
    pub limit: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Summarize listened episodes into markdown notes
    Run {
        #[command(flatten)]
        filter: FilterArgs,

        /// Re-process episodes that are already summarized
        #[arg(short, long)]
        force: bool,

        /// Retry episodes previously marked transcript-not-found
        #[arg(long)]
        retry: bool,

        /// Show what would be processed without doing anything
        #[arg(long)]
        dry_run: bool,

        /// Disable request pacing toward the LLM provider
        #[arg(long)]
        no_rate_limit: bool,

        /// Model alias to use (see 'podwise models')
        #[arg(short, long)]
        model: Option<String>,

        /// Sync new summaries to Google Sheets after the run
        #[arg(long)]
        auto_sync: bool,

        /// Concurrent transcript prefetch fan-out (0 disables)
        #[arg(long, default_value = "4")]
        prefetch: usize,
    },

    /// List listened episodes with their processing status
    List {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Show episode counts per podcast
    Stats,

    /// Show processing-state records and totals
    Status {
        /// Maximum number of records to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Sync summarized episodes to Google Sheets
    Export {
        /// Only episodes processed on or after this date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Only episodes processed on or before this date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// List available model aliases
    Models,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Write the default configuration file
    Init,

    /// Show configuration file path
    Path,
}
