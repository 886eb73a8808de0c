//! Podwise - Podcast Listening History Summarizer
//!
//! A CLI tool that turns your Apple Podcasts listening history into a
//! library of structured episode notes.
//!
//! # Overview
//!
//! Podwise lets you:
//! - Read listened episodes straight from the Apple Podcasts library
//! - Find matching episode uploads and captions on YouTube
//! - Summarize transcripts with an LLM into structured insights
//! - Write markdown notes and sync a summary sheet to Google Sheets
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration and prompt templates
//! - `episodes` - Apple Podcasts library access and filtering
//! - `transcripts` - Transcript discovery (YouTube) and caching
//! - `summarizer` - LLM summarization, models, and rate limiting
//! - `state` - Durable per-episode processing state
//! - `markdown` - Markdown note rendering and output
//! - `sheets` - Google Sheets export
//! - `pipeline` - End-to-end pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use podwise::config::Settings;
//! use podwise::episodes::EpisodeStore;
//! use podwise::pipeline::{Pipeline, PipelineOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let store = EpisodeStore::open(&settings.episode_db_path())?;
//!     let episodes = store.list_since(settings.since_date()?)?;
//!
//!     let mut pipeline = Pipeline::new(&settings, None, true)?;
//!     let options = PipelineOptions::default();
//!     for episode in pipeline.plan(episodes, &options).to_process {
//!         let result = pipeline.process_episode(&episode, &options).await?;
//!         println!("{}: {:?}", result.episode_title, result.outcome);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod episodes;
pub mod error;
pub mod markdown;
pub mod pipeline;
pub mod sheets;
pub mod state;
pub mod summarizer;
pub mod transcripts;

pub use error::{PodwiseError, Result};
