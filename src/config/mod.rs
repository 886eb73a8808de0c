//! Configuration module for Podwise.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{ExtractionPrompts, Prompts, SynthesisPrompts};
pub use settings::{
    EpisodeSettings, GeneralSettings, PromptSettings, RateLimitSettings, Settings, SheetsSettings,
    SummarizerSettings, YoutubeSettings,
};
