//! Models command implementation.

use crate::cli::Output;
use crate::summarizer::available_models;
use anyhow::Result;

/// Run the models command.
pub fn run_models() -> Result<()> {
    Output::header("Available Models");
    for (alias, provider, model_id) in available_models() {
        Output::list_item(&format!("{:<12} {} ({})", alias, model_id, provider));
    }
    println!();
    Output::info("Pick one with 'podwise run --model <alias>' or set summarizer.default_model.");
    Ok(())
}
