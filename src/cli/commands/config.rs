//! Config command implementation.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::Result;

/// Run the config command.
pub fn run_config(action: &ConfigAction, settings: Settings) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let content = toml::to_string_pretty(&settings)?;
            println!("{}", content);
        }
        ConfigAction::Init => {
            let path = Settings::default_config_path();
            if path.exists() {
                Output::warning(&format!("Config already exists at {}", path.display()));
            } else {
                settings.save_to(&path)?;
                Output::success(&format!("Wrote default config to {}", path.display()));
            }
        }
        ConfigAction::Path => {
            println!("{}", Settings::default_config_path().display());
        }
    }
    Ok(())
}
