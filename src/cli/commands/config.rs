//! Config command implementation.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::Result;

/// Run the config command.
pub fn run_config(action: &ConfigAction, settings: Settings) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(&settings)
                .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;
            println!("{}", toml_str);
        }

        ConfigAction::Init => {
            let config_path = Settings::default_config_path();
            if config_path.exists() {
                Output::warning(&format!("Config already exists at {}", config_path.display()));
            } else {
                settings.save()?;
                Output::success(&format!("Created config at {}", config_path.display()));
            }
        }

        ConfigAction::Path => {
            println!("{}", Settings::default_config_path().display());
        }
    }

    Ok(())
}
