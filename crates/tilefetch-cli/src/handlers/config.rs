//! Config command handler.

use anyhow::Result;
use tilefetch_core::{AppConfig, ConfigStore};

use crate::config_commands::ConfigCommand;

/// Execute the config command.
pub fn execute(store: &ConfigStore, effective: &AppConfig, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            show(store, effective);
            return Ok(());
        }
        ConfigCommand::SetToken { token } => {
            store.update(|c| c.api_token = token)?;
            println!("✓ API token saved.");
        }
        ConfigCommand::SetDir { path } => {
            let saved = store.update(|c| c.download_location = path)?;
            println!(
                "✓ Download location set to {}",
                saved.download_location.display()
            );
        }
        ConfigCommand::SetOmPath { path } => {
            let saved = store.update(|c| c.om_path = Some(path))?;
            if let Some(path) = saved.om_path {
                println!("✓ om CLI path set to {}", path.display());
            }
        }
    }
    Ok(())
}

fn show(store: &ConfigStore, config: &AppConfig) {
    println!("Config file:       {}", store.path().display());
    println!("API token:         {}", mask_token(&config.api_token));
    println!(
        "Download location: {}",
        config.download_location.display()
    );
    println!(
        "om CLI:            {}",
        config
            .om_path
            .as_ref()
            .map_or_else(|| "(from PATH)".to_string(), |p| p.display().to_string())
    );
    println!(
        "HuggingFace token: {}",
        config.hf_token.as_deref().map_or("(not set)".to_string(), mask_token)
    );
}

/// Keep the last four characters of a token visible.
pub fn mask_token(token: &str) -> String {
    if token.is_empty() {
        return "(not set)".to_string();
    }
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_masked() {
        assert_eq!(mask_token(""), "(not set)");
        assert_eq!(mask_token("abc"), "****");
        assert_eq!(mask_token("abcdef123"), "****f123");
    }

    #[test]
    fn set_commands_persist() {
        let temp = tempfile::tempdir().unwrap();
        let store = ConfigStore::at_path(temp.path().join("config.json"));
        let effective = AppConfig::with_home(temp.path());
        execute(
            &store,
            &effective,
            ConfigCommand::SetToken {
                token: "tok".to_string(),
            },
        )
        .unwrap();
        execute(
            &store,
            &effective,
            ConfigCommand::SetDir {
                path: temp.path().join("dl"),
            },
        )
        .unwrap();
        let saved = store.load().unwrap();
        assert_eq!(saved.api_token, "tok");
        assert_eq!(saved.download_location, temp.path().join("dl"));
    }
}
