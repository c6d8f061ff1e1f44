//! Configuration view and validation commands: `ltipass config`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use ltipass::config::{CONFIG_FILE_NAME, LtipassConfig};

use super::super::ConfigCommands;

pub fn cmd_config(
    config: &LtipassConfig,
    explicit: Option<&Path>,
    command: Option<ConfigCommands>,
) -> Result<()> {
    let located = LtipassConfig::locate(explicit);

    match command {
        None | Some(ConfigCommands::Show) => {
            match &located {
                Some(path) => println!("# Config file: {}", path.display()),
                None => println!("# No {} found, using defaults", CONFIG_FILE_NAME),
            }
            println!("# Effective values (with env/CLI overrides):");
            println!();

            let mut shown = config.clone();
            for secret in shown.consumers.values_mut() {
                *secret = "********".to_string();
            }
            if let Some(token) = shown.server.api_token.as_mut() {
                *token = "********".to_string();
            }
            let content =
                toml::to_string_pretty(&shown).context("Failed to serialize configuration")?;
            print!("{}", content);
        }
        Some(ConfigCommands::Validate) => {
            if located.is_none() {
                println!("No {} found. Using defaults (valid).", CONFIG_FILE_NAME);
                return Ok(());
            }

            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
        }
        Some(ConfigCommands::Init { force }) => {
            let path = explicit
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
            if path.exists() && !force {
                println!("{} already exists at {}", CONFIG_FILE_NAME, path.display());
                println!("Use --force to overwrite it.");
                return Ok(());
            }

            LtipassConfig::default().save(&path)?;

            println!("Created {}", path.display());
            println!();
            println!("You can now customize:");
            println!("  - [store] path shared by the hub and the notebook servers");
            println!("  - [server] api_token required by `ltipass serve`");
            println!("  - [consumers] shared secrets for grade reporting");
            println!("  - [bridge] keys exported to spawned servers");
        }
    }

    Ok(())
}
