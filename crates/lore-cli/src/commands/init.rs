//! Init command handler

use anyhow::{bail, Context, Result};

use lore_core::{Config, SyncEngine};

use crate::output::{Output, OutputFormat};

/// Clone (or attach) the local store for the configured remote
pub fn run(remote: Option<String>, output: &Output) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;

    if let Some(remote) = remote {
        config.remote_url = Some(remote);
        config.save().context("Failed to save configuration")?;
    }

    if config.remote_url.is_none() {
        bail!(
            "No remote configured. Provide one with:\n  \
             lore init --remote <url>\n\
             or set it first:\n  \
             lore config set remote_url <url>"
        );
    }

    let engine = SyncEngine::new(config.clone());
    let already_initialized = engine.working_copy().is_initialized();
    engine.init().context("Failed to initialize the store")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "remote_url": config.remote_url,
                    "already_initialized": already_initialized
                })
            );
        }
        OutputFormat::Quiet => {}
        OutputFormat::Human => {
            if already_initialized {
                println!("Already initialized.");
                println!("  Store:  {}", config.data_dir.display());
            } else {
                output.success("Initialized knowledge store");
                println!("  Store:  {}", config.data_dir.display());
                println!(
                    "  Remote: {}",
                    config.remote_url.as_deref().unwrap_or_default()
                );
            }
        }
    }

    Ok(())
}
