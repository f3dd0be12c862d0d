//! Status command handler

use anyhow::Result;

use lore_core::SyncEngine;

use crate::output::{Output, OutputFormat};

/// Show status information
pub fn show(engine: &SyncEngine, output: &Output) -> Result<()> {
    let status = engine.status()?;

    match output.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        OutputFormat::Quiet => {
            println!(
                "{}",
                if status.configured {
                    "configured"
                } else {
                    "unconfigured"
                }
            );
        }
        OutputFormat::Human => {
            println!("Lore Status");
            println!("===========");
            println!();
            println!("Store:");
            println!("  Location: {}", status.data_dir.display());
            println!(
                "  Remote:   {}",
                status.remote_url.as_deref().unwrap_or("(not set)")
            );
            println!(
                "  State:    {}",
                if status.configured {
                    "configured"
                } else {
                    "not initialized"
                }
            );
            println!();
            println!("Working copy:");
            println!(
                "  Branch:          {}",
                status.branch.as_deref().unwrap_or("(none)")
            );
            let head = match status.head.as_deref() {
                Some(hash) => &hash[..hash.len().min(8)],
                None => "(no commits)",
            };
            println!("  HEAD:            {}", head);
            println!("  Pending changes: {}", status.pending_changes);
            match status.lock_holder {
                Some(pid) => println!("  Lock holder:     pid {}", pid),
                None => println!("  Lock holder:     (none)"),
            }
        }
    }

    Ok(())
}
