//! Project command handlers

use anyhow::{Context, Result};

use lore_core::ProjectStore;

use crate::output::Output;

/// Create a project with the standard category skeleton
pub fn create(store: &ProjectStore, name: String, output: &Output) -> Result<()> {
    let path = store
        .ensure_project(&name)
        .with_context(|| format!("Failed to create project '{}'", name))?;

    output.success(&format!("Created project '{}' at {}", name, path.display()));
    Ok(())
}

/// List all projects
pub fn list(store: &ProjectStore, output: &Output) -> Result<()> {
    let projects = store.list_projects()?;
    output.print_names(&projects, "project");
    Ok(())
}
