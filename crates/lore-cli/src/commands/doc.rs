//! Document command handlers

use std::io::Read;

use anyhow::{bail, Context, Result};
use chrono::Utc;

use lore_core::{Document, ProjectStore};

use crate::output::{Output, OutputFormat};

/// Write a document, with content from --body or stdin
#[allow(clippy::too_many_arguments)]
pub fn write(
    store: &ProjectStore,
    project: String,
    category: String,
    name: String,
    body: Option<String>,
    title: Option<String>,
    tags: Vec<String>,
    output: &Output,
) -> Result<()> {
    let content = match body {
        Some(body) => body,
        None => {
            if atty::is(atty::Stream::Stdin) {
                bail!(
                    "No content provided. Pass it with --body or pipe it in:\n  \
                     cat notes.md | lore doc write {} {} {}",
                    project,
                    category,
                    name
                );
            }
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read document body from stdin")?;
            buffer
        }
    };

    // Front matter flags fold into any header the content already carries
    let content = if title.is_some() || !tags.is_empty() {
        let mut doc = Document::parse(&content).context("Failed to parse document")?;
        if let Some(title) = title {
            doc.front_matter.title = Some(title);
        }
        if !tags.is_empty() {
            doc.front_matter.tags = tags;
        }
        doc.front_matter.updated = Some(Utc::now());
        doc.render().context("Failed to render document")?
    } else {
        content
    };

    let path = store
        .write_document(&project, &category, &name, &content)
        .context("Failed to write document")?;

    output.success(&format!("Wrote {}", path.display()));
    Ok(())
}

/// Print a document's content
pub fn read(
    store: &ProjectStore,
    project: String,
    category: String,
    name: String,
    output: &Output,
) -> Result<()> {
    let content = store
        .read_document(&project, &category, &name)
        .context("Failed to read document")?;

    let Some(content) = content else {
        bail!("Document not found: {}/{}/{}", project, category, name);
    };

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "project": project,
                    "category": category,
                    "name": name,
                    "content": content
                })
            );
        }
        _ => print!("{}", content),
    }

    Ok(())
}

/// List documents in a project category
pub fn list(
    store: &ProjectStore,
    project: String,
    category: String,
    output: &Output,
) -> Result<()> {
    let docs = store.list_documents(&project, &category)?;
    output.print_names(&docs, "document");
    Ok(())
}

/// Delete a document
pub fn delete(
    store: &ProjectStore,
    project: String,
    category: String,
    name: String,
    force: bool,
    output: &Output,
) -> Result<()> {
    if !force
        && output.should_prompt()
        && !confirm(&format!("Delete {}/{}/{}?", project, category, name))?
    {
        output.message("Cancelled.");
        return Ok(());
    }

    let removed = store
        .remove_document(&project, &category, &name)
        .context("Failed to delete document")?;

    if !removed {
        bail!("Document not found: {}/{}/{}", project, category, name);
    }

    output.success(&format!("Deleted {}/{}/{}", project, category, name));
    Ok(())
}

/// Prompt for confirmation
///
/// Returns true if user confirms, false otherwise.
/// In non-interactive mode (no TTY), returns false.
fn confirm(prompt: &str) -> Result<bool> {
    use std::io::Write;

    if !atty::is(atty::Stream::Stdin) {
        return Ok(false);
    }

    print!("{} [y/N] ", prompt);
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;

    let input = input.trim().to_lowercase();
    Ok(input == "y" || input == "yes")
}
