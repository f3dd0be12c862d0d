//! Lore CLI
//!
//! Command-line interface for Lore - a shared knowledge store synchronized
//! through an ordinary git remote.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lore_core::{Config, ProjectStore, SyncEngine, SyncMode};

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "lore")]
#[command(about = "Lore - shared knowledge store synchronized through git")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the local store from a remote repository
    Init {
        /// Remote repository URL (stored in the config file)
        #[arg(long)]
        remote: Option<String>,
    },
    /// Show store status (configuration, pending changes, lock holder)
    Status,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Pull remote changes, then commit and publish local ones
    Sync,
    /// Fetch and replay remote changes onto the working copy
    Pull,
    /// Commit all pending local changes and publish them
    Push {
        /// Commit message (generated from the change counts when omitted)
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Manage projects
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    /// Manage documents
    Doc {
        #[command(subcommand)]
        command: DocCommands,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, remote_url, lock_timeout_secs)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// Create a project with the standard category skeleton
    #[command(alias = "add")]
    Create {
        /// Project name
        name: String,
    },
    /// List all projects
    #[command(alias = "ls")]
    List,
}

#[derive(Subcommand)]
enum DocCommands {
    /// Write a document (content from --body or stdin)
    #[command(alias = "add")]
    Write {
        /// Project name
        project: String,
        /// Category (e.g. skills, context)
        category: String,
        /// Document name
        name: String,
        /// Document content (reads stdin when omitted)
        #[arg(short, long)]
        body: Option<String>,
        /// Front matter title
        #[arg(short = 'T', long)]
        title: Option<String>,
        /// Front matter tags
        #[arg(short, long)]
        tag: Vec<String>,
    },
    /// Print a document
    #[command(alias = "cat")]
    Read {
        /// Project name
        project: String,
        /// Category
        category: String,
        /// Document name
        name: String,
    },
    /// List documents in a project category
    #[command(alias = "ls")]
    List {
        /// Project name
        project: String,
        /// Category
        category: String,
    },
    /// Delete a document
    #[command(alias = "rm")]
    Delete {
        /// Project name
        project: String,
        /// Category
        category: String,
        /// Document name
        name: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    tracing::debug!("lore CLI started");

    // Commands that work without an initialized store
    match &cli.command {
        Commands::Config { command } => {
            return handle_config_command(command.clone(), &output);
        }
        Commands::Init { remote } => {
            return commands::init::run(remote.clone(), &output);
        }
        _ => {}
    }

    let config = Config::load()?;
    let engine = SyncEngine::new(config.clone());
    let store = ProjectStore::new(&config.data_dir);

    // Document and project commands write into the working copy, which has
    // to exist before anything lands in it
    let touches_store = matches!(&cli.command, Commands::Project { .. } | Commands::Doc { .. });
    if touches_store && !engine.working_copy().is_initialized() {
        anyhow::bail!("Store is not initialized. Run `lore init --remote <url>` first.");
    }

    // Local writes get published afterwards, best-effort
    let is_write = matches!(
        &cli.command,
        Commands::Project {
            command: ProjectCommands::Create { .. }
        } | Commands::Doc {
            command: DocCommands::Write { .. } | DocCommands::Delete { .. }
        }
    );

    let result = match cli.command {
        Commands::Init { .. } => unreachable!(),   // Handled above
        Commands::Config { .. } => unreachable!(), // Handled above
        Commands::Status => commands::status::show(&engine, &output),
        Commands::Sync => commands::sync::run(&engine, SyncMode::Both, None, &output),
        Commands::Pull => commands::sync::run(&engine, SyncMode::Pull, None, &output),
        Commands::Push { message } => commands::sync::run(&engine, SyncMode::Push, message, &output),
        Commands::Project { command } => handle_project_command(command, &store, &output),
        Commands::Doc { command } => handle_doc_command(command, &store, &output),
    };

    if is_write && result.is_ok() {
        auto_sync(&engine, &output);
    }

    result
}

fn handle_project_command(
    command: ProjectCommands,
    store: &ProjectStore,
    output: &Output,
) -> Result<()> {
    match command {
        ProjectCommands::Create { name } => commands::project::create(store, name, output),
        ProjectCommands::List => commands::project::list(store, output),
    }
}

fn handle_doc_command(command: DocCommands, store: &ProjectStore, output: &Output) -> Result<()> {
    match command {
        DocCommands::Write {
            project,
            category,
            name,
            body,
            title,
            tag,
        } => commands::doc::write(store, project, category, name, body, title, tag, output),
        DocCommands::Read {
            project,
            category,
            name,
        } => commands::doc::read(store, project, category, name, output),
        DocCommands::List { project, category } => {
            commands::doc::list(store, project, category, output)
        }
        DocCommands::Delete {
            project,
            category,
            name,
            force,
        } => commands::doc::delete(store, project, category, name, force, output),
    }
}

fn handle_config_command(command: Option<ConfigCommands>, output: &Output) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(output),
        Some(ConfigCommands::Set { key, value }) => commands::config::set(key, value, output),
    }
}

/// Publish pending changes if the store is configured, stepping around
/// failures
fn auto_sync(engine: &SyncEngine, output: &Output) {
    if !engine.is_configured() {
        return;
    }

    match engine.sync(SyncMode::Both) {
        Ok(outcome) if outcome.is_success() => {}
        Ok(outcome) => {
            if !output.is_quiet() {
                eprintln!(
                    "⚠ Auto-sync deferred: {}",
                    commands::sync::describe_outcome(&outcome)
                );
            }
        }
        Err(e) => {
            if !output.is_quiet() {
                eprintln!("⚠ Auto-sync failed: {}", e);
            }
        }
    }
}

/// Route library logs to stderr, honoring RUST_LOG when set
///
/// Stdout stays reserved for command output so `--json` pipes cleanly.
fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lore_core=warn,lore_cli=warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
