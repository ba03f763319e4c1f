//! Shelf CLI
//!
//! Command-line client for shelf - a personal e-reader with a remote
//! library and an offline cache.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use shelf_core::{Config, Library, SyncError};

mod commands;
mod editor;
mod logging;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "shelf")]
#[command(about = "Shelf - personal e-reader with an offline cache")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Debug logging (overrides SHELF_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to an alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List books, most recently read first
    #[command(alias = "ls")]
    Books,
    /// Show a book's remote record
    Show {
        /// Book file name
        file_name: String,
    },
    /// Upload a .txt or .pdf file
    Upload {
        /// File to upload
        path: PathBuf,
        /// Name to store it under (defaults to the file's name)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Open a book: print its chapters, or one chapter's text
    Open {
        /// Book file name
        file_name: String,
        /// Print this chapter (1-based)
        #[arg(short, long)]
        chapter: Option<usize>,
        /// Where to write a PDF (defaults to its file name)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Open from the cache without contacting the remote store
        #[arg(long)]
        offline: bool,
    },
    /// Save the reading position of a cached book
    Progress {
        /// Book file name
        file_name: String,
        /// Offset to save
        offset: u64,
    },
    /// Delete a book remotely and from the cache
    #[command(alias = "rm")]
    Delete {
        /// Book file name
        file_name: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Inspect and manage the local cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
    /// Manage blog posts
    Post {
        #[command(subcommand)]
        command: PostCommands,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Show status (remote configuration, cache usage)
    Status,
}

#[derive(Subcommand)]
enum CacheCommands {
    /// List cached files
    #[command(alias = "ls")]
    List,
    /// Evict least recently read files down to cache_limit_mb
    Evict,
    /// Remove a file from the cache only
    #[command(alias = "rm")]
    Remove {
        /// Book file name
        file_name: String,
    },
}

#[derive(Subcommand)]
enum PostCommands {
    /// List posts, newest first
    #[command(alias = "ls")]
    List,
    /// Show a post
    Show {
        /// Post ID
        id: String,
    },
    /// Write a new post
    #[command(alias = "add")]
    Create {
        /// Post title
        #[arg(short = 'T', long)]
        title: String,
        /// Post content (opens editor if not provided)
        #[arg(short, long)]
        content: Option<String>,
    },
    /// Edit a post
    Edit {
        /// Post ID
        id: String,
        /// New title
        #[arg(short = 'T', long)]
        title: Option<String>,
        /// New content (opens editor if not provided)
        #[arg(short, long)]
        content: Option<String>,
    },
    /// Delete a post
    #[command(alias = "rm")]
    Delete {
        /// Post ID
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, remote.application_id, cache_limit_mb, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    if let Err(e) = run(cli, &output).await {
        report_error(&e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: &Output) -> Result<()> {
    let config_path = cli.config.as_ref();

    // Config commands work even with a broken cache
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), config_path, output);
    }

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    logging::init(&config, cli.verbose);

    let library = Library::open_with_config(config)?;

    match cli.command {
        Commands::Books => commands::book::list(&library, output).await,
        Commands::Show { file_name } => commands::book::show(&library, file_name, output).await,
        Commands::Upload { path, name } => {
            commands::book::upload(&library, path, name, output).await
        }
        Commands::Open {
            file_name,
            chapter,
            output: save_to,
            offline,
        } => commands::book::open(&library, file_name, chapter, save_to, offline, output).await,
        Commands::Progress { file_name, offset } => {
            commands::book::progress(&library, file_name, offset, output).await
        }
        Commands::Delete { file_name, yes } => {
            commands::book::delete(&library, file_name, yes, output).await
        }
        Commands::Cache { command } => handle_cache_command(command, &library, output),
        Commands::Post { command } => handle_post_command(command, &library, output).await,
        Commands::Config { .. } => unreachable!(), // Handled above
        Commands::Status => commands::status::show(&library, output),
    }
}

fn handle_cache_command(command: CacheCommands, library: &Library, output: &Output) -> Result<()> {
    match command {
        CacheCommands::List => commands::cache::list(library, output),
        CacheCommands::Evict => commands::cache::evict(library, output),
        CacheCommands::Remove { file_name } => commands::cache::remove(library, file_name, output),
    }
}

async fn handle_post_command(
    command: PostCommands,
    library: &Library,
    output: &Output,
) -> Result<()> {
    match command {
        PostCommands::List => commands::post::list(library, output).await,
        PostCommands::Show { id } => commands::post::show(library, id, output).await,
        PostCommands::Create { title, content } => {
            commands::post::create(library, title, content, output).await
        }
        PostCommands::Edit { id, title, content } => {
            commands::post::edit(library, id, title, content, output).await
        }
        PostCommands::Delete { id, yes } => commands::post::delete(library, id, yes, output).await,
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Print an error chain, plus a recovery hint for local storage failures
fn report_error(error: &anyhow::Error) {
    eprintln!("Error: {:#}", error);

    let hint = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<SyncError>())
        .and_then(SyncError::as_storage)
        .or_else(|| {
            error
                .chain()
                .find_map(|cause| cause.downcast_ref::<shelf_core::StorageError>())
        })
        .and_then(|e| e.recovery_suggestion());

    if let Some(hint) = hint {
        eprintln!("Hint: {}", hint);
    }
}
