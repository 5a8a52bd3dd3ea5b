//! Command dispatch for the `folio` binary.

/// Clap argument definitions
mod args;

/// `create`, `show`, `list`, `update`, `delete` commands
mod document;

/// `diff` command over JSON files
mod diff;

/// Shared CLI utilities
mod util;

/// `version` subcommands
mod version;

use clap::Parser;
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

use folio_core::config::StoreConfig;
use folio_core::error::FolioError;
use folio_core::store::DocumentStore;
use folio_core::version::VersionLog;

pub use args::Cli;
use args::Commands;

/// Helper to run async operations in sync context
fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures_lite::future::block_on(f)
}

/// Errors a command reports before exiting with status 1.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] FolioError),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Failed to read '{path}': {source}")]
    ReadInput {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON in '{path}': {source}")]
    InvalidJson {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Nothing to do: {0}")]
    Usage(String),
}

impl CliError {
    fn not_found(kind: &'static str, id: &str) -> Self {
        CliError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

pub type CliResult<T> = std::result::Result<T, CliError>;

/// What a command prints on success.
#[derive(Debug, PartialEq)]
pub enum Output {
    /// Pretty-printed JSON
    Json(Value),
    /// Raw text
    Text(String),
}

impl Output {
    fn json(value: impl serde::Serialize) -> CliResult<Self> {
        Ok(Output::Json(
            serde_json::to_value(value).map_err(FolioError::from)?,
        ))
    }
}

/// The opened store plus the collections it is configured with.
pub struct Context {
    pub config: StoreConfig,
    pub store: DocumentStore,
}

impl Context {
    pub fn new(config: StoreConfig, store: DocumentStore) -> Self {
        Self { config, store }
    }

    fn documents(&self) -> &str {
        &self.config.documents_collection
    }

    fn versions(&self) -> VersionLog<'_> {
        VersionLog::with_collections(
            &self.store,
            self.config.documents_collection.as_str(),
            self.config.versions_collection.as_str(),
        )
    }
}

/// Main entry point for the CLI
pub fn run_cli() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(Output::Json(value)) => match serde_json::to_string_pretty(&value) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("✗ Failed to format output: {}", e);
                std::process::exit(1);
            }
        },
        Ok(Output::Text(text)) => println!("{}", text),
        Err(e) => {
            eprintln!("✗ {}", e);
            std::process::exit(1);
        }
    }
}

fn execute(cli: Cli) -> CliResult<Output> {
    // `diff` works on files only and needs no store
    if let Commands::Diff { old, new, summary } = &cli.command {
        return diff::handle_diff(old, new, *summary);
    }

    let config = util::load_config(cli.data_dir, cli.backend)?;
    let store = config.open_store()?;
    let ctx = Context::new(config, store);
    dispatch(&ctx, cli.command)
}

fn dispatch(ctx: &Context, command: Commands) -> CliResult<Output> {
    match command {
        Commands::Create {
            title,
            content,
            owner,
            parent,
        } => document::handle_create(ctx, title, &content, owner, parent),

        Commands::Show { id, plain } => document::handle_show(ctx, &id, plain),

        Commands::List { owner, parent } => document::handle_list(ctx, owner, parent),

        Commands::Update { id, title, content } => {
            document::handle_update(ctx, &id, title, &content)
        }

        Commands::Delete { id, keep_versions } => {
            document::handle_delete(ctx, &id, keep_versions)
        }

        Commands::Version { command } => version::handle_version_command(ctx, command),

        Commands::Diff { old, new, summary } => diff::handle_diff(&old, &new, summary),
    }
}
