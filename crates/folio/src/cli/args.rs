//! Command-line argument structures and enums

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use folio_core::config::BackendKind;

#[derive(Parser)]
#[command(name = "folio")]
#[command(version)]
#[command(about = "Store rich-text documents and review their history", long_about = None)]
pub struct Cli {
    /// Override the data directory from the config file
    #[arg(short, long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Override the record backend (file, memory, sqlite)
    #[arg(short, long, global = true, value_parser = parse_backend)]
    pub backend: Option<BackendKind>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new document
    #[command(alias = "new")]
    Create {
        /// Title of the document
        #[arg(short, long)]
        title: String,

        #[command(flatten)]
        content: ContentArgs,

        /// Owning user
        #[arg(long)]
        owner: Option<String>,

        /// Parent folder or document
        #[arg(long)]
        parent: Option<String>,
    },

    /// Print a document
    #[command(alias = "cat")]
    Show {
        /// Document id
        id: String,

        /// Print only the plain text of the content
        #[arg(long)]
        plain: bool,
    },

    /// List documents, oldest first
    #[command(alias = "ls")]
    List {
        /// Only documents of this owner
        #[arg(long)]
        owner: Option<String>,

        /// Only documents under this parent
        #[arg(long)]
        parent: Option<String>,
    },

    /// Replace the title and/or content of a document
    Update {
        /// Document id
        id: String,

        /// New title
        #[arg(short, long)]
        title: Option<String>,

        #[command(flatten)]
        content: ContentArgs,
    },

    /// Delete a document
    #[command(alias = "rm")]
    Delete {
        /// Document id
        id: String,

        /// Leave the document's version snapshots in place
        #[arg(long)]
        keep_versions: bool,
    },

    /// Version snapshots of a document
    #[command(alias = "v")]
    Version {
        #[command(subcommand)]
        command: VersionCommands,
    },

    /// Diff two document trees stored as JSON files
    Diff {
        /// Older tree
        old: PathBuf,

        /// Newer tree
        new: PathBuf,

        /// Print character counts instead of the annotated tree
        #[arg(short, long)]
        summary: bool,
    },
}

/// Where new content comes from. At most one of the two may be given.
#[derive(Args, Clone, Debug, Default)]
pub struct ContentArgs {
    /// Plain-text content; blank lines separate paragraphs
    #[arg(long, conflicts_with = "file")]
    pub text: Option<String>,

    /// JSON file holding a document tree or a wrapped replicated state
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum VersionCommands {
    /// Snapshot the current content of a document
    Create {
        /// Document id
        document: String,

        /// Snapshot name (default: creation timestamp)
        #[arg(short, long)]
        name: Option<String>,

        /// Mark the snapshot as taken automatically
        #[arg(long)]
        auto: bool,
    },

    /// List the snapshots of a document, oldest first
    #[command(alias = "ls")]
    List {
        /// Document id
        document: String,
    },

    /// Restore a document to a snapshot
    Restore {
        /// Document id
        document: String,

        /// Version id
        version: String,
    },

    /// Remove a snapshot
    #[command(alias = "rm")]
    Delete {
        /// Version id
        version: String,
    },

    /// Diff a snapshot against the current content, or against another snapshot
    Diff {
        /// Document id
        document: String,

        /// Version id (the older side)
        version: String,

        /// Compare with this version instead of the current content
        #[arg(long)]
        against: Option<String>,

        /// Print character counts instead of the annotated tree
        #[arg(short, long)]
        summary: bool,
    },
}

fn parse_backend(value: &str) -> Result<BackendKind, String> {
    match value.to_ascii_lowercase().as_str() {
        "file" => Ok(BackendKind::File),
        "memory" => Ok(BackendKind::Memory),
        "sqlite" => Ok(BackendKind::Sqlite),
        other => Err(format!(
            "unknown backend '{other}' (expected file, memory or sqlite)"
        )),
    }
}
