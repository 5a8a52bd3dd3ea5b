//! Version command handlers

use serde_json::json;

use folio_core::diff::{DiffNode, DiffSummary};

use crate::cli::args::VersionCommands;
use crate::cli::{CliError, CliResult, Context, Output, block_on};

pub fn handle_version_command(ctx: &Context, command: VersionCommands) -> CliResult<Output> {
    let versions = ctx.versions();

    match command {
        VersionCommands::Create {
            document,
            name,
            auto,
        } => {
            let snapshot = block_on(versions.snapshot_current(&document, name, auto))?
                .ok_or_else(|| CliError::not_found("Document", &document))?;
            log::info!("Created version {} of {}", snapshot.id, document);
            Output::json(snapshot)
        }

        VersionCommands::List { document } => {
            Output::json(block_on(versions.list_by_document(&document))?)
        }

        VersionCommands::Restore { document, version } => {
            let record = block_on(versions.restore(&document, &version))?.ok_or_else(|| {
                CliError::NotFound {
                    kind: "Version",
                    id: format!("{version} of document {document}"),
                }
            })?;
            log::info!("Restored {} to version {}", document, version);
            Output::json(record)
        }

        VersionCommands::Delete { version } => {
            if !block_on(versions.delete(&version))? {
                return Err(CliError::not_found("Version", &version));
            }
            Output::json(json!({ "deleted": version }))
        }

        VersionCommands::Diff {
            document,
            version,
            against,
            summary,
        } => {
            let diff = match &against {
                Some(other) => block_on(versions.diff_versions(&version, other))?,
                None => block_on(versions.diff_with_current(&document, &version))?,
            }
            .ok_or_else(|| CliError::NotFound {
                kind: "Version or document",
                id: format!("{version} of document {document}"),
            })?;
            diff_output(diff, summary)
        }
    }
}

/// The diff itself, or only its character counts.
pub fn diff_output(diff: DiffNode, summary: bool) -> CliResult<Output> {
    if summary {
        Output::json(DiffSummary::of(&diff))
    } else {
        Output::json(diff)
    }
}
