//! Document command handlers (create, show, list, update, delete)

use serde_json::json;

use folio_core::store::{DocumentPatch, NewDocument, Query};

use crate::cli::args::ContentArgs;
use crate::cli::util::content_input;
use crate::cli::{CliError, CliResult, Context, Output, block_on};

/// Handle the 'create' command
pub fn handle_create(
    ctx: &Context,
    title: String,
    content: &ContentArgs,
    owner: Option<String>,
    parent: Option<String>,
) -> CliResult<Output> {
    let data = NewDocument {
        title,
        content: content_input(content)?,
        owner_id: owner,
        parent_id: parent,
        ..NewDocument::default()
    };

    let record = block_on(ctx.store.create(ctx.documents(), data))?;
    log::info!("Created document {}", record.id);
    Output::json(record)
}

/// Handle the 'show' command
pub fn handle_show(ctx: &Context, id: &str, plain: bool) -> CliResult<Output> {
    let record = block_on(ctx.store.find_by_id(ctx.documents(), id))?
        .ok_or_else(|| CliError::not_found("Document", id))?;

    if plain {
        Ok(Output::Text(record.plain_text()))
    } else {
        Output::json(record)
    }
}

/// Handle the 'list' command
pub fn handle_list(
    ctx: &Context,
    owner: Option<String>,
    parent: Option<String>,
) -> CliResult<Output> {
    let mut query = Query::all();
    if let Some(owner) = owner {
        query = query.where_eq("ownerId", owner);
    }
    if let Some(parent) = parent {
        query = query.where_eq("parentId", parent);
    }

    let records = block_on(ctx.store.find(ctx.documents(), &query))?;
    Output::json(records)
}

/// Handle the 'update' command
pub fn handle_update(
    ctx: &Context,
    id: &str,
    title: Option<String>,
    content: &ContentArgs,
) -> CliResult<Output> {
    let patch = DocumentPatch {
        title,
        content: content_input(content)?,
        ..DocumentPatch::default()
    };
    if patch.title.is_none() && patch.content.is_none() {
        return Err(CliError::Usage(
            "pass --title, --text or --file to update".to_string(),
        ));
    }

    let record = block_on(ctx.store.update(ctx.documents(), id, patch))?
        .ok_or_else(|| CliError::not_found("Document", id))?;
    log::info!("Updated document {}", record.id);
    Output::json(record)
}

/// Handle the 'delete' command
pub fn handle_delete(ctx: &Context, id: &str, keep_versions: bool) -> CliResult<Output> {
    if !block_on(ctx.store.delete_by_id(ctx.documents(), id))? {
        return Err(CliError::not_found("Document", id));
    }

    let versions_removed = if keep_versions {
        0
    } else {
        block_on(ctx.versions().delete_by_document(id))?
    };
    log::info!(
        "Deleted document {} ({} versions removed)",
        id,
        versions_removed
    );
    Output::json(json!({
        "deleted": id,
        "versionsRemoved": versions_removed,
    }))
}
