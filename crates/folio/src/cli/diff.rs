//! `diff` command: compare two document trees stored as JSON files

use std::path::Path;

use folio_core::diff::compute_diff_json;

use crate::cli::util::read_json;
use crate::cli::version::diff_output;
use crate::cli::{CliResult, Output};

/// Handle the 'diff' command
pub fn handle_diff(old: &Path, new: &Path, summary: bool) -> CliResult<Output> {
    let old = read_json(old)?;
    let new = read_json(new)?;
    diff_output(compute_diff_json(&old, &new), summary)
}
