//! Shared utilities for CLI commands

use serde_json::Value;
use std::path::{Path, PathBuf};

use folio_core::config::{BackendKind, StoreConfig};
use folio_core::content::ContentInput;

use crate::cli::args::ContentArgs;
use crate::cli::{CliError, CliResult};

/// Load the config file and apply command-line overrides.
pub fn load_config(
    data_dir: Option<PathBuf>,
    backend: Option<BackendKind>,
) -> CliResult<StoreConfig> {
    let mut config = StoreConfig::load()?;
    apply_overrides(&mut config, data_dir, backend);
    Ok(config)
}

fn apply_overrides(
    config: &mut StoreConfig,
    data_dir: Option<PathBuf>,
    backend: Option<BackendKind>,
) {
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    if let Some(kind) = backend {
        config.backend = kind;
    }
    log::debug!(
        "Using {:?} backend at {}",
        config.backend,
        config.data_dir.display()
    );
}

/// Read and parse a JSON file.
pub fn read_json(path: &Path) -> CliResult<Value> {
    let text = std::fs::read_to_string(path).map_err(|e| CliError::ReadInput {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&text).map_err(|e| CliError::InvalidJson {
        path: path.to_path_buf(),
        source: e,
    })
}

/// The content described by `--text` / `--file`, if either was given.
pub fn content_input(args: &ContentArgs) -> CliResult<Option<ContentInput>> {
    if let Some(text) = &args.text {
        return Ok(Some(ContentInput::from(text.as_str())));
    }
    match &args.file {
        Some(path) => Ok(Some(ContentInput::from_json(&read_json(path)?)?)),
        None => Ok(None),
    }
}
