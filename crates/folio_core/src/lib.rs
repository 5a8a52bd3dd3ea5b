#![doc = include_str!(concat!(env!("OUT_DIR"), "/README.md"))]
#![warn(missing_docs)]

/// Configuration options
pub mod config;

/// Content payloads accepted at the store boundary
pub mod content;

/// CRDT adapter (rich-text trees as replicated yrs logs)
pub mod crdt;

/// Structural diff between two document trees
pub mod diff;

/// Error (common error types)
pub mod error;

/// Filesystem abstraction
pub mod fs;

/// Rich-text tree model
pub mod rich_text;

/// Document store over pluggable record backends
pub mod store;

/// Version snapshots, restore and diff-against-history
pub mod version;

#[cfg(test)]
pub mod test_utils;
