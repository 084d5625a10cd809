//! Error types for CRDT operations.

use thiserror::Error;
use weaver_editor_bridge::ChangeError;

/// Errors that can occur during CRDT operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CrdtError {
    /// Failed to import CRDT data.
    #[error("failed to import CRDT data: {0}")]
    Import(String),

    /// Failed to export CRDT data.
    #[error("failed to export CRDT data: {0}")]
    Export(String),

    /// Loro CRDT error.
    #[error("loro error: {0}")]
    Loro(String),

    /// An editor change batch did not fit the document.
    #[error("invalid change batch: {0}")]
    Change(#[from] ChangeError),
}

impl From<loro::LoroError> for CrdtError {
    fn from(e: loro::LoroError) -> Self {
        CrdtError::Loro(e.to_string())
    }
}
