//! Loro-backed document engine for the editor bridge.
//!
//! This crate provides:
//! - `LoroEngine`: owns a document's canonical text in a `LoroDoc` and
//!   implements `DocumentEngine`
//! - `diff_changes`: char-level diff as positioned changes, used for remote
//!   imports, reconciliation and drift correction

mod diff;
mod engine;
mod error;

pub use diff::diff_changes;
pub use engine::{CONTENT_CONTAINER, LoroEngine};
pub use error::CrdtError;

// Re-export Loro types that consumers need
pub use loro::{ExportMode, LoroDoc, LoroText, VersionVector};
