//! Editor surface abstraction.
//!
//! The bridge never talks to a concrete editor widget. Hosts implement
//! [`EditorSurface`] for their view and feed every update they observe into
//! the bridge as an [`EditorUpdate`].

use std::fmt;

use thiserror::Error;

use crate::change::{ChangeError, ChangedRegion, PositionedChange};

/// Opaque marker attached to a transaction and visible on the resulting update.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Annotation(&'static str);

impl Annotation {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

/// Annotation carried by every engine-originated dispatch.
pub const ENGINE_SYNC: Annotation = Annotation::new("weaver.engine-sync");

/// Host-unique identifier for one editor surface (a view, not a file).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// A batch of changes to apply to the editor as one transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EditorTransaction {
    /// Changes in pre-edit coordinates.
    pub changes: Vec<PositionedChange>,
    pub annotation: Option<Annotation>,
}

/// What the host reports after each editor update.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EditorUpdate {
    /// False for selection-only or focus updates.
    pub doc_changed: bool,
    pub regions: Vec<ChangedRegion>,
    pub annotations: Vec<Annotation>,
}

impl EditorUpdate {
    /// An update with changed regions and no annotations.
    pub fn changed(regions: Vec<ChangedRegion>) -> Self {
        Self {
            doc_changed: true,
            regions,
            annotations: Vec::new(),
        }
    }

    /// An update that did not touch the document.
    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn has_annotation(&self, annotation: &Annotation) -> bool {
        self.annotations.iter().any(|a| a == annotation)
    }
}

/// Errors raised by an editor surface while applying a transaction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SurfaceError {
    #[error("invalid change batch: {0}")]
    InvalidChange(#[from] ChangeError),

    /// The view was closed or is otherwise not accepting edits.
    #[error("editor surface is closed")]
    Closed,
}

/// A live editor view the bridge can read from and write to.
///
/// Methods take `&self`: editor views are shared handles with their own
/// interior state, and the bridge runs on the host's single event loop.
pub trait EditorSurface {
    /// Identity of this view.
    fn surface_id(&self) -> SurfaceId;

    /// Full current text of the buffer.
    fn text(&self) -> String;

    /// Apply `transaction` atomically.
    ///
    /// Hosts may deliver the resulting [`EditorUpdate`] synchronously from
    /// inside this call or at some later point.
    fn apply(&self, transaction: EditorTransaction) -> Result<(), SurfaceError>;
}
