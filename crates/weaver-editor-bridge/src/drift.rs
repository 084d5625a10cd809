//! Periodic drift detection between editor text and engine text.
//!
//! Drift happens when something edits the buffer through a path the bridge
//! does not observe. The engine is the authority: on mismatch it publishes
//! changes that bring the editor back to canonical text.

use std::cell::Cell;
use std::time::Duration;

use crate::engine::DocumentEngine;
use crate::identity::IdentityValidator;
use crate::surface::EditorSurface;

/// Default interval between drift checks.
pub const DEFAULT_DRIFT_INTERVAL: Duration = Duration::from_millis(5000);

/// Result of one drift check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriftOutcome {
    /// The bridge is gone; the timer should stop for good.
    Stopped,
    /// Identity check failed; try again next tick.
    SkippedInvalid,
    InSync,
    /// The engine resynchronized the editor.
    Corrected,
}

/// Counts checks and corrections across the bridge's lifetime.
#[derive(Debug, Default)]
pub struct DriftDetector {
    checks: Cell<u64>,
    corrections: Cell<u64>,
}

impl DriftDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare the editor against the engine once.
    pub fn check<E, S>(&self, engine: &E, surface: &S, identity: &IdentityValidator) -> DriftOutcome
    where
        E: DocumentEngine + ?Sized,
        S: EditorSurface + ?Sized,
    {
        if !identity.is_valid() {
            tracing::debug!(doc = %identity.expected(), "drift check skipped, identity invalid");
            return DriftOutcome::SkippedInvalid;
        }

        self.checks.set(self.checks.get() + 1);
        let text = surface.text();
        if engine.compare_and_correct(&text) {
            self.corrections.set(self.corrections.get() + 1);
            tracing::warn!(
                doc = %identity.expected(),
                surface = %surface.surface_id(),
                editor_chars = text.chars().count(),
                "editor drifted from engine, resynchronized"
            );
            DriftOutcome::Corrected
        } else {
            DriftOutcome::InSync
        }
    }

    pub fn checks(&self) -> u64 {
        self.checks.get()
    }

    pub fn corrections(&self) -> u64 {
        self.corrections.get()
    }
}
