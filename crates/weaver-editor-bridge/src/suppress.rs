//! Feedback suppression for engine → editor dispatches.
//!
//! Changes the bridge applies to the editor on behalf of the engine must not
//! be observed again and sent back. Two independent paths catch them:
//!
//! - a dispatch flag, open only for the synchronous extent of one apply call;
//! - the [`ENGINE_SYNC`] annotation carried on the transaction, which still
//!   matches if the host delivers the update after the call returned.
//!
//! The flag relies on the host's single-threaded, non-preemptive event loop.

use std::cell::Cell;

use crate::surface::{Annotation, ENGINE_SYNC, EditorUpdate};

/// Why an update was classified as self-inflicted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuppressReason {
    /// Observed while a dispatch was in progress.
    Dispatching,
    /// Carries the engine-sync annotation.
    Annotated,
}

/// Idle → Dispatching → Idle guard.
#[derive(Debug)]
pub struct FeedbackSuppressor {
    dispatching: Cell<bool>,
    annotation: Annotation,
}

impl Default for FeedbackSuppressor {
    fn default() -> Self {
        Self::new(ENGINE_SYNC)
    }
}

impl FeedbackSuppressor {
    pub fn new(annotation: Annotation) -> Self {
        Self {
            dispatching: Cell::new(false),
            annotation,
        }
    }

    /// Annotation to attach to every dispatch.
    pub fn annotation(&self) -> Annotation {
        self.annotation
    }

    pub fn is_dispatching(&self) -> bool {
        self.dispatching.get()
    }

    /// Run `f` with the window open. The window closes when `f` returns,
    /// whether it succeeded, failed, or unwound.
    pub fn dispatch<R>(&self, f: impl FnOnce(Annotation) -> R) -> R {
        let _guard = DispatchGuard::open(&self.dispatching);
        f(self.annotation)
    }

    /// Classify an observed update. `Some` means drop it.
    pub fn classify(&self, update: &EditorUpdate) -> Option<SuppressReason> {
        if self.dispatching.get() {
            Some(SuppressReason::Dispatching)
        } else if update.has_annotation(&self.annotation) {
            Some(SuppressReason::Annotated)
        } else {
            None
        }
    }
}

struct DispatchGuard<'a> {
    flag: &'a Cell<bool>,
    was_open: bool,
}

impl<'a> DispatchGuard<'a> {
    fn open(flag: &'a Cell<bool>) -> Self {
        let was_open = flag.replace(true);
        Self { flag, was_open }
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        // A nested dispatch must not close the outer window.
        self.flag.set(self.was_open);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    #[test]
    fn test_window_open_only_during_dispatch() {
        let suppressor = FeedbackSuppressor::default();
        assert!(!suppressor.is_dispatching());

        let seen = suppressor.dispatch(|annotation| {
            assert_eq!(annotation, ENGINE_SYNC);
            suppressor.classify(&EditorUpdate::changed(Vec::new()))
        });

        assert_eq!(seen, Some(SuppressReason::Dispatching));
        assert!(!suppressor.is_dispatching());
    }

    #[test]
    fn test_window_closes_on_error() {
        let suppressor = FeedbackSuppressor::default();
        let result: Result<(), &str> = suppressor.dispatch(|_| Err("boom"));
        assert!(result.is_err());
        assert!(!suppressor.is_dispatching());
    }

    #[test]
    fn test_window_closes_on_panic() {
        let suppressor = FeedbackSuppressor::default();
        let result = catch_unwind(AssertUnwindSafe(|| {
            suppressor.dispatch(|_| panic!("host blew up"));
        }));
        assert!(result.is_err());
        assert!(!suppressor.is_dispatching());
    }

    #[test]
    fn test_annotation_path_outside_window() {
        let suppressor = FeedbackSuppressor::default();
        let mut update = EditorUpdate::changed(Vec::new());
        assert_eq!(suppressor.classify(&update), None);

        update.annotations.push(ENGINE_SYNC);
        assert_eq!(suppressor.classify(&update), Some(SuppressReason::Annotated));
    }

    #[test]
    fn test_nested_dispatch_keeps_outer_window() {
        let suppressor = FeedbackSuppressor::default();
        suppressor.dispatch(|_| {
            suppressor.dispatch(|_| ());
            assert!(suppressor.is_dispatching());
        });
        assert!(!suppressor.is_dispatching());
    }
}
