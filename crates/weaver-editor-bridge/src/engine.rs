//! Document engine abstraction.
//!
//! The engine owns the canonical text of one logical document. The bridge
//! pushes editor changes into it as [`EngineEvent`]s and listens to its
//! effect stream for changes it wants applied to the editor.

use std::rc::Rc;

use smol_str::SmolStr;
use thiserror::Error;

use crate::change::PositionedChange;
use crate::identity::DocumentId;

/// Where an editor-changed event came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Forwarded as the user typed.
    Editor,
    /// Replayed from the pending-edit buffer after binding.
    Replay,
}

/// Inbound events accepted by an engine.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum EngineEvent {
    EditorChanged {
        changes: Vec<PositionedChange>,
        /// Editor text after the changes were applied.
        full_text: String,
        origin: ChangeOrigin,
    },
}

/// Outbound effects published by an engine.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum EngineEffect {
    /// Apply these changes (pre-edit coordinates) to the editor.
    ApplyToEditor { changes: Vec<PositionedChange> },
    /// Encoded CRDT update for the transport layer.
    Broadcast { update: Vec<u8> },
}

/// Diagnostic notifications an engine may receive from its bridges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum EngineNotice {
    /// A bridge bound to this engine was torn down.
    EditorDetached,
}

/// Handle returned by [`DocumentEngine::subscribe_effects`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EffectSubscription(pub u64);

/// Callback receiving engine effects.
pub type EffectCallback = Rc<dyn Fn(&EngineEffect)>;

/// Errors reported by an engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EngineError {
    /// The engine was shut down or replaced.
    #[error("document engine is closed")]
    Closed,

    /// The engine refused an event.
    #[error("engine rejected event: {0}")]
    Rejected(SmolStr),
}

/// A CRDT-backed document engine for one logical document.
pub trait DocumentEngine {
    /// Stable identity of the document this engine owns.
    fn identity(&self) -> DocumentId;

    /// Subscribe to the effect stream.
    fn subscribe_effects(&self, callback: EffectCallback) -> EffectSubscription;

    /// Drop a subscription. Unknown handles are ignored.
    fn unsubscribe_effects(&self, subscription: EffectSubscription);

    /// Accept an inbound event.
    fn send(&self, event: EngineEvent) -> Result<(), EngineError>;

    /// Compare `current_text` against the canonical text.
    ///
    /// On mismatch the engine publishes an [`EngineEffect::ApplyToEditor`]
    /// that brings the editor back to canonical and returns `true`.
    fn compare_and_correct(&self, current_text: &str) -> bool;

    /// Diagnostic notification. Callers discard failures.
    fn notify(&self, notice: EngineNotice) -> Result<(), EngineError> {
        let _ = notice;
        Ok(())
    }
}
