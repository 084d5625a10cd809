//! The editor ↔ engine bridge and its lifecycle.
//!
//! ```text
//! editor update ─► suppress? ─► identity? ─► engine bound? ─► engine.send
//!                                                  └─ no ───► pending buffer
//! engine effect ─► identity? ─► [dispatch window] surface.apply(+ENGINE_SYNC)
//! drift timer ──► identity? ─► engine.compare_and_correct(editor text)
//! ```
//!
//! A bridge is built for one (engine, surface) pair and never rebinds.
//! Identity changes are handled by destroying it and building a new one.
//! All handlers run to completion on the host's event loop; nothing here
//! blocks or fails the host.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::change::{self, PositionedChange};
use crate::config::BridgeConfig;
use crate::drift::{DriftDetector, DriftOutcome};
use crate::engine::{
    ChangeOrigin, DocumentEngine, EffectSubscription, EngineEffect, EngineEvent, EngineNotice,
};
use crate::error::BridgeError;
use crate::identity::{DocumentId, IdentityValidator};
use crate::pending::{PendingEdit, PendingEdits};
use crate::schedule::{Scheduler, TickControl, TimerHandle};
use crate::surface::{EditorSurface, EditorUpdate, SurfaceId};
use crate::suppress::FeedbackSuppressor;

/// Lifecycle: `Constructed → Active → Destroyed`. Destroyed is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BridgeState {
    /// Waiting for an engine; edits are buffered.
    Constructed,
    Active,
    Destroyed,
}

/// Running counters for one bridge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Editor batches forwarded live.
    pub forwarded: u64,
    /// Buffered batches forwarded after binding.
    pub replayed: u64,
    pub buffered: u64,
    /// Updates dropped as self-inflicted.
    pub suppressed: u64,
    /// Crossings skipped because the identity check failed.
    pub skipped_invalid: u64,
    /// Engine batches applied to the editor.
    pub applied: u64,
    /// Drift ticks that compared the editor against the engine.
    pub drift_checks: u64,
    pub drift_corrections: u64,
    /// Times the pending buffer overflowed and collapsed to a snapshot.
    pub pending_collapses: u64,
    /// Engine or surface calls that returned an error.
    pub failures: u64,
}

/// Best-effort hook connecting conflict/decoration support to the view.
/// Returns `true` once connected.
pub type DecorationConnector = Box<dyn FnMut() -> bool>;

struct Inner<E, S> {
    doc: DocumentId,
    surface_id: SurfaceId,
    state: Cell<BridgeState>,
    engine: RefCell<Option<Rc<E>>>,
    surface: RefCell<Option<Rc<S>>>,
    identity: IdentityValidator,
    suppressor: FeedbackSuppressor,
    pending: RefCell<PendingEdits>,
    drift: DriftDetector,
    scheduler: Rc<dyn Scheduler>,
    config: BridgeConfig,
    subscription: Cell<Option<EffectSubscription>>,
    timer: RefCell<Option<TimerHandle>>,
    decorations: RefCell<Option<DecorationConnector>>,
    decorations_connected: Cell<bool>,
    stats: Cell<BridgeStats>,
}

/// Bidirectional sync bridge between one editor surface and one engine.
///
/// Cheap to clone; clones share state.
pub struct EditorBridge<E, S> {
    inner: Rc<Inner<E, S>>,
}

impl<E, S> Clone for EditorBridge<E, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E, S> EditorBridge<E, S>
where
    E: DocumentEngine + 'static,
    S: EditorSurface + 'static,
{
    /// Build a bridge for `surface`.
    ///
    /// With `Some(engine)` the bridge activates immediately. With `None` it
    /// stays `Constructed`, buffering edits until [`EditorBridge::bind`].
    /// Fails if `config` does not validate.
    pub fn new(
        engine: Option<Rc<E>>,
        surface: Rc<S>,
        identity: IdentityValidator,
        scheduler: Rc<dyn Scheduler>,
        config: BridgeConfig,
    ) -> Result<Self, BridgeError> {
        config.validate()?;
        let bridge = Self {
            inner: Rc::new(Inner {
                doc: identity.expected().clone(),
                surface_id: surface.surface_id(),
                state: Cell::new(BridgeState::Constructed),
                engine: RefCell::new(None),
                surface: RefCell::new(Some(surface)),
                identity,
                suppressor: FeedbackSuppressor::default(),
                pending: RefCell::new(PendingEdits::with_capacity(config.pending_capacity)),
                drift: DriftDetector::new(),
                scheduler,
                config,
                subscription: Cell::new(None),
                timer: RefCell::new(None),
                decorations: RefCell::new(None),
                decorations_connected: Cell::new(false),
                stats: Cell::new(BridgeStats::default()),
            }),
        };

        tracing::debug!(
            doc = %bridge.inner.doc,
            surface = %bridge.inner.surface_id,
            "bridge constructed"
        );

        if let Some(engine) = engine {
            bridge.bind(engine)?;
        }
        Ok(bridge)
    }

    /// Bind to the engine and go `Active`.
    ///
    /// Subscribes to the engine's effects, starts the drift timer, tries the
    /// decoration connection and replays buffered edits in arrival order.
    pub fn bind(&self, engine: Rc<E>) -> Result<(), BridgeError> {
        let inner = &self.inner;
        match inner.state.get() {
            BridgeState::Destroyed => {
                return Err(BridgeError::Destroyed {
                    doc: inner.doc.clone(),
                });
            }
            BridgeState::Active => {
                return Err(BridgeError::AlreadyBound {
                    doc: inner.doc.clone(),
                });
            }
            BridgeState::Constructed => {}
        }

        let found = engine.identity();
        if found != inner.doc {
            return Err(BridgeError::IdentityMismatch {
                expected: inner.doc.clone(),
                found,
            });
        }

        let weak: Weak<Inner<E, S>> = Rc::downgrade(inner);
        let subscription = engine.subscribe_effects(Rc::new(move |effect: &EngineEffect| {
            if let Some(inner) = weak.upgrade() {
                inner.on_effect(effect);
            }
        }));
        inner.subscription.set(Some(subscription));
        *inner.engine.borrow_mut() = Some(engine);
        inner.state.set(BridgeState::Active);

        let weak: Weak<Inner<E, S>> = Rc::downgrade(inner);
        let timer = inner.scheduler.schedule_repeating(
            inner.config.drift_interval(),
            Box::new(move || match weak.upgrade() {
                Some(inner) => match inner.tick_drift() {
                    DriftOutcome::Stopped => TickControl::Stop,
                    _ => TickControl::Continue,
                },
                None => TickControl::Stop,
            }),
        );
        *inner.timer.borrow_mut() = Some(timer);

        tracing::info!(
            doc = %inner.doc,
            surface = %inner.surface_id,
            pending = inner.pending.borrow().len(),
            "bridge active"
        );

        inner.try_connect_decorations();
        if let Some(engine) = inner.engine() {
            inner.replay_pending(&engine);
        }
        Ok(())
    }

    /// Feed one editor update from the host.
    pub fn on_editor_update(&self, update: &EditorUpdate) {
        self.inner.on_editor_update(update);
    }

    /// Run one drift check now, outside the timer.
    pub fn tick_drift(&self) -> DriftOutcome {
        self.inner.tick_drift()
    }

    /// Install the decoration connector. Tried immediately when active, then
    /// on every update until it reports success.
    pub fn with_decorations(&self, connector: DecorationConnector) {
        if self.inner.state.get() == BridgeState::Destroyed {
            return;
        }
        *self.inner.decorations.borrow_mut() = Some(connector);
        self.inner.decorations_connected.set(false);
        self.inner.try_connect_decorations();
    }

    /// Tear down. Idempotent; only the first call has any effect.
    ///
    /// Cancels the drift timer, unsubscribes from the engine, discards
    /// buffered edits and drops every reference the bridge holds.
    pub fn destroy(&self) {
        self.inner.destroy();
    }

    pub fn state(&self) -> BridgeState {
        self.inner.state.get()
    }

    pub fn is_active(&self) -> bool {
        self.state() == BridgeState::Active
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.inner.doc
    }

    pub fn surface_id(&self) -> SurfaceId {
        self.inner.surface_id
    }

    /// Re-run the identity check.
    pub fn is_identity_valid(&self) -> bool {
        self.inner.identity.is_valid()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    pub fn decorations_connected(&self) -> bool {
        self.inner.decorations_connected.get()
    }

    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            drift_checks: self.inner.drift.checks(),
            drift_corrections: self.inner.drift.corrections(),
            pending_collapses: self.inner.pending.borrow().collapsed(),
            ..self.inner.stats.get()
        }
    }
}

impl<E, S> Inner<E, S>
where
    E: DocumentEngine + 'static,
    S: EditorSurface + 'static,
{
    fn engine(&self) -> Option<Rc<E>> {
        self.engine.borrow().clone()
    }

    fn surface(&self) -> Option<Rc<S>> {
        self.surface.borrow().clone()
    }

    fn bump(&self, f: impl FnOnce(&mut BridgeStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }

    fn on_editor_update(&self, update: &EditorUpdate) {
        if self.state.get() == BridgeState::Destroyed {
            tracing::trace!(doc = %self.doc, "update after destroy ignored");
            return;
        }

        self.try_connect_decorations();
        if !update.doc_changed {
            return;
        }

        if let Some(reason) = self.suppressor.classify(update) {
            self.bump(|s| s.suppressed += 1);
            tracing::trace!(doc = %self.doc, ?reason, "dropping self-inflicted update");
            return;
        }

        if !self.identity.is_valid() {
            self.bump(|s| s.skipped_invalid += 1);
            tracing::debug!(
                doc = %self.doc,
                surface = %self.surface_id,
                "editor no longer bound to document, skipping update"
            );
            return;
        }

        let Some(surface) = self.surface() else {
            return;
        };
        let changes = change::from_regions(&update.regions);
        let full_text = surface.text();

        match self.engine() {
            Some(engine) => {
                // Anything still buffered goes first to keep arrival order.
                self.replay_pending(&engine);
                self.forward(&engine, changes, full_text, ChangeOrigin::Editor);
            }
            None => {
                self.pending
                    .borrow_mut()
                    .push(PendingEdit::new(changes, full_text));
                self.bump(|s| s.buffered += 1);
                tracing::debug!(
                    doc = %self.doc,
                    pending = self.pending.borrow().len(),
                    "engine not ready, buffered edit"
                );
            }
        }
    }

    fn forward(
        &self,
        engine: &E,
        changes: Vec<PositionedChange>,
        full_text: String,
        origin: ChangeOrigin,
    ) {
        let event = EngineEvent::EditorChanged {
            changes,
            full_text,
            origin,
        };
        match engine.send(event) {
            Ok(()) => self.bump(|s| match origin {
                ChangeOrigin::Editor => s.forwarded += 1,
                ChangeOrigin::Replay => s.replayed += 1,
            }),
            Err(e) => {
                self.bump(|s| s.failures += 1);
                tracing::warn!(
                    doc = %self.doc,
                    error = %e,
                    ?origin,
                    "engine rejected editor change"
                );
            }
        }
    }

    fn replay_pending(&self, engine: &E) {
        if self.pending.borrow().is_empty() {
            return;
        }
        if !self.identity.is_valid() {
            tracing::debug!(doc = %self.doc, "identity invalid, holding buffered edits");
            return;
        }

        // Taken before sending: each entry goes out exactly once.
        let entries = self.pending.borrow_mut().drain();
        let oldest_ms = entries
            .first()
            .map(|e| e.queued_at.elapsed().as_millis() as u64)
            .unwrap_or_default();
        tracing::info!(
            doc = %self.doc,
            count = entries.len(),
            oldest_ms,
            "replaying buffered edits"
        );

        for entry in entries {
            if self.state.get() == BridgeState::Destroyed {
                break;
            }
            self.forward(engine, entry.changes, entry.full_text, ChangeOrigin::Replay);
        }
    }

    fn on_effect(&self, effect: &EngineEffect) {
        if self.state.get() != BridgeState::Active {
            return;
        }
        let EngineEffect::ApplyToEditor { changes } = effect else {
            return;
        };

        if !self.identity.is_valid() {
            self.bump(|s| s.skipped_invalid += 1);
            tracing::debug!(
                doc = %self.doc,
                surface = %self.surface_id,
                "editor no longer bound to document, dropping engine changes"
            );
            return;
        }

        let Some(surface) = self.surface() else {
            return;
        };
        let result = self
            .suppressor
            .dispatch(|annotation| surface.apply(change::to_transaction(changes, annotation)));

        match result {
            Ok(()) => self.bump(|s| s.applied += 1),
            Err(e) => {
                self.bump(|s| s.failures += 1);
                tracing::warn!(
                    doc = %self.doc,
                    error = %e,
                    "failed to apply engine changes to editor"
                );
            }
        }
    }

    fn tick_drift(&self) -> DriftOutcome {
        if self.state.get() == BridgeState::Destroyed {
            return DriftOutcome::Stopped;
        }
        let (Some(engine), Some(surface)) = (self.engine(), self.surface()) else {
            return DriftOutcome::SkippedInvalid;
        };

        // Buffered edits reach the engine before it judges the editor text.
        self.replay_pending(&engine);
        if !self.pending.borrow().is_empty() {
            return DriftOutcome::SkippedInvalid;
        }

        self.drift.check(&*engine, &*surface, &self.identity)
    }

    fn try_connect_decorations(&self) {
        if self.state.get() != BridgeState::Active || self.decorations_connected.get() {
            return;
        }
        // Taken out while it runs; the connector may call back into the bridge.
        let Some(mut connect) = self.decorations.borrow_mut().take() else {
            return;
        };
        if connect() {
            self.decorations_connected.set(true);
            tracing::debug!(doc = %self.doc, "decorations connected");
        } else if self.state.get() != BridgeState::Destroyed {
            *self.decorations.borrow_mut() = Some(connect);
        }
    }

    fn destroy(&self) {
        if self.state.replace(BridgeState::Destroyed) == BridgeState::Destroyed {
            return;
        }

        if let Some(timer) = self.timer.borrow_mut().take() {
            timer.cancel();
        }

        let engine = self.engine.borrow_mut().take();
        if let Some(engine) = engine {
            if let Some(subscription) = self.subscription.take() {
                engine.unsubscribe_effects(subscription);
            }
            // The engine may already be superseded; nothing to do about it.
            if let Err(e) = engine.notify(EngineNotice::EditorDetached) {
                tracing::debug!(doc = %self.doc, error = %e, "detach notice failed");
            }
        }

        let discarded = {
            let mut pending = self.pending.borrow_mut();
            let n = pending.len();
            pending.clear();
            n
        };
        self.surface.borrow_mut().take();
        self.decorations.borrow_mut().take();

        tracing::info!(
            doc = %self.doc,
            surface = %self.surface_id,
            discarded,
            "bridge destroyed"
        );
    }
}
