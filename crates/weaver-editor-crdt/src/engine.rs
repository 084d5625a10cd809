//! Loro-backed document engine.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};

use loro::{LoroDoc, LoroText, VersionVector};
use smol_str::ToSmolStr;
use weaver_editor_bridge::change::{apply_to_string, sorted_for_apply};
use weaver_editor_bridge::{
    DocumentEngine, DocumentId, EffectCallback, EffectSubscription, EngineEffect, EngineError,
    EngineEvent, EngineNotice, PositionedChange,
};

use crate::CrdtError;
use crate::diff::diff_changes;

/// Name of the text container holding the document body.
pub const CONTENT_CONTAINER: &str = "content";

/// Document engine owning the canonical text of one document in a
/// `LoroDoc`.
///
/// Local editor changes are committed and published as
/// [`EngineEffect::Broadcast`] updates. Remote updates fed to
/// [`LoroEngine::import`] are published as [`EngineEffect::ApplyToEditor`].
pub struct LoroEngine {
    id: DocumentId,
    doc: LoroDoc,
    content: LoroText,
    subscribers: RefCell<Vec<(EffectSubscription, EffectCallback)>>,
    next_subscription: Cell<u64>,
    /// Oplog version already published through `Broadcast`.
    broadcast_from: RefCell<VersionVector>,
    closed: Cell<bool>,
    detached: Cell<u64>,
}

impl LoroEngine {
    /// Create an engine with an empty document.
    pub fn new(id: impl Into<DocumentId>) -> Self {
        Self::with_doc(id.into(), LoroDoc::new())
    }

    /// Create an engine from an existing Loro snapshot.
    pub fn from_snapshot(id: impl Into<DocumentId>, snapshot: &[u8]) -> Result<Self, CrdtError> {
        let doc = LoroDoc::new();
        doc.import(snapshot)
            .map_err(|e| CrdtError::Import(e.to_string()))?;
        Ok(Self::with_doc(id.into(), doc))
    }

    /// Create an engine whose document starts out holding `text`.
    ///
    /// The initial text is part of the snapshot, not of the broadcast stream.
    pub fn from_text(id: impl Into<DocumentId>, text: &str) -> Result<Self, CrdtError> {
        let engine = Self::new(id);
        if !text.is_empty() {
            engine.content.insert(0, text)?;
            engine.doc.commit();
            *engine.broadcast_from.borrow_mut() = engine.doc.oplog_vv();
        }
        Ok(engine)
    }

    fn with_doc(id: DocumentId, doc: LoroDoc) -> Self {
        let content = doc.get_text(CONTENT_CONTAINER);
        let broadcast_from = doc.oplog_vv();
        Self {
            id,
            doc,
            content,
            subscribers: RefCell::new(Vec::new()),
            next_subscription: Cell::new(0),
            broadcast_from: RefCell::new(broadcast_from),
            closed: Cell::new(false),
            detached: Cell::new(0),
        }
    }

    /// Get the underlying Loro document.
    pub fn doc(&self) -> &LoroDoc {
        &self.doc
    }

    /// Canonical text.
    pub fn text(&self) -> String {
        self.content.to_string()
    }

    pub fn len_chars(&self) -> usize {
        self.content.len_unicode()
    }

    /// Export full snapshot.
    pub fn export_snapshot(&self) -> Result<Vec<u8>, CrdtError> {
        self.doc
            .export(loro::ExportMode::Snapshot)
            .map_err(|e| CrdtError::Export(e.to_string()))
    }

    /// Export updates since given version.
    pub fn export_updates_since(&self, version: &VersionVector) -> Option<Vec<u8>> {
        let current_vv = self.doc.oplog_vv();

        if *version == current_vv {
            return None;
        }

        let updates = self
            .doc
            .export(loro::ExportMode::Updates {
                from: Cow::Owned(version.clone()),
            })
            .ok()?;

        if updates.is_empty() {
            return None;
        }

        Some(updates)
    }

    /// Get current version vector.
    pub fn version(&self) -> VersionVector {
        self.doc.oplog_vv()
    }

    /// Import remote changes and push the resulting text delta to editors.
    pub fn import(&self, data: &[u8]) -> Result<(), CrdtError> {
        if self.closed.get() {
            return Err(CrdtError::Import("engine is closed".into()));
        }

        let before = self.text();
        self.doc
            .import(data)
            .map_err(|e| CrdtError::Import(e.to_string()))?;
        // Remote ops are not ours to rebroadcast.
        *self.broadcast_from.borrow_mut() = self.doc.oplog_vv();

        let after = self.text();
        let changes = diff_changes(&before, &after);
        tracing::debug!(
            doc = %self.id,
            bytes = data.len(),
            hunks = changes.len(),
            "imported remote update"
        );
        if !changes.is_empty() {
            self.publish(&EngineEffect::ApplyToEditor { changes });
        }
        Ok(())
    }

    /// Stop accepting events and drop every subscriber.
    pub fn close(&self) {
        if self.closed.replace(true) {
            return;
        }
        self.subscribers.borrow_mut().clear();
        tracing::debug!(doc = %self.id, "engine closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// Number of bridges that reported detaching from this engine.
    pub fn detached_editors(&self) -> u64 {
        self.detached.get()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    /// Apply an editor batch, falling back to the editor's full text when the
    /// batch does not reproduce it.
    fn apply_editor_changes(
        &self,
        changes: &[PositionedChange],
        full_text: &str,
    ) -> Result<(), CrdtError> {
        let current = self.text();
        let replayable = !changes.is_empty()
            && apply_to_string(&current, changes).is_ok_and(|next| next == full_text);

        if replayable {
            self.apply_batch(changes)?;
        } else if current != full_text {
            if !changes.is_empty() {
                tracing::debug!(
                    doc = %self.id,
                    "change batch does not reproduce editor text, reconciling"
                );
            }
            self.apply_batch(&diff_changes(&current, full_text))?;
        }

        self.doc.commit();
        Ok(())
    }

    /// Apply a validated batch in pre-edit coordinates, back to front.
    fn apply_batch(&self, changes: &[PositionedChange]) -> Result<(), CrdtError> {
        let order = sorted_for_apply(changes, self.content.len_unicode())?;
        for &i in order.iter().rev() {
            let change = &changes[i];
            if change.to > change.from {
                self.content.delete(change.from, change.to - change.from)?;
            }
            if !change.insert.is_empty() {
                self.content.insert(change.from, &change.insert)?;
            }
        }
        Ok(())
    }

    fn broadcast_local(&self) {
        let from = self.broadcast_from.borrow().clone();
        let Some(update) = self.export_updates_since(&from) else {
            return;
        };
        *self.broadcast_from.borrow_mut() = self.doc.oplog_vv();
        self.publish(&EngineEffect::Broadcast { update });
    }

    fn publish(&self, effect: &EngineEffect) {
        // Subscribers may call back into the engine.
        let callbacks: Vec<EffectCallback> = self
            .subscribers
            .borrow()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for cb in callbacks {
            cb(effect);
        }
    }
}

impl DocumentEngine for LoroEngine {
    fn identity(&self) -> DocumentId {
        self.id.clone()
    }

    fn subscribe_effects(&self, callback: EffectCallback) -> EffectSubscription {
        let id = EffectSubscription(self.next_subscription.get());
        self.next_subscription.set(id.0 + 1);
        self.subscribers.borrow_mut().push((id, callback));
        id
    }

    fn unsubscribe_effects(&self, subscription: EffectSubscription) {
        self.subscribers
            .borrow_mut()
            .retain(|(id, _)| *id != subscription);
    }

    fn send(&self, event: EngineEvent) -> Result<(), EngineError> {
        if self.closed.get() {
            return Err(EngineError::Closed);
        }
        let EngineEvent::EditorChanged {
            changes,
            full_text,
            origin,
        } = event
        else {
            return Err(EngineError::Rejected("unsupported event".into()));
        };

        self.apply_editor_changes(&changes, &full_text)
            .map_err(|e| EngineError::Rejected(e.to_smolstr()))?;
        tracing::trace!(doc = %self.id, ?origin, changes = changes.len(), "editor change applied");

        self.broadcast_local();
        Ok(())
    }

    fn compare_and_correct(&self, current_text: &str) -> bool {
        let canonical = self.text();
        let changes = diff_changes(current_text, &canonical);
        if changes.is_empty() {
            return false;
        }
        tracing::debug!(
            doc = %self.id,
            hunks = changes.len(),
            "editor differs from canonical text"
        );
        self.publish(&EngineEffect::ApplyToEditor { changes });
        true
    }

    fn notify(&self, notice: EngineNotice) -> Result<(), EngineError> {
        if self.closed.get() {
            return Err(EngineError::Closed);
        }
        if notice == EngineNotice::EditorDetached {
            self.detached.set(self.detached.get() + 1);
            tracing::debug!(doc = %self.id, "editor detached");
        }
        Ok(())
    }
}
