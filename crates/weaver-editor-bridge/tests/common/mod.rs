#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use weaver_editor_bridge::{
    BoundDocument, DocumentEngine, DocumentId, DocumentResolver, EditorBridge, EditorSurface,
    EditorTransaction, EditorUpdate, EffectCallback, EffectSubscription, EngineEffect, EngineError,
    EngineEvent, EngineNotice, PositionedChange, RopeSurface, SurfaceError, SurfaceId,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Engine double that records what it receives and emits on demand.
pub struct FakeEngine {
    id: DocumentId,
    canonical: RefCell<String>,
    events: RefCell<Vec<EngineEvent>>,
    notices: RefCell<Vec<EngineNotice>>,
    subscribers: RefCell<Vec<(EffectSubscription, EffectCallback)>>,
    next_subscription: Cell<u64>,
    fail_notify: Cell<bool>,
}

impl FakeEngine {
    pub fn new(id: &str, canonical: &str) -> Rc<Self> {
        Rc::new(Self {
            id: DocumentId::new(id),
            canonical: RefCell::new(canonical.to_string()),
            events: RefCell::new(Vec::new()),
            notices: RefCell::new(Vec::new()),
            subscribers: RefCell::new(Vec::new()),
            next_subscription: Cell::new(0),
            fail_notify: Cell::new(false),
        })
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.borrow().clone()
    }

    pub fn notices(&self) -> Vec<EngineNotice> {
        self.notices.borrow().clone()
    }

    pub fn canonical(&self) -> String {
        self.canonical.borrow().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    pub fn fail_notify(&self) {
        self.fail_notify.set(true);
    }

    /// Publish an engine-originated change, as a remote peer's edit would.
    pub fn emit(&self, changes: Vec<PositionedChange>) {
        let next = weaver_editor_bridge::change::apply_to_string(&self.canonical(), &changes)
            .expect("emitted changes apply to canonical text");
        *self.canonical.borrow_mut() = next;
        self.publish(EngineEffect::ApplyToEditor { changes });
    }

    pub fn publish(&self, effect: EngineEffect) {
        let callbacks: Vec<EffectCallback> = self
            .subscribers
            .borrow()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for cb in callbacks {
            cb(&effect);
        }
    }
}

impl DocumentEngine for FakeEngine {
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
        if let EngineEvent::EditorChanged { full_text, .. } = &event {
            *self.canonical.borrow_mut() = full_text.clone();
        }
        self.events.borrow_mut().push(event);
        Ok(())
    }

    fn compare_and_correct(&self, current_text: &str) -> bool {
        let canonical = self.canonical();
        if current_text == canonical {
            return false;
        }
        let replace = PositionedChange::new(0, current_text.chars().count(), canonical.as_str());
        self.publish(EngineEffect::ApplyToEditor {
            changes: vec![replace],
        });
        true
    }

    fn notify(&self, notice: EngineNotice) -> Result<(), EngineError> {
        self.notices.borrow_mut().push(notice);
        if self.fail_notify.get() {
            return Err(EngineError::Closed);
        }
        Ok(())
    }
}

/// Maps surfaces to documents; tests rebind them to simulate renames and
/// view reuse.
#[derive(Default)]
pub struct FakeResolver {
    bindings: RefCell<HashMap<SurfaceId, BoundDocument>>,
}

impl FakeResolver {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn bind(&self, surface: SurfaceId, doc: &str, path: &str) {
        self.bindings
            .borrow_mut()
            .insert(surface, BoundDocument::new(doc, path));
    }

    pub fn unbind(&self, surface: SurfaceId) {
        self.bindings.borrow_mut().remove(&surface);
    }
}

impl<S: EditorSurface + ?Sized> DocumentResolver<S> for FakeResolver {
    fn resolve(&self, surface: &S) -> Option<BoundDocument> {
        self.bindings.borrow().get(&surface.surface_id()).cloned()
    }
}

/// Surface that drops transaction annotations, leaving only the dispatch
/// flag to catch echoes.
pub struct UnannotatedSurface {
    pub inner: Rc<RopeSurface>,
}

impl EditorSurface for UnannotatedSurface {
    fn surface_id(&self) -> SurfaceId {
        self.inner.surface_id()
    }

    fn text(&self) -> String {
        self.inner.text()
    }

    fn apply(&self, transaction: EditorTransaction) -> Result<(), SurfaceError> {
        self.inner.apply(EditorTransaction {
            changes: transaction.changes,
            annotation: None,
        })
    }
}

/// Route the surface's update notifications into `bridge`.
pub fn wire<E, S>(surface: &RopeSurface, bridge: &EditorBridge<E, S>)
where
    E: DocumentEngine + 'static,
    S: EditorSurface + 'static,
{
    let bridge = bridge.clone();
    surface.on_update(Rc::new(move |update: &EditorUpdate| {
        bridge.on_editor_update(update);
    }));
}

pub fn editor_changed(event: &EngineEvent) -> (&[PositionedChange], &str) {
    match event {
        EngineEvent::EditorChanged {
            changes, full_text, ..
        } => (changes, full_text),
        other => panic!("unexpected event {other:?}"),
    }
}
