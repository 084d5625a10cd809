use std::cell::RefCell;
use std::rc::Rc;

use weaver_editor_bridge::{
    BridgeConfig, DocumentEngine, DocumentId, DriftOutcome, EditorBridge, EditorSurface,
    EditorUpdate, EngineEffect, IdentityValidator, ManualScheduler, PositionedChange, RopeSurface,
    SurfaceId,
};
use weaver_editor_crdt::LoroEngine;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One collaborator: an engine, the editor showing it, and the bridge
/// between them. Broadcast updates pile up in `outbox` until delivered.
struct Peer {
    engine: Rc<LoroEngine>,
    surface: Rc<RopeSurface>,
    bridge: EditorBridge<LoroEngine, RopeSurface>,
    outbox: Rc<RefCell<Vec<Vec<u8>>>>,
}

impl Peer {
    fn new(surface_id: u64, engine: LoroEngine) -> Self {
        let engine = Rc::new(engine);
        let surface = Rc::new(RopeSurface::new(SurfaceId(surface_id), &engine.text()));

        let outbox = Rc::new(RefCell::new(Vec::new()));
        let sink = outbox.clone();
        engine.subscribe_effects(Rc::new(move |effect: &EngineEffect| {
            if let EngineEffect::Broadcast { update } = effect {
                sink.borrow_mut().push(update.clone());
            }
        }));

        let bridge = EditorBridge::new(
            Some(engine.clone()),
            surface.clone(),
            IdentityValidator::always(DocumentId::new("shared")),
            Rc::new(ManualScheduler::new()),
            BridgeConfig::default(),
        )
        .unwrap();
        let forward = bridge.clone();
        surface.on_update(Rc::new(move |update: &EditorUpdate| {
            forward.on_editor_update(update);
        }));

        Self {
            engine,
            surface,
            bridge,
            outbox,
        }
    }

    fn deliver_to(&self, other: &Peer) {
        let updates: Vec<Vec<u8>> = self.outbox.borrow_mut().drain(..).collect();
        for update in updates {
            other.engine.import(&update).unwrap();
        }
    }
}

fn pair(text: &str) -> (Peer, Peer) {
    init_tracing();
    let a = LoroEngine::from_text("shared", text).unwrap();
    let snapshot = a.export_snapshot().unwrap();
    let b = LoroEngine::from_snapshot("shared", &snapshot).unwrap();
    (Peer::new(1, a), Peer::new(2, b))
}

#[test]
fn test_local_edit_reaches_remote_editor() {
    let (a, b) = pair("hello world");

    a.surface
        .edit(vec![PositionedChange::insertion(5, "x")])
        .unwrap();
    assert_eq!(a.engine.text(), "hellox world");
    assert_eq!(a.outbox.borrow().len(), 1);

    a.deliver_to(&b);
    assert_eq!(b.engine.text(), "hellox world");
    assert_eq!(b.surface.text(), "hellox world");

    // Applying the remote change did not loop back into b's engine.
    assert!(b.outbox.borrow().is_empty());
    let stats = b.bridge.stats();
    assert_eq!(stats.applied, 1);
    assert_eq!(stats.suppressed, 1);
    assert_eq!(stats.forwarded, 0);
}

#[test]
fn test_concurrent_edits_converge() {
    let (a, b) = pair("hello world");

    a.surface
        .edit(vec![PositionedChange::insertion(0, "A")])
        .unwrap();
    b.surface
        .edit(vec![PositionedChange::new(6, 11, "there")])
        .unwrap();

    a.deliver_to(&b);
    b.deliver_to(&a);

    assert_eq!(a.engine.text(), "Ahello there");
    assert_eq!(b.engine.text(), a.engine.text());
    assert_eq!(a.surface.text(), a.engine.text());
    assert_eq!(b.surface.text(), b.engine.text());
}

#[test]
fn test_drift_restores_canonical_text() {
    let (a, _b) = pair("the quick brown fox");

    a.surface.overwrite_untracked("the quick red fox");
    assert_eq!(a.bridge.tick_drift(), DriftOutcome::Corrected);
    assert_eq!(a.surface.text(), "the quick brown fox");
    assert_eq!(a.engine.text(), "the quick brown fox");
    assert!(a.outbox.borrow().is_empty());

    assert_eq!(a.bridge.tick_drift(), DriftOutcome::InSync);
}

#[test]
fn test_buffered_edits_sync_after_late_binding() {
    init_tracing();
    let engine = Rc::new(LoroEngine::from_text("shared", "draft").unwrap());
    let surface = Rc::new(RopeSurface::new(SurfaceId(9), "draft"));
    let bridge = EditorBridge::<LoroEngine, RopeSurface>::new(
        None,
        surface.clone(),
        IdentityValidator::always(DocumentId::new("shared")),
        Rc::new(ManualScheduler::new()),
        BridgeConfig::default(),
    )
    .unwrap();
    let forward = bridge.clone();
    surface.on_update(Rc::new(move |update: &EditorUpdate| {
        forward.on_editor_update(update);
    }));

    surface
        .edit(vec![PositionedChange::insertion(0, "a ")])
        .unwrap();
    surface
        .edit(vec![PositionedChange::insertion(7, "!")])
        .unwrap();
    assert_eq!(engine.text(), "draft");

    bridge.bind(engine.clone()).unwrap();
    assert_eq!(engine.text(), "a draft!");
    assert_eq!(bridge.pending_len(), 0);

    bridge.destroy();
    assert_eq!(engine.detached_editors(), 1);
    assert_eq!(engine.subscriber_count(), 0);
}
