mod common;

use std::rc::Rc;

use common::{FakeEngine, FakeResolver, editor_changed, init_tracing};
use weaver_editor_bridge::{
    BridgeConfig, BridgeError, BridgeRegistry, BridgeState, ConfigError, DocumentId,
    DocumentResolver, EditorSurface, EditorUpdate, EngineNotice, ManualScheduler,
    PositionedChange, RopeSurface, SurfaceId,
};

type Registry = BridgeRegistry<FakeEngine, RopeSurface>;

fn setup() -> (Rc<Registry>, Rc<FakeResolver>) {
    init_tracing();
    let resolver = FakeResolver::new();
    let dyn_resolver: Rc<dyn DocumentResolver<RopeSurface>> = resolver.clone();
    let registry = Rc::new(Registry::new(
        dyn_resolver,
        Rc::new(ManualScheduler::new()),
        BridgeConfig::default(),
    )
    .unwrap());
    (registry, resolver)
}

fn surface(registry: &Rc<Registry>, id: u64, text: &str) -> Rc<RopeSurface> {
    let surface = Rc::new(RopeSurface::new(SurfaceId(id), text));
    let weak = Rc::downgrade(registry);
    let sid = surface.surface_id();
    surface.on_update(Rc::new(move |update: &EditorUpdate| {
        if let Some(registry) = weak.upgrade() {
            registry.on_editor_update(sid, update);
        }
    }));
    surface
}

#[test]
fn test_attach_unbound_surface_is_noop() {
    let (registry, _resolver) = setup();
    let view = surface(&registry, 1, "text");

    assert!(!registry.attach(view.clone()).unwrap());
    assert!(registry.is_empty());

    // Updates for unknown surfaces go nowhere.
    view.edit(vec![PositionedChange::insertion(0, "x")]).unwrap();
}

#[test]
fn test_attach_before_engine_buffers_then_binds() {
    let (registry, resolver) = setup();
    let view = surface(&registry, 1, "");
    resolver.bind(SurfaceId(1), "doc-a", "notes/a.md");

    assert!(registry.attach(view.clone()).unwrap());
    let bridge = registry.bridge(SurfaceId(1)).unwrap();
    assert_eq!(bridge.state(), BridgeState::Constructed);

    view.edit(vec![PositionedChange::insertion(0, "hi")]).unwrap();
    assert_eq!(bridge.pending_len(), 1);

    let engine = FakeEngine::new("doc-a", "");
    registry.register_engine(engine.clone());

    assert_eq!(bridge.state(), BridgeState::Active);
    let events = engine.events();
    assert_eq!(events.len(), 1);
    assert_eq!(editor_changed(&events[0]).1, "hi");
}

#[test]
fn test_identity_change_rebuilds_before_forwarding() {
    let (registry, resolver) = setup();
    let engine_a = FakeEngine::new("doc-a", "hello world");
    let engine_b = FakeEngine::new("doc-b", "hello world");
    registry.register_engine(engine_a.clone());
    registry.register_engine(engine_b.clone());

    let view = surface(&registry, 1, "hello world");
    resolver.bind(SurfaceId(1), "doc-a", "a.md");
    assert!(registry.attach(view.clone()).unwrap());
    let bridge_a = registry.bridge(SurfaceId(1)).unwrap();

    view.edit(vec![PositionedChange::insertion(5, "x")]).unwrap();
    assert_eq!(engine_a.events().len(), 1);

    // The view is reused for another document.
    resolver.bind(SurfaceId(1), "doc-b", "b.md");
    view.edit(vec![PositionedChange::insertion(0, ">")]).unwrap();

    assert_eq!(bridge_a.state(), BridgeState::Destroyed);
    assert_eq!(engine_a.events().len(), 1);
    assert_eq!(engine_a.notices(), vec![EngineNotice::EditorDetached]);
    assert_eq!(engine_a.subscriber_count(), 0);

    let bridge_b = registry.bridge(SurfaceId(1)).unwrap();
    assert_eq!(bridge_b.document_id(), &DocumentId::new("doc-b"));
    assert_eq!(bridge_b.state(), BridgeState::Active);
    let events = engine_b.events();
    assert_eq!(events.len(), 1);
    let (changes, full_text) = editor_changed(&events[0]);
    assert_eq!(changes, &[PositionedChange::insertion(0, ">")]);
    assert_eq!(full_text, ">hellox world");
}

#[test]
fn test_unbound_surface_tears_down_without_forwarding() {
    let (registry, resolver) = setup();
    let engine = FakeEngine::new("doc-a", "abc");
    registry.register_engine(engine.clone());

    let view = surface(&registry, 2, "abc");
    resolver.bind(SurfaceId(2), "doc-a", "a.md");
    registry.attach(view.clone()).unwrap();

    resolver.unbind(SurfaceId(2));
    view.edit(vec![PositionedChange::deletion(0, 1)]).unwrap();

    assert!(engine.events().is_empty());
    assert!(registry.bridge(SurfaceId(2)).is_none());
}

#[test]
fn test_superseded_engine_gets_rebuilt_bridges() {
    let (registry, resolver) = setup();
    let first = FakeEngine::new("doc-a", "abc");
    registry.register_engine(first.clone());

    let view = surface(&registry, 1, "abc");
    resolver.bind(SurfaceId(1), "doc-a", "a.md");
    registry.attach(view.clone()).unwrap();
    let old = registry.bridge(SurfaceId(1)).unwrap();

    // Re-registering the same instance changes nothing.
    registry.register_engine(first.clone());
    assert_eq!(old.state(), BridgeState::Active);

    let second = FakeEngine::new("doc-a", "abc");
    registry.register_engine(second.clone());

    assert_eq!(old.state(), BridgeState::Destroyed);
    assert_eq!(first.subscriber_count(), 0);
    assert_eq!(second.subscriber_count(), 1);

    view.edit(vec![PositionedChange::insertion(3, "d")]).unwrap();
    assert!(first.events().is_empty());
    assert_eq!(second.events().len(), 1);
}

#[test]
fn test_registry_rejects_invalid_config() {
    let resolver: Rc<dyn DocumentResolver<RopeSurface>> = FakeResolver::new();
    let config: BridgeConfig = serde_json::from_str(r#"{"drift_interval_ms":0}"#).unwrap();
    let result = Registry::new(resolver, Rc::new(ManualScheduler::new()), config);
    assert!(matches!(
        result,
        Err(BridgeError::Config(ConfigError::ZeroInterval))
    ));
}

#[test]
fn test_one_binding_per_document() {
    let (registry, resolver) = setup();
    let engine = FakeEngine::new("doc-a", "");
    registry.register_engine(engine.clone());

    let one = surface(&registry, 1, "");
    let two = surface(&registry, 2, "");
    resolver.bind(SurfaceId(1), "doc-a", "a.md");
    resolver.bind(SurfaceId(2), "doc-a", "a.md");
    assert!(registry.attach(one.clone()).unwrap());
    let first = registry.bridge(SurfaceId(1)).unwrap();

    // The newer surface takes the document over.
    assert!(registry.attach(two.clone()).unwrap());
    assert_eq!(registry.len(), 1);
    assert_eq!(first.state(), BridgeState::Destroyed);
    assert!(registry.bridge(SurfaceId(1)).is_none());
    assert_eq!(engine.subscriber_count(), 1);
    assert_eq!(engine.notices(), vec![EngineNotice::EditorDetached]);

    one.edit(vec![PositionedChange::insertion(0, "old")]).unwrap();
    assert!(engine.events().is_empty());

    two.edit(vec![PositionedChange::insertion(0, "new")]).unwrap();
    let events = engine.events();
    assert_eq!(events.len(), 1);
    assert_eq!(editor_changed(&events[0]).1, "new");
}

#[test]
fn test_detach_and_shutdown() {
    let (registry, resolver) = setup();
    let engine_a = FakeEngine::new("doc-a", "");
    let engine_b = FakeEngine::new("doc-b", "");
    registry.register_engine(engine_a.clone());
    registry.register_engine(engine_b.clone());

    let one = surface(&registry, 1, "");
    let two = surface(&registry, 2, "");
    resolver.bind(SurfaceId(1), "doc-a", "a.md");
    resolver.bind(SurfaceId(2), "doc-b", "b.md");
    registry.attach(one.clone()).unwrap();
    registry.attach(two.clone()).unwrap();
    assert_eq!(registry.len(), 2);

    assert!(registry.detach(SurfaceId(1)));
    assert!(!registry.detach(SurfaceId(1)));
    assert_eq!(engine_a.subscriber_count(), 0);
    assert_eq!(engine_b.subscriber_count(), 1);

    registry.shutdown();
    assert!(registry.is_empty());
    assert!(registry.engine(&DocumentId::new("doc-a")).is_none());
    assert!(registry.engine(&DocumentId::new("doc-b")).is_none());
    assert_eq!(engine_b.subscriber_count(), 0);

    two.edit(vec![PositionedChange::insertion(0, "x")]).unwrap();
    assert!(engine_b.events().is_empty());
}
