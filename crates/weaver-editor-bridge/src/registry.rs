//! Surface/engine binding registry for the owning integration layer.
//!
//! Keeps at most one engine per document and one bridge per surface, and
//! rebuilds bridges when a surface's bound document changes underneath it
//! (view reuse, renames) or when an engine instance is superseded.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::bridge::EditorBridge;
use crate::config::BridgeConfig;
use crate::engine::DocumentEngine;
use crate::error::BridgeError;
use crate::identity::{DocumentId, DocumentResolver, IdentityValidator};
use crate::schedule::Scheduler;
use crate::surface::{EditorSurface, EditorUpdate, SurfaceId};

struct Attached<E, S> {
    bridge: EditorBridge<E, S>,
    surface: Rc<S>,
}

impl<E, S> Clone for Attached<E, S> {
    fn clone(&self) -> Self {
        Self {
            bridge: self.bridge.clone(),
            surface: self.surface.clone(),
        }
    }
}

/// Owns the bridges of one host.
pub struct BridgeRegistry<E, S> {
    resolver: Rc<dyn DocumentResolver<S>>,
    scheduler: Rc<dyn Scheduler>,
    config: BridgeConfig,
    engines: RefCell<HashMap<DocumentId, Rc<E>>>,
    bridges: RefCell<HashMap<SurfaceId, Attached<E, S>>>,
}

impl<E, S> BridgeRegistry<E, S>
where
    E: DocumentEngine + 'static,
    S: EditorSurface + 'static,
{
    /// Fails if `config` does not validate.
    pub fn new(
        resolver: Rc<dyn DocumentResolver<S>>,
        scheduler: Rc<dyn Scheduler>,
        config: BridgeConfig,
    ) -> Result<Self, BridgeError> {
        config.validate()?;
        Ok(Self {
            resolver,
            scheduler,
            config,
            engines: RefCell::new(HashMap::new()),
            bridges: RefCell::new(HashMap::new()),
        })
    }

    /// Make `engine` the engine for its document.
    ///
    /// Bridges waiting for this document are bound. Bridges bound to a
    /// previous engine instance are destroyed and rebuilt against the new one.
    pub fn register_engine(&self, engine: Rc<E>) {
        let doc = engine.identity();
        let previous = self
            .engines
            .borrow_mut()
            .insert(doc.clone(), engine.clone());
        let superseded = previous.is_some_and(|old| !Rc::ptr_eq(&old, &engine));
        if superseded {
            tracing::info!(doc = %doc, "engine superseded, rebuilding bridges");
        }

        for (surface_id, attached) in self.bridges_for(&doc) {
            if attached.bridge.is_active() {
                if !superseded {
                    continue;
                }
                attached.bridge.destroy();
                self.bridges.borrow_mut().remove(&surface_id);
                self.rebuild(attached.surface);
                continue;
            }
            if let Err(e) = attached.bridge.bind(engine.clone()) {
                tracing::warn!(
                    doc = %doc,
                    surface = %surface_id,
                    error = %e,
                    "failed to bind waiting bridge"
                );
            }
        }
    }

    /// Forget the engine for `doc`. Its bridges go back to buffering.
    pub fn remove_engine(&self, doc: &DocumentId) -> Option<Rc<E>> {
        let engine = self.engines.borrow_mut().remove(doc)?;
        for (surface_id, attached) in self.bridges_for(doc) {
            attached.bridge.destroy();
            self.bridges.borrow_mut().remove(&surface_id);
            self.rebuild(attached.surface);
        }
        Some(engine)
    }

    /// Build a bridge for `surface` if it resolves to a document.
    ///
    /// Returns `Ok(false)` when the surface is not bound to any document.
    /// A surface that already has a bridge gets a fresh one. A document has
    /// at most one editor binding: any other surface bound to the same
    /// document is detached first.
    pub fn attach(&self, surface: Rc<S>) -> Result<bool, BridgeError> {
        let surface_id = surface.surface_id();
        self.detach(surface_id);

        let Some(bound) = self.resolver.resolve(&*surface) else {
            tracing::debug!(surface = %surface_id, "surface not bound to a document");
            return Ok(false);
        };
        if !bound.attached {
            tracing::debug!(
                surface = %surface_id,
                doc = %bound.id,
                "document detached, not attaching"
            );
            return Ok(false);
        }

        for (previous, _) in self.bridges_for(&bound.id) {
            tracing::info!(
                doc = %bound.id,
                previous = %previous,
                surface = %surface_id,
                "document rebound to another surface"
            );
            self.detach(previous);
        }

        let engine = self.engines.borrow().get(&bound.id).cloned();
        let identity = IdentityValidator::resolving(
            bound.id.clone(),
            self.resolver.clone(),
            surface.clone(),
        );
        let bridge = EditorBridge::new(
            engine,
            surface.clone(),
            identity,
            self.scheduler.clone(),
            self.config.clone(),
        )?;

        tracing::debug!(
            surface = %surface_id,
            doc = %bound.id,
            path = %bound.path,
            "surface attached"
        );
        self.bridges
            .borrow_mut()
            .insert(surface_id, Attached { bridge, surface });
        Ok(true)
    }

    /// Route an editor update to the surface's bridge.
    ///
    /// A bridge whose identity no longer holds is torn down and rebuilt
    /// against the surface's current document before the update goes
    /// anywhere.
    pub fn on_editor_update(&self, surface_id: SurfaceId, update: &EditorUpdate) {
        let Some(attached) = self.bridges.borrow().get(&surface_id).cloned() else {
            return;
        };

        if attached.bridge.is_identity_valid() {
            attached.bridge.on_editor_update(update);
            return;
        }

        tracing::info!(
            surface = %surface_id,
            doc = %attached.bridge.document_id(),
            "surface identity changed, rebuilding bridge"
        );
        attached.bridge.destroy();
        self.bridges.borrow_mut().remove(&surface_id);

        if self.rebuild(attached.surface) {
            if let Some(bridge) = self.bridge(surface_id) {
                bridge.on_editor_update(update);
            }
        }
    }

    /// Tear down the surface's bridge, if any.
    pub fn detach(&self, surface_id: SurfaceId) -> bool {
        let removed = self.bridges.borrow_mut().remove(&surface_id);
        match removed {
            Some(attached) => {
                attached.bridge.destroy();
                true
            }
            None => false,
        }
    }

    /// Destroy every bridge and drop every engine.
    pub fn shutdown(&self) {
        let bridges: Vec<_> = self.bridges.borrow_mut().drain().collect();
        for (_, attached) in bridges {
            attached.bridge.destroy();
        }
        self.engines.borrow_mut().clear();
        tracing::debug!("bridge registry shut down");
    }

    pub fn bridge(&self, surface_id: SurfaceId) -> Option<EditorBridge<E, S>> {
        self.bridges
            .borrow()
            .get(&surface_id)
            .map(|a| a.bridge.clone())
    }

    pub fn engine(&self, doc: &DocumentId) -> Option<Rc<E>> {
        self.engines.borrow().get(doc).cloned()
    }

    pub fn len(&self) -> usize {
        self.bridges.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bridges.borrow().is_empty()
    }

    fn bridges_for(&self, doc: &DocumentId) -> Vec<(SurfaceId, Attached<E, S>)> {
        self.bridges
            .borrow()
            .iter()
            .filter(|(_, a)| a.bridge.document_id() == doc)
            .map(|(id, a)| (*id, a.clone()))
            .collect()
    }

    fn rebuild(&self, surface: Rc<S>) -> bool {
        let surface_id = surface.surface_id();
        match self.attach(surface) {
            Ok(attached) => attached,
            Err(e) => {
                tracing::warn!(surface = %surface_id, error = %e, "failed to rebuild bridge");
                false
            }
        }
    }
}
