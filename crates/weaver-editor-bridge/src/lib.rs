//! weaver-editor-bridge: keeps a live editor surface and a CRDT document
//! engine in sync.
//!
//! This crate provides:
//! - `EditorBridge` - per-surface lifecycle controller wiring both directions
//! - `FeedbackSuppressor` - flag + annotation suppression of self-inflicted updates
//! - `IdentityValidator` - re-checks the surface's bound document on every crossing
//! - `PendingEdits` - bounded FIFO of edits made before the engine is reachable
//! - `DriftDetector` + `Scheduler` - periodic compare-and-correct
//! - `BridgeRegistry` - surface/engine bookkeeping for the integration layer
//! - `RopeSurface` - ropey-backed in-memory editor surface

pub mod bridge;
pub mod change;
pub mod config;
pub mod drift;
pub mod engine;
pub mod error;
pub mod identity;
pub mod pending;
pub mod registry;
pub mod rope;
pub mod schedule;
pub mod surface;
pub mod suppress;

pub use bridge::{BridgeState, BridgeStats, DecorationConnector, EditorBridge};
pub use change::{ChangeError, ChangedRegion, PositionedChange};
pub use config::BridgeConfig;
pub use drift::{DEFAULT_DRIFT_INTERVAL, DriftDetector, DriftOutcome};
pub use engine::{
    ChangeOrigin, DocumentEngine, EffectCallback, EffectSubscription, EngineEffect, EngineError,
    EngineEvent, EngineNotice,
};
pub use error::{BridgeError, ConfigError};
pub use identity::{BoundDocument, DocumentId, DocumentResolver, IdentityValidator};
pub use pending::{DEFAULT_PENDING_CAPACITY, PendingEdit, PendingEdits};
pub use registry::BridgeRegistry;
pub use rope::{Delivery, RopeSurface, UpdateListener};
pub use schedule::{LocalScheduler, ManualScheduler, Scheduler, TickControl, TimerHandle};
pub use smol_str::SmolStr;
pub use surface::{
    Annotation, ENGINE_SYNC, EditorSurface, EditorTransaction, EditorUpdate, SurfaceError,
    SurfaceId,
};
pub use suppress::{FeedbackSuppressor, SuppressReason};
