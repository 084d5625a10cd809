//! Error types for bridge construction and configuration.
//!
//! Runtime crossings never surface errors to the host: stale bindings,
//! drift and failed dispatches are logged and skipped. Only binding and
//! configuration mistakes are reported to the caller.

use miette::Diagnostic;
use thiserror::Error;

use crate::identity::DocumentId;

/// Errors from building a bridge or binding it to an engine.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BridgeError {
    /// The bridge was torn down; build a new one instead.
    #[error("bridge for {doc} is destroyed")]
    #[diagnostic(code(bridge::destroyed))]
    Destroyed { doc: DocumentId },

    /// A bridge binds to at most one engine for its lifetime.
    #[error("bridge for {doc} is already bound to an engine")]
    #[diagnostic(
        code(bridge::already_bound),
        help("destroy the bridge and create a new one to rebind")
    )]
    AlreadyBound { doc: DocumentId },

    /// The engine owns a different document than the bridge was built for.
    #[error("engine owns {found}, bridge expects {expected}")]
    #[diagnostic(code(bridge::identity_mismatch))]
    IdentityMismatch {
        expected: DocumentId,
        found: DocumentId,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

/// Configuration errors.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {message}")]
    #[diagnostic(code(config::invalid_env))]
    InvalidEnv {
        var: &'static str,
        value: String,
        message: String,
    },

    #[error("drift interval must be greater than zero")]
    #[diagnostic(code(config::zero_interval))]
    ZeroInterval,
}
