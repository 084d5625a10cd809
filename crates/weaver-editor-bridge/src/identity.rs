//! Identity validation for editor ↔ engine crossings.
//!
//! A bridge is built for one logical document. Views get reused across
//! files and files get renamed or detached, so every crossing re-resolves the
//! surface's current document and compares it to the identity captured at
//! construction. Nothing is cached.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Stable logical-document id (guid). Survives renames; distinct from path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(SmolStr);

impl DocumentId {
    pub fn new(guid: impl Into<SmolStr>) -> Self {
        Self(guid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// The logical document a surface is currently showing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundDocument {
    pub id: DocumentId,
    /// Mutable vault path; informational only.
    pub path: SmolStr,
    /// False once the document was detached from the shared folder.
    pub attached: bool,
}

impl BoundDocument {
    pub fn new(id: impl Into<DocumentId>, path: impl Into<SmolStr>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            attached: true,
        }
    }
}

/// Resolves which logical document a surface is bound to.
///
/// Injected rather than looked up globally so tests can substitute a fake.
pub trait DocumentResolver<S: ?Sized> {
    fn resolve(&self, surface: &S) -> Option<BoundDocument>;
}

/// Zero-argument identity predicate plus the identity it guards.
pub struct IdentityValidator {
    expected: DocumentId,
    check: Box<dyn Fn() -> bool>,
}

impl IdentityValidator {
    /// Wrap a caller-supplied check.
    pub fn new(expected: DocumentId, check: impl Fn() -> bool + 'static) -> Self {
        Self {
            expected,
            check: Box::new(check),
        }
    }

    /// Check that re-resolves `surface` through `resolver` on every call.
    ///
    /// Invalid when the surface is unbound, bound to another document, or
    /// its document is detached.
    pub fn resolving<S, R>(expected: DocumentId, resolver: Rc<R>, surface: Rc<S>) -> Self
    where
        S: ?Sized + 'static,
        R: DocumentResolver<S> + ?Sized + 'static,
    {
        let want = expected.clone();
        Self::new(expected, move || match resolver.resolve(&*surface) {
            Some(doc) => doc.attached && doc.id == want,
            None => false,
        })
    }

    /// A validator that always passes. Useful for hosts without view reuse.
    pub fn always(expected: DocumentId) -> Self {
        Self::new(expected, || true)
    }

    pub fn expected(&self) -> &DocumentId {
        &self.expected
    }

    /// Re-evaluate the check.
    pub fn is_valid(&self) -> bool {
        (self.check)()
    }
}

impl fmt::Debug for IdentityValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityValidator")
            .field("expected", &self.expected)
            .finish_non_exhaustive()
    }
}
