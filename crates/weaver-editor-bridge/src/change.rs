//! Change translation between the host editor and the document engine.
//!
//! The host reports edits as contiguous changed regions with both pre-edit
//! and post-edit offsets. The engine speaks in `PositionedChange` batches
//! expressed in pre-edit coordinates. Translation is a pure mapping: no
//! validation happens here.
//!
//! All offsets are in Unicode scalar values (chars), not bytes or UTF-16.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

use crate::surface::{Annotation, EditorTransaction};

/// A contiguous text replacement: chars `[from, to)` of the pre-edit buffer
/// are replaced by `insert`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionedChange {
    pub from: usize,
    pub to: usize,
    pub insert: SmolStr,
}

impl PositionedChange {
    pub fn new(from: usize, to: usize, insert: impl Into<SmolStr>) -> Self {
        Self {
            from,
            to,
            insert: insert.into(),
        }
    }

    /// Pure insertion at `at`.
    pub fn insertion(at: usize, insert: impl Into<SmolStr>) -> Self {
        Self::new(at, at, insert)
    }

    /// Pure deletion of `[from, to)`.
    pub fn deletion(from: usize, to: usize) -> Self {
        Self::new(from, to, SmolStr::default())
    }

    /// Zero-length range.
    pub fn is_insertion(&self) -> bool {
        self.from == self.to
    }

    /// Zero-length insert.
    pub fn is_deletion(&self) -> bool {
        self.insert.is_empty() && self.to > self.from
    }

    /// Number of chars removed from the pre-edit buffer.
    pub fn deleted_len(&self) -> usize {
        self.to.saturating_sub(self.from)
    }

    /// Number of chars inserted.
    pub fn inserted_len(&self) -> usize {
        self.insert.chars().count()
    }
}

/// One changed region as reported by the host's change iteration.
///
/// `from_a..to_a` is the replaced range in the pre-edit document,
/// `from_b..to_b` the range the inserted text occupies afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangedRegion {
    pub from_a: usize,
    pub to_a: usize,
    pub from_b: usize,
    pub to_b: usize,
    pub inserted: SmolStr,
}

/// Errors applying a change batch to plain text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChangeError {
    /// A change has `from > to`.
    #[error("inverted change range {from}..{to}")]
    Inverted { from: usize, to: usize },

    /// A change reaches past the end of the document.
    #[error("change {from}..{to} out of bounds for document of {len} chars")]
    OutOfBounds { from: usize, to: usize, len: usize },

    /// Two changes in one batch touch the same range.
    #[error("changes overlap at char {at}")]
    Overlapping { at: usize },
}

/// Editor → engine: translate host regions into an ordered change batch.
///
/// Order is preserved verbatim; the receiver applies the batch as one
/// transaction.
pub fn from_regions<'a>(
    regions: impl IntoIterator<Item = &'a ChangedRegion>,
) -> Vec<PositionedChange> {
    regions
        .into_iter()
        .map(|region| PositionedChange {
            from: region.from_a,
            to: region.to_a,
            insert: region.inserted.clone(),
        })
        .collect()
}

/// Engine → editor: wrap a change batch in an editor transaction tagged with
/// `annotation`.
pub fn to_transaction(changes: &[PositionedChange], annotation: Annotation) -> EditorTransaction {
    EditorTransaction {
        changes: changes.to_vec(),
        annotation: Some(annotation),
    }
}

/// Validate a batch against a document of `len` chars and return the change
/// indices ordered by position.
///
/// Changes are interpreted in pre-edit coordinates, so they may arrive in any
/// order but must not overlap. Two pure insertions at the same offset are
/// allowed and keep their batch order.
pub fn sorted_for_apply(
    changes: &[PositionedChange],
    len: usize,
) -> Result<Vec<usize>, ChangeError> {
    for change in changes {
        if change.from > change.to {
            return Err(ChangeError::Inverted {
                from: change.from,
                to: change.to,
            });
        }
        if change.to > len {
            return Err(ChangeError::OutOfBounds {
                from: change.from,
                to: change.to,
                len,
            });
        }
    }

    let mut order: Vec<usize> = (0..changes.len()).collect();
    // Stable sort keeps batch order for same-offset insertions.
    order.sort_by_key(|&i| (changes[i].from, changes[i].to));

    for pair in order.windows(2) {
        let (prev, next) = (&changes[pair[0]], &changes[pair[1]]);
        if next.from < prev.to {
            return Err(ChangeError::Overlapping { at: next.from });
        }
    }

    Ok(order)
}

/// Apply a batch in pre-edit coordinates to a plain string.
pub fn apply_to_string(text: &str, changes: &[PositionedChange]) -> Result<String, ChangeError> {
    let chars: Vec<char> = text.chars().collect();
    let order = sorted_for_apply(changes, chars.len())?;

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for i in order {
        let change = &changes[i];
        out.extend(&chars[cursor..change.from]);
        out.push_str(&change.insert);
        cursor = change.to;
    }
    out.extend(&chars[cursor..]);
    Ok(out)
}
