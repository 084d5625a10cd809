//! Buffer for edits made before the engine is reachable.
//!
//! The editor view can exist and accept typing before the shared-document
//! session is ready. Each batch is queued with a full-text snapshot, since
//! the engine needs whole-document context to merge it later.

use std::collections::VecDeque;

use web_time::Instant;

use crate::change::PositionedChange;

/// Default queue capacity before collapsing to a snapshot.
pub const DEFAULT_PENDING_CAPACITY: usize = 512;

/// One queued editor batch.
#[derive(Clone, Debug)]
pub struct PendingEdit {
    pub changes: Vec<PositionedChange>,
    /// Editor text right after `changes` were applied.
    pub full_text: String,
    pub queued_at: Instant,
}

impl PendingEdit {
    pub fn new(changes: Vec<PositionedChange>, full_text: String) -> Self {
        Self {
            changes,
            full_text,
            queued_at: Instant::now(),
        }
    }

    /// Entry produced by collapsing an overflowing queue. Carries no change
    /// list; receivers reconcile from `full_text`.
    pub fn is_snapshot_only(&self) -> bool {
        self.changes.is_empty()
    }
}

impl PartialEq for PendingEdit {
    fn eq(&self, other: &Self) -> bool {
        // queued_at is bookkeeping, not content
        self.changes == other.changes && self.full_text == other.full_text
    }
}

/// FIFO queue of [`PendingEdit`]s with a soft capacity.
#[derive(Debug)]
pub struct PendingEdits {
    queue: VecDeque<PendingEdit>,
    capacity: usize,
    collapsed: u64,
}

impl Default for PendingEdits {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_PENDING_CAPACITY)
    }
}

impl PendingEdits {
    /// Capacity is clamped to at least one entry.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            capacity: capacity.max(1),
            collapsed: 0,
        }
    }

    /// Queue an edit.
    ///
    /// When the queue is full it collapses into a single snapshot-only entry
    /// holding the newest full text. Every queued entry's text is a prefix
    /// state of that snapshot, so the engine converges to the same result.
    pub fn push(&mut self, edit: PendingEdit) {
        if self.queue.len() >= self.capacity {
            let dropped = self.queue.len();
            self.queue.clear();
            self.collapsed += 1;
            tracing::warn!(
                dropped,
                capacity = self.capacity,
                "pending edit buffer full, collapsing to snapshot"
            );
            self.queue.push_back(PendingEdit {
                changes: Vec::new(),
                full_text: edit.full_text,
                queued_at: edit.queued_at,
            });
            return;
        }
        self.queue.push_back(edit);
    }

    /// Take every entry in arrival order, leaving the buffer empty.
    pub fn drain(&mut self) -> Vec<PendingEdit> {
        self.queue.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// How many times the queue overflowed.
    pub fn collapsed(&self) -> u64 {
        self.collapsed
    }
}
