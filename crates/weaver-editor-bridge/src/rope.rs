//! Ropey-backed in-memory editor surface.
//!
//! Behaves like a host view: batches apply atomically in pre-edit
//! coordinates, every applied transaction produces an [`EditorUpdate`] with
//! before/after regions, and listeners are notified either synchronously
//! from inside `apply` or later via [`RopeSurface::flush_deferred`].

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use smol_str::SmolStr;

use crate::change::{ChangedRegion, PositionedChange, sorted_for_apply};
use crate::surface::{EditorSurface, EditorTransaction, EditorUpdate, SurfaceError, SurfaceId};

/// Callback invoked with each update the surface produces.
pub type UpdateListener = Rc<dyn Fn(&EditorUpdate)>;

/// How a [`RopeSurface`] delivers update notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Listeners run inside `apply`, before it returns.
    #[default]
    Synchronous,
    /// Updates queue until `flush_deferred` is called.
    Deferred,
}

/// In-memory editor view backed by a [`ropey::Rope`].
pub struct RopeSurface {
    id: SurfaceId,
    rope: RefCell<ropey::Rope>,
    listeners: RefCell<Vec<UpdateListener>>,
    delivery: Cell<Delivery>,
    deferred: RefCell<VecDeque<EditorUpdate>>,
    closed: Cell<bool>,
}

impl RopeSurface {
    /// Create a surface holding `text`.
    pub fn new(id: SurfaceId, text: &str) -> Self {
        Self {
            id,
            rope: RefCell::new(ropey::Rope::from_str(text)),
            listeners: RefCell::new(Vec::new()),
            delivery: Cell::new(Delivery::Synchronous),
            deferred: RefCell::new(VecDeque::new()),
            closed: Cell::new(false),
        }
    }

    pub fn set_delivery(&self, delivery: Delivery) {
        self.delivery.set(delivery);
    }

    /// Register a listener for update notifications.
    pub fn on_update(&self, listener: UpdateListener) {
        self.listeners.borrow_mut().push(listener);
    }

    /// Length in chars.
    pub fn len_chars(&self) -> usize {
        self.rope.borrow().len_chars()
    }

    /// Simulate a user edit: applies `changes` without an annotation.
    pub fn edit(&self, changes: Vec<PositionedChange>) -> Result<(), SurfaceError> {
        self.apply(EditorTransaction {
            changes,
            annotation: None,
        })
    }

    /// Replace the whole buffer without producing an update.
    ///
    /// Models edit paths that bypass the editor's change notifications.
    pub fn overwrite_untracked(&self, text: &str) {
        *self.rope.borrow_mut() = ropey::Rope::from_str(text);
    }

    /// Deliver every queued update, oldest first.
    pub fn flush_deferred(&self) {
        loop {
            let next = self.deferred.borrow_mut().pop_front();
            match next {
                Some(update) => self.notify(&update),
                None => break,
            }
        }
    }

    /// Number of updates waiting for `flush_deferred`.
    pub fn deferred_len(&self) -> usize {
        self.deferred.borrow().len()
    }

    /// Stop accepting transactions.
    pub fn close(&self) {
        self.closed.set(true);
        self.listeners.borrow_mut().clear();
        self.deferred.borrow_mut().clear();
    }

    fn notify(&self, update: &EditorUpdate) {
        // Listeners may re-enter the surface, so no borrow is held while they run.
        let listeners: Vec<UpdateListener> = self.listeners.borrow().clone();
        for listener in listeners {
            listener(update);
        }
    }

    /// Apply a validated batch and compute the host-style changed regions.
    fn apply_changes(
        &self,
        changes: &[PositionedChange],
    ) -> Result<Vec<ChangedRegion>, SurfaceError> {
        let mut rope = self.rope.borrow_mut();
        let order = sorted_for_apply(changes, rope.len_chars())?;

        let mut regions = Vec::with_capacity(order.len());
        let mut shift: isize = 0;
        for &i in &order {
            let change = &changes[i];
            if change.deleted_len() == 0 && change.insert.is_empty() {
                continue;
            }
            let from_b = (change.from as isize + shift) as usize;
            let inserted_len = change.inserted_len();
            regions.push(ChangedRegion {
                from_a: change.from,
                to_a: change.to,
                from_b,
                to_b: from_b + inserted_len,
                inserted: SmolStr::new(&change.insert),
            });
            shift += inserted_len as isize - change.deleted_len() as isize;
        }

        // Back to front so earlier offsets stay valid.
        for &i in order.iter().rev() {
            let change = &changes[i];
            if change.to > change.from {
                rope.remove(change.from..change.to);
            }
            if !change.insert.is_empty() {
                rope.insert(change.from, &change.insert);
            }
        }

        Ok(regions)
    }
}

impl EditorSurface for RopeSurface {
    fn surface_id(&self) -> SurfaceId {
        self.id
    }

    fn text(&self) -> String {
        self.rope.borrow().to_string()
    }

    fn apply(&self, transaction: EditorTransaction) -> Result<(), SurfaceError> {
        if self.closed.get() {
            return Err(SurfaceError::Closed);
        }

        let regions = self.apply_changes(&transaction.changes)?;
        let update = EditorUpdate {
            doc_changed: !regions.is_empty(),
            regions,
            annotations: transaction.annotation.into_iter().collect(),
        };

        match self.delivery.get() {
            Delivery::Synchronous => self.notify(&update),
            Delivery::Deferred => self.deferred.borrow_mut().push_back(update),
        }
        Ok(())
    }
}
