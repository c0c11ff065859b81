//! Set of pending acquirers, optimized for three operations: adding an
//! element, removing an element by the caller who added it, and taking a
//! uniformly random element. Random selection is what gives the pool its
//! fairness under contention; handle-based deletion lets a cancelled
//! acquirer leave in O(1) without scanning.

use std::sync::{
    atomic::{AtomicIsize, Ordering},
    Arc,
};

use rand::Rng;
use tokio::sync::oneshot;

/// Sentinel index meaning "no longer in the set".
const GONE: isize = -1;

/// Opaque handle for removing a previously added waiter.
///
/// Valid until the waiter is taken or deleted; after that, [`WaiterSet::delete`]
/// reports `false`.
pub(crate) struct WaiterHandle {
    idx: Arc<AtomicIsize>,
}

struct WaiterEntry<T> {
    tx: oneshot::Sender<T>,
    /// Current position of this entry in `slots`, shared with the handle.
    /// Set to [`GONE`] upon removal.
    idx: Arc<AtomicIsize>,
}

/// The waiter set itself. All methods must be called under the pool lock.
#[derive(Default)]
pub(crate) struct WaiterSet<T> {
    slots: Vec<WaiterEntry<T>>,
}

impl<T> WaiterSet<T> {
    pub(crate) fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Add a delivery slot, returning the handle to remove it later.
    pub(crate) fn add(&mut self, tx: oneshot::Sender<T>) -> WaiterHandle {
        let idx = Arc::new(AtomicIsize::new(self.slots.len() as isize));
        self.slots.push(WaiterEntry {
            tx,
            idx: idx.clone(),
        });
        WaiterHandle { idx }
    }

    /// Remove the element behind `handle`.
    ///
    /// Reports whether the element was still present. `false` means a
    /// concurrent [`Self::take_random`] or [`Self::close_and_remove_all`]
    /// got there first, or the handle was already used.
    pub(crate) fn delete(&mut self, handle: &WaiterHandle) -> bool {
        let idx = handle.idx.load(Ordering::Relaxed);
        if idx < 0 {
            return false;
        }
        self.delete_index(idx as usize);
        true
    }

    /// Take a uniformly random delivery slot, if any.
    pub(crate) fn take_random(&mut self) -> Option<oneshot::Sender<T>> {
        if self.slots.is_empty() {
            return None;
        }
        let pick = rand::thread_rng().gen_range(0..self.slots.len());
        Some(self.delete_index(pick))
    }

    /// Drop every delivery slot, signalling shutdown to all waiters, and
    /// empty the set.
    pub(crate) fn close_and_remove_all(&mut self) {
        for entry in self.slots.drain(..) {
            entry.idx.store(GONE, Ordering::Relaxed);
            // Dropping the sender closes the waiter's receive side.
        }
    }

    fn delete_index(&mut self, idx: usize) -> oneshot::Sender<T> {
        self.slots[idx].idx.store(GONE, Ordering::Relaxed);
        let last = self.slots.len() - 1;
        if idx != last {
            // The former last element moves into the hole; tell its handle.
            self.slots[last].idx.store(idx as isize, Ordering::Relaxed);
        }
        self.slots.swap_remove(idx).tx
    }
}
