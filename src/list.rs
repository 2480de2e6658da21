//! Pooled backing store for scope registration lists.
//!
//! A [`DisposeList`] is an ordered container of registered resources. The
//! scope stack manager only consumes four operations: append, remove by
//! identity, indexed lookup, and [`release`](DisposeList::release). Release
//! hands the backing buffer to a small process-wide pool so that the
//! begin/register/exit hot path of short-lived scopes (one per request, say)
//! does not allocate once the pool is warm.
//!
//! The list is not internally synchronized; the scope stack manager wraps it
//! in a mutex and guarantees each list is only reached from continuations
//! descended from the flow that created its scope.

use crate::scope::Disposable;
use parking_lot::Mutex;
use std::sync::Arc;

/// A registered resource: one shared handle scheduling one release call.
pub type Entry = Arc<dyn Disposable>;

/// Buffers kept warm for reuse. Beyond this the backing storage is freed.
const MAX_POOLED: usize = 32;

static BUFFER_POOL: Mutex<Vec<Vec<Entry>>> = Mutex::new(Vec::new());

fn checkout(capacity: usize) -> Vec<Entry> {
    let reused = BUFFER_POOL.lock().pop();
    match reused {
        Some(mut buffer) => {
            if buffer.capacity() < capacity {
                buffer.reserve(capacity - buffer.capacity());
            }
            buffer
        }
        None => Vec::with_capacity(capacity),
    }
}

fn recycle(mut buffer: Vec<Entry>) {
    buffer.clear();
    if buffer.capacity() == 0 {
        return;
    }
    let mut pool = BUFFER_POOL.lock();
    if pool.len() < MAX_POOLED {
        pool.push(buffer);
    }
}

/// Returns whether two entries refer to the same resource allocation.
///
/// Identity is the data pointer of the shared allocation, so two handles to
/// the same resource compare equal while two resources with identical
/// contents do not.
#[must_use]
pub fn same_resource(a: &Entry, b: &Entry) -> bool {
    std::ptr::eq(Arc::as_ptr(a).cast::<u8>(), Arc::as_ptr(b).cast::<u8>())
}

/// An insertion-ordered list of pending disposables over pooled storage.
pub struct DisposeList {
    entries: Vec<Entry>,
}

impl DisposeList {
    /// Creates a list sized for `capacity` registrations, reusing a pooled
    /// buffer when one is available.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: checkout(capacity),
        }
    }

    /// Appends a resource, preserving insertion order.
    pub fn append(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    /// Removes the first occurrence of `target` by identity.
    ///
    /// Returns whether an entry was removed; an absent resource is a no-op.
    pub fn remove(&mut self, target: &Entry) -> bool {
        match self.entries.iter().position(|e| same_resource(e, target)) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Returns a handle to the entry at `index`, if present.
    ///
    /// The length is re-read on every call, so entries appended while a
    /// release cascade is in flight are still reached by it.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Entry> {
        self.entries.get(index).cloned()
    }

    /// Number of pending registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list holds no registrations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops all entries and returns the backing buffer to the pool.
    ///
    /// Must run on every scope exit, including the empty-list path, so the
    /// container itself is never leaked. A list dropped without `release`
    /// frees its buffer instead of pooling it.
    pub fn release(&mut self) {
        recycle(std::mem::take(&mut self.entries));
    }
}

impl std::fmt::Debug for DisposeList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisposeList")
            .field("len", &self.entries.len())
            .field("capacity", &self.entries.capacity())
            .finish()
    }
}
