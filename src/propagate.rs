//! Continuation-local propagation of the current scope.
//!
//! The current-scope cell must behave as continuation-local state: a child
//! continuation spawned from inside an active scope observes that scope as
//! current even on another worker thread, while mutations made inside the
//! child (nested scopes) stay invisible to siblings and to the parent.
//!
//! The mechanism is copy-on-branch, restore-on-join. A [`ScopeSnapshot`]
//! captures the spawning flow's cell value; [`WithScope`] carries that value
//! with the child future and swaps it into the thread's cell around every
//! poll, swapping the (possibly mutated) value back out when the poll
//! returns. Each logical flow therefore polls against its own value, and a
//! nested scope held open across an `.await` travels with its flow instead
//! of leaking to whatever runs next on the worker thread.
//!
//! ```ignore
//! use dispose_scope::ScopedFutureExt;
//!
//! // Inside an active scope: both children see it as current, and a
//! // nested scope begun in one child is invisible in the other.
//! let a = tokio::spawn(work_a().in_current_scope());
//! let b = tokio::spawn(work_b().in_current_scope());
//! ```

use crate::scope::{cell_get, cell_replace, CellValue};
use pin_project::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A captured current-scope value, taken at spawn time.
///
/// Cloning the snapshot is cheap; every clone refers to the same owning
/// scope, so registrations made through any of them land in one list.
#[derive(Clone)]
pub struct ScopeSnapshot {
    value: CellValue,
}

impl ScopeSnapshot {
    /// Captures the calling flow's current scope.
    #[must_use]
    pub fn capture() -> Self {
        Self { value: cell_get() }
    }

    /// Whether the captured value holds an active scope.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.value.is_some()
    }

    /// Attaches the captured scope to `future`, making it current whenever
    /// the future is polled, on any thread.
    pub fn attach<F: Future>(&self, future: F) -> WithScope<F> {
        WithScope {
            inner: future,
            stash: self.value.clone(),
        }
    }
}

impl std::fmt::Debug for ScopeSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeSnapshot")
            .field("active", &self.value.is_some())
            .finish()
    }
}

/// Installs `stash` into the thread cell for the duration of one poll and
/// swaps the cell's value back into the stash on drop, so the flow's value
/// survives panics in the inner future and never leaks to the worker thread.
pub(crate) struct CellInstall<'a> {
    stash: &'a mut CellValue,
    outer: CellValue,
}

impl<'a> CellInstall<'a> {
    pub(crate) fn new(stash: &'a mut CellValue) -> Self {
        let outer = cell_replace(stash.take());
        Self { stash, outer }
    }
}

impl Drop for CellInstall<'_> {
    fn drop(&mut self) {
        *self.stash = cell_replace(self.outer.take());
    }
}

/// A future that carries its own current-scope value.
///
/// Created by [`ScopeSnapshot::attach`] or
/// [`ScopedFutureExt::in_current_scope`].
#[pin_project]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct WithScope<F> {
    #[pin]
    inner: F,
    stash: CellValue,
}

impl<F: Future> Future for WithScope<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _install = CellInstall::new(this.stash);
        this.inner.poll(cx)
    }
}

/// Extension methods attaching scope visibility to futures.
pub trait ScopedFutureExt: Future + Sized {
    /// Attaches the calling flow's current scope to this future.
    ///
    /// Call at spawn time, inside the scope that should stay visible:
    ///
    /// ```ignore
    /// tokio::spawn(child_work().in_current_scope());
    /// ```
    fn in_current_scope(self) -> WithScope<Self> {
        ScopeSnapshot::capture().attach(self)
    }

    /// Attaches a previously captured snapshot to this future.
    fn in_scope(self, snapshot: &ScopeSnapshot) -> WithScope<Self> {
        snapshot.attach(self)
    }
}

impl<F: Future + Sized> ScopedFutureExt for F {}
