//! Scoped units of work: the host-pipeline integration point.
//!
//! A host (a request pipeline, a job runner) wraps one unit of work in
//! [`scoped`] and awaits the result. The wrapper begins a scope at first
//! poll, keeps it current for every poll of the inner future, and exits it —
//! running the full release cascade — once the unit of work completes. If
//! the wrapper is dropped before completion (the request was aborted), the
//! cascade still runs, so "no scope exit ⇒ no release" can only be violated
//! by never dropping the wrapper at all.
//!
//! The core knows nothing about requests or transports; this wrapper plus
//! [`ScopedFutureExt::in_current_scope`](crate::ScopedFutureExt::in_current_scope)
//! for spawned continuations is the whole host contract.
//!
//! ```ignore
//! use dispose_scope::{scoped_with, ScopeOptions};
//!
//! async fn handle(request: Request) -> Response {
//!     scoped_with(ScopeOptions::default(), process(request)).await
//! }
//! ```
//!
//! Release failures at the end of a unit of work are logged through
//! [`tracing_compat`](crate::tracing_compat) rather than replacing the unit's
//! output; callers that need the cascade result drive a
//! [`DisposeScope`](crate::DisposeScope) handle directly instead.

use crate::propagate::CellInstall;
use crate::scope::{
    begin_scope_with, cell_get, CellValue, DisposeScope, ScopeOption, DEFAULT_CAPACITY,
};
use crate::tracing_compat::error;
use pin_project::{pin_project, pinned_drop};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Configuration for one scoped unit of work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScopeOptions {
    /// Join semantics for the unit's scope.
    pub option: ScopeOption,
    /// Sizing hint for the unit's registration list.
    pub capacity: usize,
}

impl Default for ScopeOptions {
    fn default() -> Self {
        Self {
            option: ScopeOption::Required,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Wraps `future` in a scope with default options.
pub fn scoped<F: Future>(future: F) -> Scoped<F> {
    scoped_with(ScopeOptions::default(), future)
}

/// Wraps `future` in a scope with explicit options.
///
/// The ambient scope of the calling flow is captured here, so a `Required`
/// unit created inside an active scope joins it.
pub fn scoped_with<F: Future>(options: ScopeOptions, future: F) -> Scoped<F> {
    Scoped {
        inner: future,
        stash: cell_get(),
        options,
        scope: None,
    }
}

/// A unit of work owning one dispose scope for its entire lifetime.
///
/// Created by [`scoped`] / [`scoped_with`].
#[pin_project(PinnedDrop)]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Scoped<F> {
    #[pin]
    inner: F,
    stash: CellValue,
    options: ScopeOptions,
    scope: Option<DisposeScope>,
}

impl<F: Future> Future for Scoped<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _install = CellInstall::new(this.stash);
        if this.scope.is_none() {
            *this.scope = Some(begin_scope_with(this.options.option, this.options.capacity));
        }
        let result = this.inner.poll(cx);
        if result.is_ready() {
            if let Some(scope) = this.scope.take() {
                if let Err(err) = scope.exit() {
                    error!(error = %err, "release failures at end of scoped unit of work");
                    let _ = err;
                }
            }
        }
        result
    }
}

#[pinned_drop]
impl<F> PinnedDrop for Scoped<F> {
    fn drop(self: Pin<&mut Self>) {
        let this = self.project();
        // Unit dropped before completion: exit with the unit's own cell
        // value installed so the cascade and cell restore land on this flow.
        if let Some(scope) = this.scope.take() {
            let _install = CellInstall::new(this.stash);
            if let Err(err) = scope.exit() {
                error!(error = %err, "release failures while dropping scoped unit of work");
                let _ = err;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{is_active, register, Disposable};
    use crate::BoxError;
    use futures::executor::block_on;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counted(AtomicUsize);

    impl Counted {
        fn new() -> Arc<Self> {
            Arc::new(Self(AtomicUsize::new(0)))
        }

        fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    impl Disposable for Counted {
        fn dispose(&self) -> Result<(), BoxError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn unit_releases_on_completion() {
        let a = Counted::new();
        let a2 = a.clone();
        let out = block_on(scoped(async move {
            assert!(is_active());
            register(a2).unwrap();
            7
        }));
        assert_eq!(out, 7);
        assert_eq!(a.count(), 1);
        assert!(!is_active());
    }

    #[test]
    fn dropped_unit_still_releases() {
        let a = Counted::new();
        let a2 = a.clone();
        let mut unit = Box::pin(scoped(async move {
            register(a2).unwrap();
            std::future::pending::<()>().await;
        }));

        let mut cx = Context::from_waker(futures::task::noop_waker_ref());
        assert!(unit.as_mut().poll(&mut cx).is_pending());
        assert_eq!(a.count(), 0);

        drop(unit);
        assert_eq!(a.count(), 1);
        assert!(!is_active());
    }

    #[test]
    fn required_unit_joins_enclosing_unit() {
        let a = Counted::new();
        let a2 = a.clone();
        let released_before_inner_ended = Arc::new(AtomicUsize::new(usize::MAX));
        let seen = released_before_inner_ended.clone();

        block_on(scoped(async move {
            let inner = a2.clone();
            scoped(async move {
                register(inner).unwrap();
            })
            .await;
            // Registration joined the outer unit, so nothing is released when
            // the inner unit ends.
            seen.store(a2.count(), Ordering::SeqCst);
        }));

        assert_eq!(released_before_inner_ended.load(Ordering::SeqCst), 0);
        assert_eq!(a.count(), 1);
    }

    #[test]
    fn requires_new_unit_releases_at_its_own_end() {
        let inner_res = Counted::new();
        let outer_res = Counted::new();
        let inner2 = inner_res.clone();
        let outer2 = outer_res.clone();
        let inner_count_mid = Arc::new(AtomicUsize::new(usize::MAX));
        let mid = inner_count_mid.clone();

        block_on(scoped(async move {
            register(outer2).unwrap();
            scoped_with(
                ScopeOptions {
                    option: ScopeOption::RequiresNew,
                    capacity: 4,
                },
                async move {
                    register(inner2.clone()).unwrap();
                    inner2
                },
            )
            .await;
            mid.store(outer_res.count(), Ordering::SeqCst);
        }));

        // Inner unit released its own registration; outer was untouched until
        // the outer unit ended.
        assert_eq!(inner_res.count(), 1);
        assert_eq!(inner_count_mid.load(Ordering::SeqCst), 0);
    }
}
