//! The scope stack manager.
//!
//! This module owns the continuation-local "current scope" cell and the chain
//! of scopes it implies. [`begin_scope`] pushes a scope with one of three
//! join semantics, [`register`]/[`unregister`] dispatch to whichever scope
//! owns the ambient registration list, and [`DisposeScope::exit`] runs the
//! release cascade and pops the chain.
//!
//! # Current-Scope Cell
//!
//! The cell itself lives in thread-local storage, but it is only the *slot*
//! the propagation combinators install a logical flow's value into around
//! every poll (see [`propagate`](crate::propagate)). Purely synchronous call
//! trees may use `begin_scope` directly; async units of work must run under
//! [`scoped`](crate::scoped::scoped) or [`WithScope`](crate::WithScope) so
//! the cell follows the flow of control rather than the worker thread.
//!
//! # Exit Cascade
//!
//! Exit iterates the owned list in insertion order and invokes each entry's
//! release exactly once. The cascade is best-effort: a failed release never
//! stops later entries from being released. After the cascade the list's
//! backing storage is returned to the pool and the cell is restored to the
//! value captured at creation. Releases that register further resources
//! extend the cascade, since the list length is re-read each step.

use crate::error::{BoxError, Error};
use crate::list::{DisposeList, Entry};
use crate::tracing_compat::{debug, error, trace};
use parking_lot::Mutex;
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A resource that can be released exactly once by a scope exit.
///
/// `dispose` takes `&self` because the scope holds a shared handle; resources
/// needing mutation on release keep it behind interior mutability. A dispose
/// implementation should be idempotent on success, since the same resource
/// registered twice is scheduled for two release calls.
pub trait Disposable: Send + Sync {
    /// Releases the resource.
    fn dispose(&self) -> Result<(), BoxError>;
}

/// Join semantics for a new scope, fixed at creation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ScopeOption {
    /// Reuse the ambient scope when one exists; otherwise allocate a new
    /// registration list and become current. This is the default.
    #[default]
    Required,
    /// Always allocate a fresh registration list and become current,
    /// regardless of any ambient scope.
    RequiresNew,
    /// Hide the ambient scope: no scope is current while this one is active,
    /// and the previous scope resumes untouched on exit.
    Suppress,
}

/// Default sizing hint for a scope's registration list.
pub const DEFAULT_CAPACITY: usize = 8;

/// Shared state of a scope that owns a registration list.
pub(crate) struct ScopeCore {
    disposables: Mutex<DisposeList>,
}

impl ScopeCore {
    fn new(capacity: usize) -> Self {
        Self {
            disposables: Mutex::new(DisposeList::with_capacity(capacity)),
        }
    }
}

/// Value held by the current-scope cell: the innermost list-owning scope.
///
/// `None` means either "no scope" or "suppressed"; both behave identically
/// for registration.
pub(crate) type CellValue = Option<Arc<ScopeCore>>;

thread_local! {
    static CURRENT_SCOPE: RefCell<CellValue> = const { RefCell::new(None) };
}

pub(crate) fn cell_get() -> CellValue {
    CURRENT_SCOPE.with(|slot| slot.borrow().clone())
}

pub(crate) fn cell_replace(value: CellValue) -> CellValue {
    CURRENT_SCOPE.with(|slot| std::mem::replace(&mut *slot.borrow_mut(), value))
}

/// Restores the cell to `previous`, but only when it still holds what the
/// exiting scope installed. A handle that migrated to an unrelated flow must
/// not clobber that flow's cell on drop.
fn cell_restore(installed: &CellValue, previous: CellValue) {
    CURRENT_SCOPE.with(|slot| {
        let mut slot = slot.borrow_mut();
        let still_ours = match (&*slot, installed) {
            (None, None) => true,
            (Some(current), Some(expected)) => Arc::ptr_eq(current, expected),
            _ => false,
        };
        if still_ours {
            *slot = previous;
        }
    });
}

static ERROR_ON_MISSING_SCOPE: AtomicBool = AtomicBool::new(true);

/// Sets the process-wide policy for `register`/`unregister` calls made with
/// no active scope: error when `true` (the default), silent no-op when
/// `false`.
pub fn set_error_on_missing_scope(enabled: bool) {
    ERROR_ON_MISSING_SCOPE.store(enabled, Ordering::SeqCst);
}

/// Returns the current missing-scope policy.
#[must_use]
pub fn error_on_missing_scope() -> bool {
    ERROR_ON_MISSING_SCOPE.load(Ordering::SeqCst)
}

/// Returns whether a scope is active in the current context.
#[must_use]
pub fn is_active() -> bool {
    CURRENT_SCOPE.with(|slot| slot.borrow().is_some())
}

/// Begins a scope with [`ScopeOption::Required`] semantics and the default
/// capacity hint.
#[must_use = "a scope exits when its handle is dropped; bind the handle and call exit()"]
pub fn begin_scope() -> DisposeScope {
    begin_scope_with(ScopeOption::default(), DEFAULT_CAPACITY)
}

/// Begins a scope with explicit join semantics and list sizing hint.
///
/// The returned handle, when exited exactly once, leaves the current-scope
/// cell exactly as it was before this call.
#[must_use = "a scope exits when its handle is dropped; bind the handle and call exit()"]
pub fn begin_scope_with(option: ScopeOption, capacity: usize) -> DisposeScope {
    let (owned, previous) = match option {
        ScopeOption::Suppress => (None, cell_replace(None)),
        ScopeOption::RequiresNew => {
            let core = Arc::new(ScopeCore::new(capacity));
            let previous = cell_replace(Some(Arc::clone(&core)));
            (Some(core), previous)
        }
        ScopeOption::Required => {
            let ambient = cell_get();
            if ambient.is_some() {
                // Defer to the ambient owner: no list, cell untouched.
                (None, ambient)
            } else {
                let core = Arc::new(ScopeCore::new(capacity));
                let previous = cell_replace(Some(Arc::clone(&core)));
                (Some(core), previous)
            }
        }
    };
    trace!(?option, owns_list = owned.is_some(), "scope begun");
    DisposeScope {
        option,
        owned,
        previous,
        exited: false,
    }
}

/// Schedules `resource` for release when the owning scope exits.
///
/// Appends to the registration list of the innermost list-owning scope
/// (a `Required` scope defers upward to the ancestor that allocated the
/// list). Insertion order is preserved and there is no duplicate detection:
/// registering the same resource twice schedules two release calls.
///
/// # Errors
///
/// [`Error::NoActiveScope`] when no scope is active and the missing-scope
/// policy is set to error.
pub fn register(resource: Arc<dyn Disposable>) -> Result<(), Error> {
    match cell_get() {
        Some(core) => {
            core.disposables.lock().append(resource);
            Ok(())
        }
        None if error_on_missing_scope() => Err(Error::NoActiveScope),
        None => Ok(()),
    }
}

/// Cancels the pending release of `resource`.
///
/// Removes the first identity-equal occurrence from the owning scope's list;
/// an absent resource is a silent no-op. The resource itself is never
/// disposed by this call.
///
/// # Errors
///
/// [`Error::NoActiveScope`] when no scope is active and the missing-scope
/// policy is set to error.
pub fn unregister(resource: &Arc<dyn Disposable>) -> Result<(), Error> {
    match cell_get() {
        Some(core) => {
            core.disposables.lock().remove(resource);
            Ok(())
        }
        None if error_on_missing_scope() => Err(Error::NoActiveScope),
        None => Ok(()),
    }
}

/// A handle to one nested dispose context.
///
/// The handle moves through `Created → Active → Exited`: it is active from
/// creation until [`exit`](Self::exit) consumes it, which makes a second
/// exit unrepresentable. Dropping an active handle performs the same exit
/// work (release failures are logged instead of returned), so the cascade
/// runs on error-propagation paths too.
pub struct DisposeScope {
    option: ScopeOption,
    owned: Option<Arc<ScopeCore>>,
    previous: CellValue,
    exited: bool,
}

impl DisposeScope {
    /// The join semantics this scope was created with.
    #[must_use]
    pub fn option(&self) -> ScopeOption {
        self.option
    }

    /// Whether this scope owns a registration list of its own.
    ///
    /// `false` for `Suppress` scopes and for `Required` scopes that joined
    /// an ambient owner.
    #[must_use]
    pub fn holds_registrations(&self) -> bool {
        self.owned.is_some()
    }

    /// Number of releases currently pending against this scope's own list,
    /// or zero when the scope holds no list.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.owned
            .as_ref()
            .map_or(0, |core| core.disposables.lock().len())
    }

    /// Exits the scope: releases every pending resource in registration
    /// order, releases the list container, and restores the current-scope
    /// cell to its value from before the scope began.
    ///
    /// # Errors
    ///
    /// [`Error::ReleaseFailed`] when at least one release failed. The
    /// cascade always runs to completion first; the error carries the first
    /// failure and the total failure count.
    pub fn exit(mut self) -> Result<(), Error> {
        self.exit_inner()
    }

    fn exit_inner(&mut self) -> Result<(), Error> {
        if self.exited {
            return Ok(());
        }
        self.exited = true;

        match self.owned.take() {
            Some(core) => {
                // The cell still targets this core during the cascade, so a
                // release that registers further resources extends it.
                let result = run_cascade(&core);
                cell_restore(&Some(core), self.previous.take());
                result
            }
            None => {
                if self.option == ScopeOption::Suppress {
                    cell_restore(&None, self.previous.take());
                } else {
                    // Required join: the cell was never changed.
                    self.previous = None;
                }
                Ok(())
            }
        }
    }
}

impl Drop for DisposeScope {
    fn drop(&mut self) {
        if self.exited {
            return;
        }
        if let Err(err) = self.exit_inner() {
            error!(error = %err, "release failures during scope exit on drop");
            let _ = err;
        }
    }
}

impl std::fmt::Debug for DisposeScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisposeScope")
            .field("option", &self.option)
            .field("owns_list", &self.owned.is_some())
            .field("exited", &self.exited)
            .finish()
    }
}

fn run_cascade(core: &Arc<ScopeCore>) -> Result<(), Error> {
    let mut first_failure: Option<BoxError> = None;
    let mut failed = 0_usize;
    let mut index = 0_usize;
    loop {
        // Clone the entry out so the lock is not held across dispose; a
        // dispose that registers into this same scope would deadlock
        // otherwise.
        let entry: Option<Entry> = core.disposables.lock().get(index);
        let Some(entry) = entry else { break };
        index += 1;
        if let Err(cause) = entry.dispose() {
            failed += 1;
            if first_failure.is_none() {
                first_failure = Some(cause);
            }
        }
    }
    debug!(released = index, failed, "scope exit cascade complete");
    core.disposables.lock().release();

    match first_failure {
        Some(source) => Err(Error::ReleaseFailed { failed, source }),
        None => Ok(()),
    }
}
