//! Error types for dispose scopes.
//!
//! Errors from [`register`](crate::register) and
//! [`unregister`](crate::unregister) surface synchronously to the caller.
//! Errors during scope exit surface from the exit call itself, after every
//! release has been attempted; there is no internal retry anywhere.

use thiserror::Error;

/// A boxed release error produced by a [`Disposable`](crate::Disposable).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by the scope stack manager.
#[derive(Debug, Error)]
pub enum Error {
    /// `register`/`unregister` was called with no scope active in the current
    /// context while the missing-scope policy is set to error (the default).
    ///
    /// Recoverable by the caller: either ensure a scope exists or disable the
    /// policy with [`set_error_on_missing_scope`](crate::set_error_on_missing_scope).
    #[error("no dispose scope is active in the current context")]
    NoActiveScope,

    /// At least one release failed during a scope exit.
    ///
    /// The cascade is best-effort: every registered resource received its
    /// release call regardless of earlier failures. The first failure wins
    /// and is carried as the source; `failed` counts all failures in the
    /// cascade.
    #[error("{failed} release(s) failed during scope exit: {source}")]
    ReleaseFailed {
        /// Number of releases that failed during the cascade.
        failed: usize,
        /// The first release failure encountered.
        #[source]
        source: BoxError,
    },
}
