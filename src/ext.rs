//! Chaining sugar for registering resources with the ambient scope.
//!
//! The blanket [`DisposableExt`] impl lets a freshly built resource register
//! itself in one expression:
//!
//! ```
//! use dispose_scope::{begin_scope, BoxError, Disposable, DisposableExt};
//! use std::sync::Arc;
//!
//! struct Buffer;
//!
//! impl Disposable for Buffer {
//!     fn dispose(&self) -> Result<(), BoxError> {
//!         Ok(())
//!     }
//! }
//!
//! let scope = begin_scope();
//! let buffer = Arc::new(Buffer).register_scope().unwrap();
//! // buffer stays usable; release happens at scope exit
//! # drop(buffer);
//! # scope.exit().unwrap();
//! ```

use crate::error::Error;
use crate::scope::{register, unregister, Disposable};
use std::sync::Arc;

/// Register/unregister a resource against the ambient scope, returning the
/// handle for chaining.
pub trait DisposableExt: Disposable + Sized + 'static {
    /// Schedules this resource for release at the ambient scope's exit and
    /// hands the resource back.
    ///
    /// # Errors
    ///
    /// [`Error::NoActiveScope`] per the missing-scope policy.
    fn register_scope(self: Arc<Self>) -> Result<Arc<Self>, Error> {
        register(Arc::clone(&self) as Arc<dyn Disposable>)?;
        Ok(self)
    }

    /// Cancels this resource's pending release and hands the resource back.
    ///
    /// # Errors
    ///
    /// [`Error::NoActiveScope`] per the missing-scope policy.
    fn unregister_scope(self: Arc<Self>) -> Result<Arc<Self>, Error> {
        let erased = Arc::clone(&self) as Arc<dyn Disposable>;
        unregister(&erased)?;
        Ok(self)
    }
}

impl<T: Disposable + Sized + 'static> DisposableExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::scope::begin_scope;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Flagged(AtomicBool);

    impl Disposable for Flagged {
        fn dispose(&self) -> Result<(), BoxError> {
            self.0.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn register_scope_chains_and_schedules() {
        let scope = begin_scope();
        let flagged = Arc::new(Flagged(AtomicBool::new(false)))
            .register_scope()
            .unwrap();
        assert_eq!(scope.pending(), 1);
        scope.exit().unwrap();
        assert!(flagged.0.load(Ordering::SeqCst));
    }

    #[test]
    fn unregister_scope_cancels_release() {
        let scope = begin_scope();
        let flagged = Arc::new(Flagged(AtomicBool::new(false)))
            .register_scope()
            .unwrap()
            .unregister_scope()
            .unwrap();
        assert_eq!(scope.pending(), 0);
        scope.exit().unwrap();
        assert!(!flagged.0.load(Ordering::SeqCst));
    }
}
