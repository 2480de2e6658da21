//! Dispose-scope: ambient, nestable dispose scopes for deterministic cleanup.
//!
//! # Overview
//!
//! A dispose scope lets code anywhere in a call tree register a resource for
//! later cleanup without threading a collector object through every function
//! signature. The resource is released exactly once, in registration order,
//! when the nearest enclosing scope exits — including when the work in
//! between suspends at `.await` points or fans out to child continuations.
//!
//! # Core Guarantees
//!
//! - **Exactly-once release**: every registered resource receives exactly one
//!   `dispose` call when its owning scope exits, in registration order.
//! - **Join semantics**: nested scopes either reuse the ambient registration
//!   list ([`ScopeOption::Required`]), always allocate their own
//!   ([`ScopeOption::RequiresNew`]), or hide the ambient scope entirely
//!   ([`ScopeOption::Suppress`]).
//! - **Continuation-local visibility**: the current scope propagates to child
//!   continuations captured at spawn time, while mutations made inside a
//!   child never leak back to sibling flows.
//! - **Guaranteed finalizer**: a scope handle dropped on an error path still
//!   runs the full release cascade.
//!
//! # Quick Start
//!
//! ```
//! use dispose_scope::{begin_scope, BoxError, Disposable, DisposableExt};
//! use std::sync::Arc;
//!
//! struct Connection;
//!
//! impl Disposable for Connection {
//!     fn dispose(&self) -> Result<(), BoxError> {
//!         // close the connection
//!         Ok(())
//!     }
//! }
//!
//! fn handle() -> Result<(), dispose_scope::Error> {
//!     let scope = begin_scope();
//!     let conn = Arc::new(Connection).register_scope()?;
//!     // ... use conn anywhere below this frame; no cleanup calls needed ...
//!     drop(conn);
//!     scope.exit() // releases everything registered above, in order
//! }
//! # handle().unwrap();
//! ```
//!
//! # Async Units of Work
//!
//! In async code the unit of work runs under [`scoped()`](fn@scoped), which owns the scope
//! for the whole future, and spawned children are wrapped with
//! [`ScopedFutureExt::in_current_scope`] so they observe the parent's scope
//! on any worker thread:
//!
//! ```ignore
//! use dispose_scope::{scoped, ScopedFutureExt};
//!
//! scoped(async {
//!     let task = tokio::spawn(audit_log().in_current_scope());
//!     process().await;
//!     task.await.unwrap();
//! })
//! .await; // everything registered by the body or the child is released here
//! ```
//!
//! # Module Structure
//!
//! - [`scope`]: the scope stack manager (begin/exit, register/unregister)
//! - [`list`]: pooled registration-list backing store
//! - [`propagate`]: continuation-local propagation combinators
//! - [`scoped`](mod@scoped): scoped unit-of-work wrapper for host pipelines
//! - [`ext`]: chaining sugar for registering resources
//! - [`error`]: error types
//! - [`tracing_compat`]: structured logging layer (feature-gated)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod ext;
pub mod list;
pub mod propagate;
pub mod scope;
pub mod scoped;
pub mod tracing_compat;

pub use error::{BoxError, Error};
pub use ext::DisposableExt;
pub use list::DisposeList;
pub use propagate::{ScopeSnapshot, ScopedFutureExt, WithScope};
pub use scope::{
    begin_scope, begin_scope_with, error_on_missing_scope, is_active, register,
    set_error_on_missing_scope, unregister, Disposable, DisposeScope, ScopeOption,
    DEFAULT_CAPACITY,
};
pub use scoped::{scoped, scoped_with, ScopeOptions, Scoped};
