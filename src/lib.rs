//! Deferral: a Promise/A+ deferred-value primitive for Rust
//!
//! Deferral provides a container for a value or error that is not yet known,
//! observed by registering continuation callbacks. Each observer is notified
//! exactly once, asynchronously, in registration order, regardless of how
//! many times or in what order producers attempt to settle the value.
//!
//! # Features
//!
//! - **Settle-once**: the first settlement wins; every later attempt is a no-op
//! - **Thenable adoption**: resolving with any value exposing a callable
//!   `then` member defers settlement until that thenable settles, with a
//!   first-callback-wins guard against misbehaving implementations
//! - **Chaining**: [`Deferred::then`] derives a new deferred from a
//!   continuation's return value or error, recursively resolved
//! - **Deterministic scheduling**: all callback dispatch goes through an
//!   explicit [`Scheduler`] task queue that tests drive to completion
//!
//! # Quick Start
//!
//! ```
//! use deferral::{Deferred, Scheduler, Value};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let scheduler = Scheduler::new();
//! let deferred = Deferred::resolved(&scheduler, Value::Number(2.0));
//!
//! let seen = Rc::new(RefCell::new(None));
//! let slot = seen.clone();
//! deferred
//!     .then(
//!         Some(Rc::new(|value: Value| -> deferral::Result<Value> {
//!             match value {
//!                 Value::Number(n) => Ok(Value::Number(n * 10.0)),
//!                 other => Ok(other),
//!             }
//!         })),
//!         None,
//!     )
//!     .then(
//!         Some(Rc::new(move |value: Value| -> deferral::Result<Value> {
//!             *slot.borrow_mut() = Some(value.clone());
//!             Ok(value)
//!         })),
//!         None,
//!     );
//!
//! // Nothing fires until the queue is drained.
//! assert!(seen.borrow().is_none());
//! scheduler.run_to_completion();
//! assert_eq!(*seen.borrow(), Some(Value::Number(20.0)));
//! ```
//!
//! # Module Overview
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`deferred`] | State machine, resolution procedure, chaining, factories |
//! | [`scheduler`] | Cooperative task queue for asynchronous dispatch |
//! | [`value`] | Dynamic payload values, objects, and native functions |
//! | [`Error`] | Error taxonomy; everything surfaces as a rejection payload |
// Callback aliases (Rc<dyn Fn...>) appear in public signatures.
#![allow(clippy::type_complexity)]

pub mod deferred;
pub mod scheduler;
pub mod value;

mod error;

pub use deferred::{Deferred, DeferredResolvers, Handler, SettleFn};
pub use error::{Error, Result};
pub use scheduler::{RunResult, Scheduler, SchedulerStats};
pub use value::{NativeFn, Object, ObjectKind, Value};

/// Deferral version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
