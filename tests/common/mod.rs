//! Shared test helpers for integration tests

use deferral::{Deferred, Handler, Result, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Initialize tracing output for a test run (respects RUST_LOG)
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Wrap a closure as a continuation handler
pub fn handler(f: impl Fn(Value) -> Result<Value> + 'static) -> Handler {
    Rc::new(f)
}

/// Build a foreign thenable: an ordinary object whose `then` property is a
/// native function. The callback receives the (onFulfilled, onRejected)
/// argument pair a resolution procedure passes in.
#[allow(dead_code)]
pub fn thenable(then: impl Fn(&[Value]) -> Result<Value> + 'static) -> Value {
    let object = Value::new_object();
    object.set_property("then", Value::native_function("then", then));
    object
}

/// The observed outcome of a deferred: at most one slot ends up populated
pub struct Outcome {
    pub fulfilled: Rc<RefCell<Option<Value>>>,
    pub rejected: Rc<RefCell<Option<Value>>>,
}

impl Outcome {
    #[allow(dead_code)]
    pub fn is_pending(&self) -> bool {
        self.fulfilled.borrow().is_none() && self.rejected.borrow().is_none()
    }
}

/// Observe a deferred's settlement by registering a recording observer pair.
///
/// The slots fill only after the scheduler has been driven.
pub fn observe(deferred: &Deferred) -> Outcome {
    let fulfilled = Rc::new(RefCell::new(None));
    let rejected = Rc::new(RefCell::new(None));
    let fulfilled_slot = fulfilled.clone();
    let rejected_slot = rejected.clone();
    deferred.then(
        Some(handler(move |value| {
            *fulfilled_slot.borrow_mut() = Some(value.clone());
            Ok(value)
        })),
        Some(handler(move |reason| {
            *rejected_slot.borrow_mut() = Some(reason.clone());
            Ok(reason)
        })),
    );
    Outcome {
        fulfilled,
        rejected,
    }
}
