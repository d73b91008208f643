//! Deferred values
//!
//! This module provides the deferred-value primitive: a container for a
//! value or error that is not yet known, observed by registering
//! continuation callbacks. It implements the Promise/A+ resolution
//! contract: settle-once, recursive resolution of thenable values
//! (including foreign implementations of the protocol), chaining, and
//! strictly asynchronous callback dispatch through a [`Scheduler`].

use crate::error::{messages, Result};
use crate::scheduler::Scheduler;
use crate::value::Value;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// A continuation supplied to [`Deferred::then`]
///
/// The returned value resolves the derived deferred (and may itself be a
/// thenable); a returned `Err` rejects it with the error's reason.
pub type Handler = Rc<dyn Fn(Value) -> Result<Value>>;

/// A settlement capability: fulfills or rejects the deferred it was minted
/// for. Safe to call any number of times; only the first call across the
/// capability pair has any effect.
pub type SettleFn = Rc<dyn Fn(Value)>;

/// Internal observer reaction. Infallible: handler errors are converted to
/// rejections of the derived deferred before reaching this layer.
type Reaction = Rc<dyn Fn(Value)>;

/// Deferred state
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum State {
    /// Not yet settled
    Pending,
    /// Settled with a value
    Fulfilled,
    /// Settled with a reason
    Rejected,
}

/// A registered continuation pair, buffered while pending
struct Observer {
    on_fulfilled: Option<Reaction>,
    on_rejected: Option<Reaction>,
}

struct Inner {
    state: State,
    /// The settled value or reason; present only once state != Pending
    payload: Option<Value>,
    /// Observers collected while pending, drained on settlement
    observers: Vec<Observer>,
}

/// A deferred value
///
/// Created pending, settled at most once, observed through [`then`].
/// Cloning the handle shares the underlying state; identity (for the
/// self-resolution check and strict equality) is reference identity.
///
/// [`then`]: Deferred::then
#[derive(Clone)]
pub struct Deferred {
    inner: Rc<RefCell<Inner>>,
    scheduler: Scheduler,
}

/// A deferred together with its settlement capabilities
///
/// Exposes settlement control to code outside the constructor closure,
/// mirroring `Promise.withResolvers()`.
pub struct DeferredResolvers {
    /// The deferred instance
    pub deferred: Deferred,
    /// Fulfill capability (routes through the resolution procedure)
    pub resolve: SettleFn,
    /// Reject capability
    pub reject: SettleFn,
}

impl Deferred {
    fn pending(scheduler: &Scheduler) -> Deferred {
        Deferred {
            inner: Rc::new(RefCell::new(Inner {
                state: State::Pending,
                payload: None,
                observers: Vec::new(),
            })),
            scheduler: scheduler.clone(),
        }
    }

    /// Create a new deferred, invoking `resolver` synchronously with its
    /// fulfill and reject capabilities.
    ///
    /// An `Err` returned by the resolver rejects the deferred, unless a
    /// capability already fired; the first settlement wins.
    pub fn new<F>(scheduler: &Scheduler, resolver: F) -> Deferred
    where
        F: FnOnce(SettleFn, SettleFn) -> Result<()>,
    {
        let deferred = Deferred::pending(scheduler);
        let (resolve, reject, done) = deferred.guarded_capabilities();
        if let Err(err) = resolver(resolve, reject) {
            if !done.replace(true) {
                deferred.reject_with(err.into_reason());
            }
        }
        deferred
    }

    /// Create a deferred resolved with `value`
    ///
    /// The value is routed through the resolution procedure, so a thenable
    /// is adopted rather than stored as the payload. Observers are still
    /// notified asynchronously.
    pub fn resolved(scheduler: &Scheduler, value: Value) -> Deferred {
        let deferred = Deferred::pending(scheduler);
        deferred.resolve_with(value);
        deferred
    }

    /// Create a deferred rejected with `reason`
    pub fn rejected(scheduler: &Scheduler, reason: Value) -> Deferred {
        let deferred = Deferred::pending(scheduler);
        deferred.reject_with(reason);
        deferred
    }

    /// Create a pending deferred along with its settlement capabilities
    pub fn with_resolvers(scheduler: &Scheduler) -> DeferredResolvers {
        let deferred = Deferred::pending(scheduler);
        let (resolve, reject, _done) = deferred.guarded_capabilities();
        DeferredResolvers {
            deferred,
            resolve,
            reject,
        }
    }

    /// Derive a new deferred from applying a continuation to this one's
    /// eventual outcome.
    ///
    /// On fulfillment, `on_fulfilled` maps the value (its result is
    /// recursively resolved, so a handler may return a thenable); absent,
    /// the value passes through. On rejection, `on_rejected` may recover
    /// (converting rejection into fulfillment of the derived deferred);
    /// absent, the rejection propagates. A handler `Err` rejects the
    /// derived deferred with the error's reason.
    pub fn then(&self, on_fulfilled: Option<Handler>, on_rejected: Option<Handler>) -> Deferred {
        let derived = Deferred::pending(&self.scheduler);

        let fulfill_branch: Reaction = {
            let derived = derived.clone();
            Rc::new(move |result: Value| match &on_fulfilled {
                Some(handler) => match handler(result) {
                    Ok(value) => derived.resolve_with(value),
                    Err(err) => derived.reject_with(err.into_reason()),
                },
                None => derived.resolve_with(result),
            })
        };

        let reject_branch: Reaction = {
            let derived = derived.clone();
            Rc::new(move |reason: Value| match &on_rejected {
                Some(handler) => match handler(reason) {
                    Ok(value) => derived.resolve_with(value),
                    Err(err) => derived.reject_with(err.into_reason()),
                },
                None => derived.reject_with(reason),
            })
        };

        self.register_observer(Observer {
            on_fulfilled: Some(fulfill_branch),
            on_rejected: Some(reject_branch),
        });
        derived
    }

    /// Reference identity of the underlying state
    pub fn ptr_eq(&self, other: &Deferred) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Mint a fulfill/reject capability pair sharing a first-call-wins
    /// guard. Used by the constructor, `with_resolvers`, and thenable
    /// adoption, where an untrusted party holds both capabilities.
    fn guarded_capabilities(&self) -> (SettleFn, SettleFn, Rc<Cell<bool>>) {
        let done = Rc::new(Cell::new(false));

        let resolve: SettleFn = {
            let target = self.clone();
            let done = done.clone();
            Rc::new(move |value: Value| {
                if done.replace(true) {
                    return;
                }
                target.resolve_with(value);
            })
        };

        let reject: SettleFn = {
            let target = self.clone();
            let done = done.clone();
            Rc::new(move |reason: Value| {
                if done.replace(true) {
                    return;
                }
                target.reject_with(reason);
            })
        };

        (resolve, reject, done)
    }

    /// The resolution procedure: settle this deferred with `candidate`,
    /// adopting it if it is thenable.
    fn resolve_with(&self, candidate: Value) {
        // Self-resolution check comes before anything else; reject and stop.
        if let Value::Deferred(other) = &candidate {
            if self.ptr_eq(other) {
                self.reject_with(Value::new_error("TypeError", messages::SELF_RESOLUTION));
                return;
            }
        }

        match extract_then(&candidate) {
            Ok(Some(then)) => self.adopt(then),
            Ok(None) => self.fulfill_with(candidate),
            Err(err) => self.reject_with(err.into_reason()),
        }
    }

    /// Adopt a thenable by invoking its extracted `then` member with a
    /// guarded callback pair.
    ///
    /// Only the first callback invocation (in either order, at most once
    /// total across both) has any effect. A throw from `then` rejects this
    /// deferred unless a callback already fired, in which case the error is
    /// discarded because the first settlement already won.
    fn adopt(&self, then: Value) {
        let (resolve, reject, done) = self.guarded_capabilities();

        let on_fulfilled = Value::native_function("onFulfilled", move |args: &[Value]| {
            resolve(args.first().cloned().unwrap_or(Value::Undefined));
            Ok(Value::Undefined)
        });
        let on_rejected = Value::native_function("onRejected", move |args: &[Value]| {
            reject(args.first().cloned().unwrap_or(Value::Undefined));
            Ok(Value::Undefined)
        });

        if let Err(err) = then.call(&[on_fulfilled, on_rejected]) {
            if !done.replace(true) {
                self.reject_with(err.into_reason());
            }
        }
    }

    /// Register callbacks the way a foreign caller would through the
    /// thenable protocol: non-callable callbacks are ignored.
    fn register_callbacks(&self, on_fulfilled: Option<Value>, on_rejected: Option<Value>) {
        let wrap = |callback: Option<Value>| -> Option<Reaction> {
            let callback = callback.filter(Value::is_callable)?;
            Some(Rc::new(move |payload: Value| {
                // The callbacks handed out here are the guarded pair from
                // adoption; they cannot throw.
                let _ = callback.call(&[payload]);
            }) as Reaction)
        };
        self.register_observer(Observer {
            on_fulfilled: wrap(on_fulfilled),
            on_rejected: wrap(on_rejected),
        });
    }

    /// Buffer or dispatch an observer, always via the scheduler.
    ///
    /// The dispatch decision itself runs on a later turn of the queue, so
    /// an observer never fires synchronously with its registration or with
    /// the settlement call, even on an already-settled instance.
    fn register_observer(&self, observer: Observer) {
        let target = self.clone();
        self.scheduler
            .schedule(move || target.dispatch_or_enqueue(observer));
    }

    fn dispatch_or_enqueue(&self, observer: Observer) {
        let decision = {
            let mut inner = self.inner.borrow_mut();
            match inner.state {
                State::Pending => {
                    inner.observers.push(observer);
                    None
                }
                State::Fulfilled => Some((
                    observer.on_fulfilled,
                    inner.payload.clone().unwrap_or(Value::Undefined),
                )),
                State::Rejected => Some((
                    observer.on_rejected,
                    inner.payload.clone().unwrap_or(Value::Undefined),
                )),
            }
        };

        // The borrow is released before the reaction runs; reactions may
        // register observers or settle other deferreds.
        if let Some((Some(reaction), payload)) = decision {
            reaction(payload);
        }
    }

    /// Direct fulfillment path, used once resolution has determined the
    /// value is not thenable. No-op if already settled.
    fn fulfill_with(&self, value: Value) {
        let observers = {
            let mut inner = self.inner.borrow_mut();
            if inner.state != State::Pending {
                return;
            }
            inner.state = State::Fulfilled;
            inner.payload = Some(value);
            std::mem::take(&mut inner.observers)
        };
        debug!(observers = observers.len(), "deferred fulfilled");
        for observer in observers {
            self.register_observer(observer);
        }
    }

    /// Rejection path. No-op if already settled.
    fn reject_with(&self, reason: Value) {
        let observers = {
            let mut inner = self.inner.borrow_mut();
            if inner.state != State::Pending {
                return;
            }
            inner.state = State::Rejected;
            inner.payload = Some(reason);
            std::mem::take(&mut inner.observers)
        };
        debug!(observers = observers.len(), "deferred rejected");
        for observer in observers {
            self.register_observer(observer);
        }
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Deferred]")
    }
}

/// Probe `candidate` for a callable `then` member, reading it exactly once.
///
/// A deferred candidate yields a synthesized callable that registers the
/// provided callbacks on it, so own deferreds and foreign thenables adopt
/// through the same path. An object's `then` is read through the
/// getter-aware property access and may throw; a non-callable `then` (or a
/// plain value) yields `None`.
fn extract_then(candidate: &Value) -> Result<Option<Value>> {
    match candidate {
        Value::Deferred(deferred) => {
            let deferred = deferred.clone();
            Ok(Some(Value::native_function("then", move |args: &[Value]| {
                deferred.register_callbacks(args.first().cloned(), args.get(1).cloned());
                Ok(Value::Undefined)
            })))
        }
        Value::Object(_) => {
            let then = candidate.get_property("then")?;
            Ok(then.filter(Value::is_callable))
        }
        _ => Ok(None),
    }
}
