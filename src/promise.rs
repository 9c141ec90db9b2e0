//! The promise state machine.
//!
//! A promise starts `Pending` and settles exactly once, either `Fulfilled`
//! or `Rejected`, with a packed sequence of values. Continuations attached
//! while pending are queued and drained in attachment order at settlement;
//! continuations attached afterwards run immediately against the recorded
//! values. Settlement attempts after the first are no-ops.
//!
//! Continuations always run *outside* the state lock, so a callback may
//! freely attach to or settle the very promise that invoked it.

use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::advancer::advance;
use crate::host::Host;
use crate::invoke;
use crate::value::{Value, ValuePack};
use crate::wake;
use crate::Error;

/// A user continuation: receives the delivered values, returns its own
/// values or a failure reason.
pub type Handler = Box<dyn FnOnce(ValuePack) -> Result<ValuePack, Value> + Send>;

/// An internal continuation; by contract it cannot fail (user code inside it
/// is wrapped by protected invocation upstream).
pub(crate) type Continuation = Box<dyn FnOnce(ValuePack) + Send>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Pending,
    Fulfilled,
    Rejected,
}

/// What a blocking wait observed.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Fulfilled(ValuePack),
    Rejected(ValuePack),
}

impl Outcome {
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Outcome::Fulfilled(_))
    }

    pub fn values(&self) -> &ValuePack {
        match self {
            Outcome::Fulfilled(pack) | Outcome::Rejected(pack) => pack,
        }
    }

    pub fn into_values(self) -> ValuePack {
        match self {
            Outcome::Fulfilled(pack) | Outcome::Rejected(pack) => pack,
        }
    }
}

struct Inner {
    status: Status,
    settled: ValuePack,
    on_fulfill: Vec<Continuation>,
    on_reject: Vec<Continuation>,
    unobserved_rejection: bool,
    report: Option<String>,
    origin: &'static Location<'static>,
    host: Arc<Host>,
}

type Shared = Arc<Mutex<Inner>>;

/// Single-resolution container for an eventual outcome.
///
/// Cloning shares the same underlying state; settlement goes through the
/// [`Resolver`]/[`Rejecter`] pair handed to the constructor's initializer.
///
/// # Examples
///
/// ```
/// use copromise::{pack, Promise, Status};
///
/// let p = Promise::new(|resolve, _reject| {
///     resolve.resolve(pack![21i64]).unwrap();
/// });
/// assert_eq!(p.status(), Status::Fulfilled);
/// let doubled = p.then(|values| {
///     match values.first() {
///         copromise::Value::Int(n) => Ok(pack![n * 2]),
///         other => Err(copromise::Value::str(format!("not an int: {other:?}"))),
///     }
/// });
/// assert!(doubled.wait().is_fulfilled());
/// ```
#[derive(Clone)]
pub struct Promise {
    inner: Shared,
}

/// Fulfill handle bound to one promise; owned by the promise's creator.
#[derive(Clone)]
pub struct Resolver {
    inner: Shared,
}

/// Reject handle bound to one promise; owned by the promise's creator.
#[derive(Clone)]
pub struct Rejecter {
    inner: Shared,
}

impl Promise {
    /// Allocates a pending promise and runs `init` with its settle handles
    /// under protected invocation. A panic inside `init` before settlement
    /// becomes the rejection value. Construction itself never fails.
    #[track_caller]
    pub fn new<F>(init: F) -> Promise
    where
        F: FnOnce(Resolver, Rejecter),
    {
        Promise::new_in(Host::global(), init)
    }

    /// Like [`Promise::new`], against an explicit host.
    #[track_caller]
    pub fn new_in<F>(host: Arc<Host>, init: F) -> Promise
    where
        F: FnOnce(Resolver, Rejecter),
    {
        let trace = host.trace();
        let (promise, resolver, rejecter) = Promise::pending(host, Location::caller());
        let on_panic = rejecter.clone();
        if let Err(reason) = invoke::guard(trace, "initializer", move || init(resolver, rejecter)) {
            on_panic.reject(ValuePack::single(reason));
        }
        promise
    }

    /// An immediately fulfilled promise. Errs on the same misuse as
    /// [`Resolver::resolve`]; a sole promise value assimilates as usual.
    #[track_caller]
    pub fn resolved(values: ValuePack) -> Result<Promise, Error> {
        Promise::resolved_in(Host::global(), values)
    }

    /// Like [`Promise::resolved`], against an explicit host.
    #[track_caller]
    pub fn resolved_in(host: Arc<Host>, values: ValuePack) -> Result<Promise, Error> {
        let (promise, resolver, _) = Promise::pending(host, Location::caller());
        resolver.resolve(values)?;
        Ok(promise)
    }

    /// An immediately rejected promise. As with any rejection, leaving it
    /// without a failure handler for a scheduling tick draws a diagnostic.
    #[track_caller]
    pub fn rejected(values: ValuePack) -> Promise {
        Promise::rejected_in(Host::global(), values)
    }

    /// Like [`Promise::rejected`], against an explicit host.
    #[track_caller]
    pub fn rejected_in(host: Arc<Host>, values: ValuePack) -> Promise {
        let (promise, _, rejecter) = Promise::pending(host, Location::caller());
        rejecter.reject(values);
        promise
    }

    fn pending(
        host: Arc<Host>,
        origin: &'static Location<'static>,
    ) -> (Promise, Resolver, Rejecter) {
        let inner = Arc::new(Mutex::new(Inner {
            status: Status::Pending,
            settled: ValuePack::empty(),
            on_fulfill: Vec::new(),
            on_reject: Vec::new(),
            unobserved_rejection: false,
            report: None,
            origin,
            host,
        }));
        (
            Promise {
                inner: inner.clone(),
            },
            Resolver {
                inner: inner.clone(),
            },
            Rejecter { inner },
        )
    }

    pub fn status(&self) -> Status {
        self.inner.lock().status
    }

    /// Whether `value` is a promise. Only values wrapping this crate's own
    /// instances pass; there is no structural check to counterfeit.
    pub fn is(value: &Value) -> bool {
        matches!(value, Value::Promise(_))
    }

    /// Identity comparison: do both handles share one underlying promise?
    pub fn same(&self, other: &Promise) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Derives a new promise from this one's outcome.
    ///
    /// Either handler may be omitted; an omitted path passes the values
    /// straight through to the derived promise's matching settle handle.
    /// Attaching counts as observing a rejection, handler or not.
    ///
    /// If this promise is already settled the effective path runs before
    /// `and_then` returns; otherwise both paths are queued.
    #[track_caller]
    pub fn and_then(&self, on_fulfilled: Option<Handler>, on_rejected: Option<Handler>) -> Promise {
        let host = self.inner.lock().host.clone();
        let trace = host.trace();
        let (derived, resolver, rejecter) = Promise::pending(host, Location::caller());

        let fulfill_path: Continuation = match on_fulfilled {
            Some(handler) => advance(trace, handler, resolver.clone(), rejecter.clone()),
            None => {
                let resolver = resolver.clone();
                let rejecter = rejecter.clone();
                Box::new(move |pack| {
                    if let Err(misuse) = resolver.resolve(pack) {
                        rejecter.reject(ValuePack::single(Value::str(misuse.to_string())));
                    }
                })
            }
        };
        let reject_path: Continuation = match on_rejected {
            Some(handler) => advance(trace, handler, resolver, rejecter),
            None => Box::new(move |pack| rejecter.reject(pack)),
        };

        attach(&self.inner, fulfill_path, reject_path);
        derived
    }

    /// Sugar for [`Promise::and_then`] with only a fulfill handler.
    #[track_caller]
    pub fn then<F>(&self, on_fulfilled: F) -> Promise
    where
        F: FnOnce(ValuePack) -> Result<ValuePack, Value> + Send + 'static,
    {
        self.and_then(Some(Box::new(on_fulfilled)), None)
    }

    /// Sugar for [`Promise::and_then`] with only a reject handler.
    #[track_caller]
    pub fn catch<F>(&self, on_rejected: F) -> Promise
    where
        F: FnOnce(ValuePack) -> Result<ValuePack, Value> + Send + 'static,
    {
        self.and_then(None, Some(Box::new(on_rejected)))
    }

    /// Blocks the calling task until this promise settles and returns the
    /// recorded outcome. Settled promises return synchronously; this is the
    /// only operation in the crate that suspends.
    pub fn wait(&self) -> Outcome {
        {
            let mut state = self.inner.lock();
            state.unobserved_rejection = false;
            match state.status {
                Status::Fulfilled => return Outcome::Fulfilled(state.settled.clone()),
                Status::Rejected => return Outcome::Rejected(state.settled.clone()),
                Status::Pending => {}
            }
        }
        let (signal, waiter) = wake::channel();
        let on_fulfill = signal.clone();
        attach(
            &self.inner,
            Box::new(move |_| on_fulfill.fire()),
            Box::new(move |_| signal.fire()),
        );
        waiter.wait();
        let state = self.inner.lock();
        match state.status {
            Status::Rejected => Outcome::Rejected(state.settled.clone()),
            _ => Outcome::Fulfilled(state.settled.clone()),
        }
    }

    pub(crate) fn attach_raw(&self, on_fulfill: Continuation, on_reject: Continuation) {
        attach(&self.inner, on_fulfill, on_reject);
    }

    #[cfg(test)]
    pub(crate) fn unobserved_rejection(&self) -> bool {
        self.inner.lock().unobserved_rejection
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("Promise")
            .field("status", &state.status)
            .field("origin", &format_args!("{}", state.origin))
            .finish()
    }
}

impl Resolver {
    /// Fulfills the promise with `values`; a no-op once settled.
    ///
    /// When the sole value is itself a promise the outcome is adopted
    /// instead: this promise stays pending until the nested one settles. A
    /// promise accompanied by further values is a usage error and settles
    /// nothing.
    pub fn resolve(&self, values: ValuePack) -> Result<(), Error> {
        settle_fulfill(&self.inner, values)
    }
}

impl Rejecter {
    /// Rejects the promise with `values`; a no-op once settled.
    ///
    /// If no failure handler is attached by the end of the current
    /// scheduling tick, a diagnostic naming the values and the promise's
    /// construction site goes to the host's sink.
    pub fn reject(&self, values: ValuePack) {
        settle_reject(&self.inner, values)
    }
}

fn settle_fulfill(inner: &Shared, values: ValuePack) -> Result<(), Error> {
    let nested = {
        let state = inner.lock();
        if state.status != Status::Pending {
            return Ok(());
        }
        match values.first() {
            Value::Promise(p) if values.count() == 1 => Some(p.clone()),
            Value::Promise(_) => {
                return Err(Error::ResolveWithPromiseAndExtras {
                    extra: values.count() - 1,
                })
            }
            _ => None,
        }
    };

    if let Some(nested) = nested {
        let fulfill_target = inner.clone();
        let reject_target = inner.clone();
        nested.attach_raw(
            Box::new(move |pack| {
                // A settled pack cannot hold a promise with extras.
                let _ = settle_fulfill(&fulfill_target, pack);
            }),
            Box::new(move |pack| settle_reject(&reject_target, pack)),
        );
        return Ok(());
    }

    let (continuations, pack) = {
        let mut state = inner.lock();
        if state.status != Status::Pending {
            return Ok(());
        }
        state.status = Status::Fulfilled;
        state.settled = values;
        state.on_reject.clear();
        (
            std::mem::take(&mut state.on_fulfill),
            state.settled.clone(),
        )
    };
    for continuation in continuations {
        continuation(pack.clone());
    }
    Ok(())
}

fn settle_reject(inner: &Shared, values: ValuePack) {
    enum After {
        Run(Vec<Continuation>, ValuePack),
        Defer(Arc<Host>),
    }

    let after = {
        let mut state = inner.lock();
        if state.status != Status::Pending {
            return;
        }
        state.status = Status::Rejected;
        state.settled = values;
        state.on_fulfill.clear();
        if state.on_reject.is_empty() {
            state.unobserved_rejection = true;
            state.report = Some(format!(
                "unhandled promise rejection: {} (promise created at {})",
                state.settled, state.origin
            ));
            After::Defer(state.host.clone())
        } else {
            After::Run(std::mem::take(&mut state.on_reject), state.settled.clone())
        }
    };

    match after {
        After::Run(continuations, pack) => {
            for continuation in continuations {
                continuation(pack.clone());
            }
        }
        After::Defer(host) => {
            // One tick of grace: a catch attached before the host yields
            // clears the flag and suppresses the report.
            let sink = host.sink().clone();
            let inner = inner.clone();
            host.scheduler().defer(Box::new(move || {
                let message = {
                    let mut state = inner.lock();
                    if state.unobserved_rejection {
                        state.report.take()
                    } else {
                        None
                    }
                };
                if let Some(message) = message {
                    sink.report(&message);
                }
            }));
        }
    }
}

fn attach(inner: &Shared, on_fulfill: Continuation, on_reject: Continuation) {
    let now = {
        let mut state = inner.lock();
        state.unobserved_rejection = false;
        match state.status {
            Status::Pending => {
                state.on_fulfill.push(on_fulfill);
                state.on_reject.push(on_reject);
                None
            }
            Status::Fulfilled => Some((on_fulfill, state.settled.clone())),
            Status::Rejected => Some((on_reject, state.settled.clone())),
        }
    };
    if let Some((run, pack)) = now {
        run(pack);
    }
}
