//! Adapts a user handler into a continuation that drives a derived promise.

use crate::invoke;
use crate::promise::{Continuation, Handler, Rejecter, Resolver};
use crate::value::{Value, ValuePack};

/// Wraps `handler` so that, when the parent delivers its values, the
/// handler runs under protected invocation and its outcome lands in the
/// derived promise: returned values resolve it (a sole returned promise is
/// assimilated), a failure or panic rejects it.
///
/// A handler that returns a promise packed with extra values has no
/// synchronous caller to report to, so that misuse also becomes a rejection
/// of the derived promise.
pub(crate) fn advance(
    trace: bool,
    handler: Handler,
    resolver: Resolver,
    rejecter: Rejecter,
) -> Continuation {
    Box::new(move |pack: ValuePack| {
        match invoke::guard(trace, "continuation", move || handler(pack)) {
            Ok(Ok(values)) => {
                if let Err(misuse) = resolver.resolve(values) {
                    rejecter.reject(ValuePack::single(Value::str(misuse.to_string())));
                }
            }
            Ok(Err(reason)) | Err(reason) => rejecter.reject(ValuePack::single(reason)),
        }
    })
}
