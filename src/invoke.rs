//! Protected invocation of user callbacks.
//!
//! Every user-supplied callback in the chain runs through [`guard`], so a
//! panic is captured and handed back as a failure value instead of unwinding
//! through the state machine. When the host's trace flag is on, entry and
//! outcome of each call are traced.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::value::Value;

/// Runs `f`, converting a panic into an `Err` carrying the panic payload.
pub(crate) fn guard<R>(trace: bool, what: &str, f: impl FnOnce() -> R) -> Result<R, Value> {
    if trace {
        tracing::trace!(target: "copromise", what, "protected call");
    }
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(out) => {
            if trace {
                tracing::trace!(target: "copromise", what, "protected call returned");
            }
            Ok(out)
        }
        Err(payload) => {
            let reason = panic_value(payload);
            if trace {
                tracing::trace!(target: "copromise", what, ?reason, "protected call failed");
            }
            Err(reason)
        }
    }
}

/// Best-effort conversion of a panic payload into a failure value.
fn panic_value(payload: Box<dyn Any + Send>) -> Value {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        return Value::str(s);
    }
    match payload.downcast::<String>() {
        Ok(s) => Value::str(*s),
        Err(_) => Value::str("panic with non-string payload"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_passes_through() {
        let out = guard(false, "test", || 7);
        assert_eq!(out, Ok(7));
    }

    #[test]
    fn panic_is_captured_with_payload() {
        let out: Result<(), Value> = guard(false, "test", || panic!("boom"));
        assert_eq!(out, Err(Value::from("boom")));
    }

    #[test]
    fn formatted_panic_is_captured() {
        let n = 3;
        let out: Result<(), Value> = guard(false, "test", || panic!("boom {n}"));
        assert_eq!(out, Err(Value::from("boom 3")));
    }
}
