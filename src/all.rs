//! Settle-all-or-fail-fast aggregation.
//!
//! Built entirely on the public chaining contract: each input gets a
//! continuation pair via `and_then`, the aggregate is an ordinary promise
//! settled through its own handles.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::host::Host;
use crate::promise::Promise;
use crate::value::{Value, ValuePack};
use crate::Error;

struct FanIn {
    slots: Vec<Value>,
    left: usize,
}

/// Aggregates `entries` into one promise.
///
/// Every entry must be a promise; anything else is a synchronous
/// [`Error::NotAPromise`] rather than a perpetually pending result. The
/// aggregate fulfills with a list holding each input's first fulfilled
/// value at the input's position once every input has fulfilled, or rejects
/// with the first observed rejection, whichever comes first. An empty input
/// fulfills immediately with an empty list.
#[track_caller]
pub fn all(entries: &[Value]) -> Result<Promise, Error> {
    all_in(Host::global(), entries)
}

/// Like [`all`], against an explicit host.
#[track_caller]
pub fn all_in(host: Arc<Host>, entries: &[Value]) -> Result<Promise, Error> {
    let mut inputs = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        match entry {
            Value::Promise(p) => inputs.push(p.clone()),
            _ => return Err(Error::NotAPromise { index }),
        }
    }

    Ok(Promise::new_in(host, move |resolve, reject| {
        if inputs.is_empty() {
            let _ = resolve.resolve(ValuePack::single(Value::list(Vec::new())));
            return;
        }
        let fan_in = Arc::new(Mutex::new(FanIn {
            slots: vec![Value::Nil; inputs.len()],
            left: inputs.len(),
        }));
        for (index, input) in inputs.iter().enumerate() {
            let fan_in = fan_in.clone();
            let resolve = resolve.clone();
            let reject = reject.clone();
            input.and_then(
                Some(Box::new(move |values: ValuePack| {
                    // A fulfilled "no result" still counts: the tally, not
                    // the slot contents, decides completion.
                    let finished = {
                        let mut fan_in = fan_in.lock();
                        fan_in.slots[index] = values.first().clone();
                        fan_in.left -= 1;
                        if fan_in.left == 0 {
                            Some(std::mem::take(&mut fan_in.slots))
                        } else {
                            None
                        }
                    };
                    if let Some(slots) = finished {
                        let _ = resolve.resolve(ValuePack::single(Value::list(slots)));
                    }
                    Ok(ValuePack::empty())
                })),
                Some(Box::new(move |values: ValuePack| {
                    // First rejection wins; later settlements hit the
                    // aggregate's exactly-once guard.
                    reject.reject(values);
                    Ok(ValuePack::empty())
                })),
            );
        }
    }))
}
