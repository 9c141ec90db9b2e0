//! Single-resolution, multi-value promises for cooperatively scheduled
//! tasks.
//!
//! A [`Promise`] settles exactly once with an ordered, possibly-sparse
//! [`ValuePack`]; consumers derive new promises with [`Promise::and_then`]
//! (or the [`Promise::then`]/[`Promise::catch`] sugar) before or after the
//! outcome is known. Resolving with a sole nested promise adopts that
//! promise's eventual outcome instead of carrying it as a value. [`all`]
//! aggregates a sequence of promises; [`Promise::wait`] blocks the calling
//! task until settlement.
//!
//! Rejections that reach the end of the current scheduling tick without a
//! failure handler are reported once to the host's diagnostic sink, never
//! escalated to a fault.
//!
//! # Examples
//!
//! ```
//! use copromise::{pack, Outcome, Promise};
//! use std::{thread, time::Duration};
//!
//! let mut handle = None;
//! let p = Promise::new(|resolve, _reject| handle = Some(resolve));
//! let resolve = handle.unwrap();
//! thread::spawn(move || {
//!     thread::sleep(Duration::from_millis(10));
//!     resolve.resolve(pack![1i64, 2i64]).unwrap();
//! });
//! assert_eq!(p.wait(), Outcome::Fulfilled(pack![1i64, 2i64]));
//! ```

mod advancer;
mod all;
mod host;
mod invoke;
mod promise;
mod scheduler;
mod value;
mod wake;

pub use all::{all, all_in};
pub use host::{drain_global, DiagnosticSink, Host, TracingSink};
pub use promise::{Handler, Outcome, Promise, Rejecter, Resolver, Status};
pub use scheduler::{Scheduler, Task, TickQueue};
pub use value::{Value, ValuePack};
pub use wake::{channel as wake_channel, Signal, Waiter};

use thiserror::Error as ThisError;

/// Synchronous misuse errors; async failures travel as rejections instead.
#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum Error {
    /// `resolve` was given a promise to assimilate plus extra values that
    /// would be silently lost.
    #[error("cannot resolve with a promise alongside {extra} extra value(s)")]
    ResolveWithPromiseAndExtras { extra: usize },
    /// `all` was given something other than a promise.
    #[error("`all` expects a sequence of promises; entry {index} is not one")]
    NotAPromise { index: usize },
}
