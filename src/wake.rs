//! One-shot wake primitive backing the blocking wait.
//!
//! A [`Signal`]/[`Waiter`] pair shares a sticky flag. The waiter is a
//! `Future` that parks until the signal fires; firing is idempotent and
//! signals delivered before anyone waits are not lost. A waker *list* is
//! kept rather than a single slot: several futures may poll the same flag
//! and waking only the most recent poller loses wakeups.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use futures::executor::block_on;
use parking_lot::Mutex;

#[derive(Default)]
struct Flag {
    fired: bool,
    wakers: Vec<Waker>,
}

/// Fires the shared flag; cloneable, first call wins, later calls are no-ops.
#[derive(Clone)]
pub struct Signal {
    flag: Arc<Mutex<Flag>>,
}

/// Waits for the shared flag, either as a `Future` or by blocking the
/// calling task.
pub struct Waiter {
    flag: Arc<Mutex<Flag>>,
}

/// Creates a connected signal/waiter pair.
pub fn channel() -> (Signal, Waiter) {
    let flag = Arc::new(Mutex::new(Flag::default()));
    (Signal { flag: flag.clone() }, Waiter { flag })
}

impl Signal {
    pub fn fire(&self) {
        let wakers = {
            let mut flag = self.flag.lock();
            if flag.fired {
                return;
            }
            flag.fired = true;
            std::mem::take(&mut flag.wakers)
        };
        for waker in wakers {
            waker.wake();
        }
    }
}

impl Waiter {
    /// Blocks the calling task until the signal fires. Returns immediately
    /// if it already has.
    pub fn wait(self) {
        block_on(self)
    }
}

impl Future for Waiter {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let mut flag = self.flag.lock();
        if flag.fired {
            Poll::Ready(())
        } else {
            flag.wakers.push(cx.waker().clone());
            Poll::Pending
        }
    }
}
