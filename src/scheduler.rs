//! The host scheduler seam.
//!
//! The state machine only needs two things from its host: run a callback
//! after the current unit of work yields (deferral, used by the
//! unhandled-rejection check), and start a new cooperative task. Both are
//! behind [`Scheduler`] so an embedder can wire in its own loop. [`TickQueue`]
//! is the bundled implementation: a FIFO the host drains once per scheduling
//! tick.

use std::collections::VecDeque;

use parking_lot::Mutex;

/// A unit of deferred or spawned work.
pub type Task = Box<dyn FnOnce() + Send>;

pub trait Scheduler: Send + Sync {
    /// Queues `task` to run after the current unit of work yields.
    fn defer(&self, task: Task);

    /// Starts `task` as a new cooperative task.
    fn spawn(&self, task: Task);
}

/// FIFO task queue drained by the embedding host.
///
/// Spawned tasks land in the same queue as deferred callbacks; under a
/// cooperative scheduler a "new task" is simply more queued work.
#[derive(Default)]
pub struct TickQueue {
    queue: Mutex<VecDeque<Task>>,
}

impl TickQueue {
    pub fn new() -> TickQueue {
        TickQueue::default()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Runs everything queued at the moment of the call, one tick's worth.
    /// Work queued by the tasks themselves stays for the next tick.
    pub fn run_tick(&self) -> usize {
        let snapshot: Vec<Task> = {
            let mut queue = self.queue.lock();
            queue.drain(..).collect()
        };
        let ran = snapshot.len();
        for task in snapshot {
            task();
        }
        ran
    }

    /// Drains the queue until it stays empty, including work queued while
    /// draining.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        loop {
            let task = self.queue.lock().pop_front();
            match task {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }
}

impl Scheduler for TickQueue {
    fn defer(&self, task: Task) {
        self.queue.lock().push_back(task);
    }

    fn spawn(&self, task: Task) {
        self.queue.lock().push_back(task);
    }
}
