//! Process-level collaborators: the scheduler handle, the diagnostic sink
//! and the debug-trace flag, bundled so every promise carries one `Arc`
//! instead of three.
//!
//! The trace flag is fixed when the host is built; there is no mutable
//! global to flip at runtime.

use std::sync::{Arc, OnceLock};

use crate::scheduler::{Scheduler, TickQueue};

/// Receives formatted diagnostic text, most notably unhandled-rejection
/// reports.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, message: &str);
}

/// Default sink: forwards diagnostics to `tracing` at warn level.
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, message: &str) {
        tracing::warn!(target: "copromise", "{message}");
    }
}

/// Configuration bundle shared by every promise created against it.
pub struct Host {
    scheduler: Arc<dyn Scheduler>,
    sink: Arc<dyn DiagnosticSink>,
    trace: bool,
}

struct Global {
    ticks: Arc<TickQueue>,
    host: Arc<Host>,
}

static GLOBAL: OnceLock<Global> = OnceLock::new();

fn global() -> &'static Global {
    GLOBAL.get_or_init(|| {
        let ticks = Arc::new(TickQueue::new());
        let host = Host::new(ticks.clone(), Arc::new(TracingSink), false);
        Global { ticks, host }
    })
}

impl Host {
    pub fn new(
        scheduler: Arc<dyn Scheduler>,
        sink: Arc<dyn DiagnosticSink>,
        trace: bool,
    ) -> Arc<Host> {
        Arc::new(Host {
            scheduler,
            sink,
            trace,
        })
    }

    /// The lazily-built default host: a process-wide [`TickQueue`] and the
    /// `tracing` sink, tracing off. Embedders that want deferred
    /// diagnostics delivered must pump it via [`drain_global`].
    pub fn global() -> Arc<Host> {
        global().host.clone()
    }

    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }

    pub fn sink(&self) -> &Arc<dyn DiagnosticSink> {
        &self.sink
    }

    pub fn trace(&self) -> bool {
        self.trace
    }
}

/// Drains work deferred through the global host's queue, returning how many
/// tasks ran.
pub fn drain_global() -> usize {
    global().ticks.run_until_idle()
}
