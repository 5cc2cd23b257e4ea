//! Lockable session handle for hosts whose hook registration wants
//! `'static` state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use countprof_utils::{Clock, MonotonicClock};
use parking_lot::Mutex;

use crate::error::Result;
use crate::host::{HookEvent, HostRuntime};
use crate::session::{ProfilerSession, SessionStats};

/// Cloneable handle to one [`ProfilerSession`].
///
/// The lock serialises access between the hook callback and whoever calls
/// `start`/`stop`/`dump`. It does not make a single session usable from
/// several interpreter threads at once: each thread still needs its own.
pub struct SharedSession<H, C = MonotonicClock> {
    inner: Arc<Mutex<ProfilerSession<H, C>>>,
}

impl<H, C> Clone for SharedSession<H, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: HostRuntime, C: Clock> SharedSession<H, C> {
    pub fn new(session: ProfilerSession<H, C>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    pub fn start(&self) {
        self.inner.lock().start();
    }

    pub fn stop(&self) {
        self.inner.lock().stop();
    }

    pub fn on_hook(&self, event: HookEvent) -> Result<()> {
        self.inner.lock().on_hook(event)
    }

    pub fn dump(&self) -> Result<PathBuf> {
        self.inner.lock().dump()
    }

    pub fn dump_to(&self, path: &Path) -> Result<()> {
        self.inner.lock().dump_to(path)
    }

    pub fn reset(&self) {
        self.inner.lock().reset();
    }

    pub fn stats(&self) -> SessionStats {
        self.inner.lock().stats()
    }

    /// Snapshot of the current report.
    pub fn report(&self) -> Vec<String> {
        self.inner.lock().report_lines().collect()
    }

    /// Run `f` with exclusive access to the session.
    pub fn with_session<R>(&self, f: impl FnOnce(&mut ProfilerSession<H, C>) -> R) -> R {
        f(&mut self.inner.lock())
    }
}
