use std::{
    future::Future,
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use tokio::task::JoinHandle;

/// A cancellable scheduled task: schedule a deferred operation,
/// cancel the superseded one, fire at most once.
///
/// Calls within the window coalesce so that only the last scheduled
/// task runs; a superseded task is aborted at its next await point,
/// so its callback never fires unless it had already started.
///
/// Must be used from within a tokio runtime.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Mutex::new(None),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Schedule `task` to run after the debounce window, superseding
    /// any previously scheduled task.
    pub fn schedule<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let window = self.window;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            task.await;
        });
        if let Some(superseded) = self.lock_pending().replace(handle) {
            superseded.abort();
        }
    }

    /// Cancel a scheduled task, if any.
    pub fn cancel(&self) {
        if let Some(pending) = self.lock_pending().take() {
            pending.abort();
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poison_err) => {
                log::error!("A poisoned debouncer lock was found.");
                poison_err.into_inner()
            }
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
