//! Engine lifecycle helper.
//!
//! Every engine owns a [`Unit`]: it launches the engine's background
//! work, serializes its `process` executions, and coordinates cooperative
//! shutdown. Periodic work launched through the unit never overlaps with
//! itself; when an invocation overruns its interval, the next one runs
//! back-to-back after it returns.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Launch, serialization, and shutdown primitives shared by all engines.
pub struct Unit {
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    serial: tokio::sync::Mutex<()>,
}

impl Default for Unit {
    fn default() -> Self {
        Self::new()
    }
}

impl Unit {
    /// A fresh unit, not yet shut down.
    pub fn new() -> Unit {
        let (shutdown_tx, _) = watch::channel(false);
        Unit {
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
            serial: tokio::sync::Mutex::new(()),
        }
    }

    /// A receiver that flips to `true` when the unit shuts down. Launched
    /// tasks select on this for cooperative cancellation.
    pub fn ctx(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Whether `done` has been called.
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Launches a background task tracked by this unit.
    pub fn launch<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(fut);
        self.handles.lock().push(handle);
    }

    /// Launches `f` to run every `interval`, starting after `delay`.
    ///
    /// Invocations of `f` never overlap: the next call is not scheduled
    /// before the previous one returns. An in-flight invocation is allowed
    /// to finish during shutdown.
    pub fn launch_periodically<F, Fut>(&self, mut f: F, interval: Duration, delay: Duration)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let mut shutdown = self.ctx();
        self.launch(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => return,
            }
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => f().await,
                    _ = shutdown.changed() => return,
                }
            }
        });
    }

    /// Runs `fut` serialized against every other `do_serial` call on this
    /// unit. Engines route `process` through here so event handling is
    /// single-file without a dedicated worker thread.
    pub async fn do_serial<T>(&self, fut: impl Future<Output = T>) -> T {
        let _guard = self.serial.lock().await;
        fut.await
    }

    /// Signals shutdown and waits for every launched task to finish.
    pub async fn done(&self) {
        let _ = self.shutdown_tx.send(true);
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::warn!(target: "unit", event = "task_panicked", error = %e);
                }
            }
        }
    }
}
