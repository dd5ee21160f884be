//! Shared poll loop used by the collection refresh and the detail view.
//!
//! A poll loop ticks on a fixed interval, first tick immediately. Stopping
//! sets a cancellation flag and signals the loop; a request already in
//! flight is allowed to finish but its result must be discarded by the
//! tick body, which checks the flag it captured at request start.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Shared "this poll has been stopped" flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Handle to a running poll loop.
///
/// Dropping the handle does not stop the loop; call [`RefreshHandle::stop`].
#[derive(Debug)]
pub struct RefreshHandle {
    flag: CancellationFlag,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Stop ticking. Idempotent.
    ///
    /// An in-flight request is not aborted; its result is discarded.
    pub fn stop(&self) {
        self.flag.cancel();
        self.shutdown.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.is_cancelled()
    }

    /// Stop and wait for the loop to exit, including any in-flight tick.
    pub async fn join(self) {
        self.stop();
        if let Err(e) = self.task.await {
            tracing::debug!(error = %e, "poll task ended abnormally");
        }
    }
}

/// Spawn a loop calling `tick` every `period` until stopped.
///
/// `tick` receives the loop's cancellation flag.
pub fn spawn_poll<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> RefreshHandle
where
    F: FnMut(CancellationFlag) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let flag = CancellationFlag::new();
    let (shutdown, mut shutdown_rx) = watch::channel(false);
    let loop_flag = flag.clone();

    let task = tokio::spawn(async move {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::debug!(poll = name, period_ms = period.as_millis() as u64, "poll started");

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }

                _ = interval.tick() => {
                    if loop_flag.is_cancelled() {
                        break;
                    }
                    tick(loop_flag.clone()).await;
                }
            }
        }

        tracing::debug!(poll = name, "poll stopped");
    });

    RefreshHandle {
        flag,
        shutdown,
        task,
    }
}
