//! Re-arming refresh timer.
//!
//! Each tick sleeps for the full interval *after* the previous refresh has
//! settled, so a slow refresh delays the next one instead of overlapping it.
//! Stopping cancels the pending sleep, waits for an in-flight refresh to
//! finish, then runs exactly one final refresh.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use prismetrics_core::error::{MetricsError, Result};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(15_000);

/// Anything the scheduler can drive.
///
/// Takes an owned handle so CPU-heavy targets can move the work onto the
/// blocking pool instead of stalling a runtime worker.
#[async_trait]
pub trait RefreshTarget: Send + Sync + 'static {
    async fn refresh(self: Arc<Self>) -> Result<()>;
}

pub type ErrorHook = Arc<dyn Fn(&MetricsError) + Send + Sync>;

#[derive(Clone)]
pub struct RefreshOptions {
    pub interval: Duration,
    pub on_error: Option<ErrorHook>,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_REFRESH_INTERVAL,
            on_error: None,
        }
    }
}

impl RefreshOptions {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            on_error: None,
        }
    }

    /// Called with every failed tick; the loop keeps running regardless.
    pub fn on_error(mut self, hook: impl Fn(&MetricsError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(hook));
        self
    }
}

struct Running {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    target: Arc<dyn RefreshTarget>,
}

#[derive(Default)]
pub struct RefreshScheduler {
    running: Mutex<Option<Running>>,
    in_flight: Arc<AtomicBool>,
}

impl RefreshScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn the loop on the current tokio runtime. Returns `false` (and
    /// changes nothing) if a loop is already running.
    pub fn start(&self, target: Arc<dyn RefreshTarget>, options: RefreshOptions) -> bool {
        let mut running = self.lock();
        if running.is_some() {
            debug!("refresh loop already running");
            return false;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(run_loop(
            Arc::clone(&target),
            options,
            stop_rx,
            Arc::clone(&self.in_flight),
        ));
        *running = Some(Running {
            stop_tx,
            task,
            target,
        });
        true
    }

    /// Cancel the timer, drain any in-flight tick, then refresh once more.
    /// Final-refresh failures are swallowed. Returns `false` when there was
    /// nothing to stop.
    pub async fn stop(&self) -> bool {
        let Some(running) = self.lock().take() else {
            return false;
        };

        let _ = running.stop_tx.send(true);
        if let Err(e) = running.task.await {
            warn!(error = %e, "refresh loop task ended abnormally");
        }

        if let Err(e) = running.target.refresh().await {
            debug!(error = %e, "final refresh failed during stop");
        }
        true
    }

    pub fn is_running(&self) -> bool {
        self.lock().is_some()
    }

    /// True while a tick's refresh is executing.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

async fn run_loop(
    target: Arc<dyn RefreshTarget>,
    options: RefreshOptions,
    mut stop_rx: watch::Receiver<bool>,
    in_flight: Arc<AtomicBool>,
) {
    info!(
        interval_ms = options.interval.as_millis() as u64,
        "refresh loop started"
    );

    loop {
        tokio::select! {
            _ = tokio::time::sleep(options.interval) => {}
            _ = stop_rx.changed() => break,
        }

        in_flight.store(true, Ordering::Release);
        let res = Arc::clone(&target).refresh().await;
        in_flight.store(false, Ordering::Release);

        if let Err(e) = res {
            warn!(error = %e, "scheduled refresh failed");
            if let Some(hook) = &options.on_error {
                hook(&e);
            }
        }
    }

    debug!("refresh loop exited");
}
