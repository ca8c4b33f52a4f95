//! Periodic queue refresh — timer-driven re-run of the queue service.
//!
//! Spawns a background thread that runs `QueueService::run_once` every
//! interval. Each run supersedes the previous one; failures are logged and
//! the loop carries on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use super::service::{QueueService, RefreshReport};

/// Sleep granularity for shutdown responsiveness.
const SLEEP_GRANULARITY: Duration = Duration::from_millis(100);

/// Handle for the background refresh thread.
///
/// Supports graceful shutdown via `shutdown()` or automatic cleanup on `Drop`.
pub struct RefreshSchedulerHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl RefreshSchedulerHandle {
    /// Request graceful shutdown. A refresh already running completes.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for RefreshSchedulerHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

/// Start refreshing on a separate thread. `on_refresh` receives every
/// successful report (e.g. to publish it to connected clients).
pub fn start_periodic_refresh<F>(
    service: Arc<QueueService>,
    interval: Duration,
    on_refresh: F,
) -> RefreshSchedulerHandle
where
    F: Fn(RefreshReport) + Send + 'static,
{
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();

    let handle = std::thread::spawn(move || {
        tracing::info!(interval_ms = interval.as_millis() as u64, "Periodic queue refresh started");
        refresh_loop(&service, interval, &flag, &on_refresh);
        tracing::info!("Periodic queue refresh shutting down");
    });

    RefreshSchedulerHandle {
        shutdown,
        handle: Some(handle),
    }
}

fn refresh_loop<F>(service: &QueueService, interval: Duration, shutdown: &AtomicBool, on_refresh: &F)
where
    F: Fn(RefreshReport),
{
    while !shutdown.load(Ordering::Relaxed) {
        match service.run_once(Utc::now()) {
            Ok(report) => on_refresh(report),
            Err(e) => tracing::warn!(error = %e, "Periodic queue refresh failed"),
        }

        // Sleep in small increments for responsive shutdown
        let mut slept = Duration::ZERO;
        while slept < interval {
            if shutdown.load(Ordering::Relaxed) {
                return;
            }
            let step = SLEEP_GRANULARITY.min(interval - slept);
            std::thread::sleep(step);
            slept += step;
        }
    }
}
