//! Periodic bidding-war monitoring.
//!
//! Runs as a long-lived tokio task: an immediate scan at startup, then one
//! per interval tick. Cancellation stops future scans without interrupting
//! one already in flight.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::detector::BiddingWarDetector;

/// Handle to a running monitor. Dropping it without `cancel` leaves the task
/// running detached; hosts that want a bounded lifetime keep the handle.
pub struct MonitorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Stop future scans. An in-flight scan finishes normally.
    pub fn cancel(&self) {
        let _ = self.shutdown.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel and wait for the task to wind down.
    pub async fn shutdown(self) {
        self.cancel();
        let _ = self.task.await;
    }
}

/// Spawn the monitoring loop with the given scan interval.
pub fn start(detector: Arc<BiddingWarDetector>, interval: Duration) -> MonitorHandle {
    let (shutdown, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        log::info!(
            "Starting bidding war monitoring (checking every {:?})",
            interval
        );
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        // A dropped sender means the handle is gone without an explicit
        // cancel: stop polling the shutdown branch and keep ticking detached.
        let mut shutdown_open = true;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match detector.scan().await {
                        Ok(wars) if !wars.is_empty() => {
                            log::info!("Scan detected {} active bidding wars", wars.len());
                        }
                        Ok(_) => {}
                        Err(e) => {
                            log::warn!("Bidding war scan failed: {}", e);
                        }
                    }
                }
                changed = shutdown_rx.changed(), if shutdown_open => {
                    match changed {
                        Ok(()) => {
                            if *shutdown_rx.borrow() {
                                break;
                            }
                        }
                        Err(_) => shutdown_open = false,
                    }
                }
            }
        }
        log::info!("Bidding war monitoring stopped");
    });

    MonitorHandle { shutdown, task }
}
