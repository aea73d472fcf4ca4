//! Tracker Retention Task
//!
//! Periodically drops processing samples that fell out of the retention window.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::processing::WeakProcessingTimeTracker;

/// Spawns the retention loop for a processing time tracker.
///
/// Exits once the tracker is dropped or destroyed.
pub fn spawn_retention_task(tracker: WeakProcessingTimeTracker, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;

            let Some(tracker) = tracker.upgrade() else {
                break;
            };
            if tracker.is_destroyed() {
                break;
            }

            let report = tracker.prune();
            if report.pruned_samples > 0 {
                debug!("Tracker retention: pruned {} samples", report.pruned_samples);
            }
        }
    })
}
