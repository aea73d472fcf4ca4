//! Metrics Aggregation Task
//!
//! Periodically prunes expired operation records and samples system usage.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::metrics::WeakMetricsCollector;

/// Spawns the aggregation loop for a metrics collector.
///
/// Exits once the collector is dropped or destroyed.
pub fn spawn_aggregation_task(collector: WeakMetricsCollector, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting metrics aggregation task with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let Some(collector) = collector.upgrade() else {
                break;
            };
            if collector.is_destroyed() {
                break;
            }

            let report = collector.aggregate();
            if report.pruned_records > 0 {
                debug!("Metrics aggregation: pruned {} records", report.pruned_records);
            }
        }

        debug!("Metrics aggregation task stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetricsConfig;
    use crate::metrics::MetricsCollector;

    #[tokio::test]
    async fn test_aggregation_task_prunes_records() {
        let collector = MetricsCollector::new(MetricsConfig {
            enable_system_metrics: false,
            metrics_retention: Duration::from_millis(30),
            aggregation_interval: Duration::ZERO,
            ..MetricsConfig::default()
        });
        collector.start_operation("op", "load").unwrap();
        collector.end_operation("op", true, None);

        let handle = spawn_aggregation_task(collector.downgrade(), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(150)).await;

        let snapshot = collector.metrics();
        assert!(snapshot.operations.recent.is_empty());
        assert_eq!(snapshot.operations.totals.total, 1);
        handle.abort();
    }

    #[tokio::test]
    async fn test_aggregation_task_exits_after_destroy() {
        let collector = MetricsCollector::new(MetricsConfig {
            aggregation_interval: Duration::ZERO,
            ..MetricsConfig::default()
        });
        let handle = spawn_aggregation_task(collector.downgrade(), Duration::from_millis(10));

        collector.destroy();
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(handle.is_finished());
    }
}
