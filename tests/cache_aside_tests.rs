//! End-to-end tests combining the cache, metrics collector and processing
//! tracker the way a request pipeline uses them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use resource_cache::metrics::{ResourceAttributes, EVENT_HIT, EVENT_MISS};
use resource_cache::{
    CacheConfig, CacheError, MetricsCollector, MetricsConfig, ProcessingTimeTracker,
    ResourceCache, SetOptions, TrackerConfig,
};
use serde_json::{json, Value};

// == Helper Functions ==

fn quiet_cache(max_size: usize) -> ResourceCache<Value> {
    ResourceCache::new(CacheConfig {
        max_size,
        cleanup_interval: Duration::ZERO,
        ..CacheConfig::default()
    })
}

fn quiet_collector() -> MetricsCollector {
    MetricsCollector::new(MetricsConfig {
        enable_system_metrics: false,
        aggregation_interval: Duration::ZERO,
        ..MetricsConfig::default()
    })
}

/// One request: load a model through the cache while timing the stages.
async fn handle_request(
    id: &str,
    cache: &ResourceCache<Value>,
    metrics: &MetricsCollector,
    tracker: &ProcessingTimeTracker,
    loads: &Arc<AtomicUsize>,
) -> anyhow::Result<Value> {
    metrics.start_operation(id, "inference")?;
    tracker.start_operation(id, "inference")?;

    tracker.start_stage(id, "load_model")?;
    let hit = cache.has("bert", Some("model")).await;
    let counter = Arc::clone(loads);
    let model = cache
        .get_or_set(
            "bert",
            || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>(json!({"weights": [0.1, 0.2, 0.3]}))
            },
            SetOptions::new().resource_type("model"),
        )
        .await?;
    tracker.end_stage(id, "load_model")?;
    metrics.record_resource_usage(
        "model_cache",
        if hit { EVENT_HIT } else { EVENT_MISS },
        ResourceAttributes::new(),
    );

    tracker.start_stage(id, "predict")?;
    tracker.end_stage(id, "predict")?;

    tracker.end_operation(id, true, None)?;
    metrics.end_operation(id, true, None);
    Ok(model)
}

// == Cache-Aside Tests ==

#[tokio::test]
async fn test_pipeline_loads_resource_once() {
    let cache = quiet_cache(10);
    let metrics = quiet_collector();
    let tracker = ProcessingTimeTracker::new(TrackerConfig::default());
    let loads = Arc::new(AtomicUsize::new(0));

    for id in ["r1", "r2", "r3"] {
        let model = handle_request(id, &cache, &metrics, &tracker, &loads)
            .await
            .unwrap();
        assert_eq!(model["weights"][1], 0.2);
    }

    assert_eq!(loads.load(Ordering::SeqCst), 1);

    let stats = cache.stats().await;
    assert_eq!(stats.sets, 1);
    assert_eq!(stats.total_items, 1);

    let snapshot = metrics.metrics();
    assert_eq!(snapshot.operations.totals.total, 3);
    let counters = &snapshot.resources["model_cache"];
    assert_eq!(counters.misses, 1);
    assert_eq!(counters.hits, 2);

    let analytics = tracker.analytics("inference");
    assert_eq!(analytics.total_operations, 3);
    assert_eq!(tracker.stats().active_operations, 0);
}

#[tokio::test]
async fn test_concurrent_requests_share_one_load() {
    let cache = quiet_cache(10);
    let loads = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = cache.clone();
        let loads = Arc::clone(&loads);
        handles.push(tokio::spawn(async move {
            cache
                .get_or_set(
                    "tokenizer",
                    || async move {
                        loads.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok::<_, CacheError>(json!("vocab"))
                    },
                    SetOptions::new(),
                )
                .await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), json!("vocab"));
    }
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_load_is_recorded_and_not_cached() {
    let cache = quiet_cache(10);
    let metrics = quiet_collector();
    let tracker = ProcessingTimeTracker::new(TrackerConfig::default());

    metrics.start_operation("bad", "inference").unwrap();
    tracker.start_operation("bad", "inference").unwrap();
    tracker.start_stage("bad", "load_model").unwrap();

    let result: anyhow::Result<Value> = cache
        .get_or_set(
            "broken",
            || async { Err(anyhow::anyhow!("weights missing")) },
            SetOptions::new(),
        )
        .await;
    assert_eq!(result.unwrap_err().to_string(), "weights missing");

    let completed = tracker.end_operation("bad", false, None).unwrap();
    assert_eq!(completed.stage_breakdown.stages.len(), 1);
    let record = metrics.end_operation("bad", false, None).unwrap();
    assert!(!record.success);

    assert!(!cache.has("broken", None).await);
    assert_eq!(metrics.summary().operations.failed, 1);
    assert_eq!(tracker.analytics("inference").success_rate, 0.0);
}

#[tokio::test]
async fn test_ttl_expiry_triggers_reload() {
    let cache = quiet_cache(10);
    let loads = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        let counter = Arc::clone(&loads);
        cache
            .get_or_set(
                "session",
                || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, CacheError>(json!(1))
                },
                SetOptions::new().ttl(Duration::from_millis(30)),
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
    }

    assert_eq!(loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_destroy_stops_all_components() {
    let cache = quiet_cache(10);
    let metrics = quiet_collector();
    let tracker = ProcessingTimeTracker::new(TrackerConfig::default());

    cache.set("k", json!(1), SetOptions::new()).await.unwrap();
    cache.destroy().await;
    metrics.destroy();
    tracker.destroy();

    assert_eq!(cache.get("k", None).await, None);
    assert!(matches!(
        cache.set("k", json!(2), SetOptions::new()).await,
        Err(CacheError::Destroyed)
    ));
    assert!(metrics.start_operation("x", "t").is_err());
    assert!(tracker.start_operation("x", "t").is_err());
}
