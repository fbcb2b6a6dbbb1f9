//! Unit tests for the view cache.
//!
//! Run with: cargo test --test cache_unit_test

use std::time::Duration;

use sensor_monitor::services::cache::{self, Dimension, ViewCache};

#[test]
fn cache_key_builds_correctly() {
    // Basic key building
    assert_eq!(cache::cache_key("alerts", &[]), "alerts");
    assert_eq!(
        cache::cache_key("alerts", &["active", "sensor-1", "100", "0"]),
        "alerts:active:sensor-1:100:0"
    );

    // Empty components preserved (ensures query uniqueness)
    assert_ne!(
        cache::cache_key("alerts", &["active", "", "100"]),
        cache::cache_key("alerts", &["active", "100"])
    );
}

#[tokio::test]
async fn invalidation_only_touches_dependent_views() {
    let views: ViewCache<String> = ViewCache::new(100, Duration::from_secs(60));

    let sensors = views
        .get_or_compute("sensors".into(), &[Dimension::Sensors], || "v1".to_string())
        .await;
    let latest = views
        .get_or_compute(
            "latest".into(),
            &[Dimension::Sensors, Dimension::Readings],
            || "v1".to_string(),
        )
        .await;
    assert_eq!((sensors.as_str(), latest.as_str()), ("v1", "v1"));

    views.invalidate(&[Dimension::Readings]);

    let sensors = views
        .get_or_compute("sensors".into(), &[Dimension::Sensors], || "v2".to_string())
        .await;
    let latest = views
        .get_or_compute(
            "latest".into(),
            &[Dimension::Sensors, Dimension::Readings],
            || "v2".to_string(),
        )
        .await;
    assert_eq!(sensors, "v1", "sensor listing does not depend on readings");
    assert_eq!(latest, "v2", "latest readings must be recomputed");

    assert_eq!(views.generation(Dimension::Readings), 1);
    assert_eq!(views.generation(Dimension::Sensors), 0);
}

#[tokio::test]
async fn dropped_key_is_recomputed() {
    let views: ViewCache<u32> = ViewCache::new(10, Duration::from_secs(60));

    views.get_or_compute("summary".into(), &[Dimension::Alerts], || 1).await;
    views.invalidate_key("summary").await;

    let value = views
        .get_or_compute("summary".into(), &[Dimension::Alerts], || 2)
        .await;
    assert_eq!(value, 2);
}
