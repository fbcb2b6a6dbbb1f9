//! Read side: listings and aggregate views served through the view cache.
//!
//! Every list here is total. Unknown filter ids produce empty pages, never
//! errors, and an empty store yields `total: 0`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::engine::Engine;
use crate::error::CoreResult;
use crate::model::{Alert, AlertSeverity, AlertStatus, Location, Reading, Sensor, SensorType};
use crate::services::cache::{cache_key, Dimension};
use crate::store::{Listing, Page};

/// A cached read result.
#[derive(Debug, Clone)]
pub enum View {
    Locations(Arc<Listing<Location>>),
    Sensors(Arc<Listing<Sensor>>),
    Alerts(Arc<Listing<Alert>>),
    Readings(Arc<Listing<Reading>>),
    Latest(Arc<Vec<Reading>>),
    Summary(Arc<AlertSummary>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorFilter {
    pub sensor_type: Option<SensorType>,
    pub location_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

impl SensorFilter {
    fn matches(&self, sensor: &Sensor) -> bool {
        self.sensor_type.is_none_or(|t| sensor.sensor_type == t)
            && self.location_id.is_none_or(|id| sensor.location_id == id)
            && self.is_active.is_none_or(|a| sensor.is_active == a)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertFilter {
    pub status: Option<AlertStatus>,
    pub sensor_id: Option<Uuid>,
    pub severity: Option<AlertSeverity>,
}

impl AlertFilter {
    fn matches(&self, alert: &Alert) -> bool {
        self.status.is_none_or(|s| alert.status == s)
            && self.sensor_id.is_none_or(|id| alert.sensor_id == id)
            && self.severity.is_none_or(|s| alert.severity == s)
    }
}

/// Reading history filter. `start` and `end` are inclusive bounds on `timestamp`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadingFilter {
    pub sensor_id: Option<Uuid>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl ReadingFilter {
    fn matches(&self, reading: &Reading) -> bool {
        self.start.is_none_or(|s| reading.timestamp >= s)
            && self.end.is_none_or(|e| reading.timestamp <= e)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatusCounts {
    pub active: usize,
    pub acknowledged: usize,
    pub resolved: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SeverityCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

/// Alert counts for dashboards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct AlertSummary {
    pub total: usize,
    pub by_status: StatusCounts,
    /// Severity breakdown of alerts that are not yet resolved
    pub unresolved_by_severity: SeverityCounts,
}

impl AlertSummary {
    fn tally<'a>(alerts: impl IntoIterator<Item = &'a Alert>) -> Self {
        let mut summary = Self::default();
        for alert in alerts {
            summary.total += 1;
            match alert.status {
                AlertStatus::Active => summary.by_status.active += 1,
                AlertStatus::Acknowledged => summary.by_status.acknowledged += 1,
                AlertStatus::Resolved => summary.by_status.resolved += 1,
            }
            if alert.is_unresolved() {
                let counts = &mut summary.unresolved_by_severity;
                match alert.severity {
                    AlertSeverity::Low => counts.low += 1,
                    AlertSeverity::Medium => counts.medium += 1,
                    AlertSeverity::High => counts.high += 1,
                    AlertSeverity::Critical => counts.critical += 1,
                }
            }
        }
        summary
    }
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn page_components(page: Page) -> [String; 2] {
    [page.limit.to_string(), page.offset.to_string()]
}

impl Engine {
    /// Resolve request paging: missing limit takes the default page size and
    /// every limit is clamped into `1..=max_page_size`.
    #[must_use]
    pub fn page(&self, limit: Option<usize>, offset: Option<usize>) -> Page {
        let settings = self.settings();
        let limit = limit
            .unwrap_or(settings.default_page_size)
            .clamp(1, settings.max_page_size.max(1));
        Page::new(limit, offset.unwrap_or(0))
    }

    /// Serve `key` from the view cache, computing it with `compute` when stale.
    async fn cached<T>(
        &self,
        key: String,
        deps: &[Dimension],
        compute: impl Fn() -> T,
        wrap: fn(Arc<T>) -> View,
        unwrap: fn(View) -> Option<Arc<T>>,
    ) -> Arc<T> {
        let cache = &self.inner.cache;
        let view = cache
            .get_or_compute(key.clone(), deps, || wrap(Arc::new(compute())))
            .await;
        match unwrap(view) {
            Some(value) => value,
            None => {
                tracing::warn!(cache_key = %key, "Cached view has unexpected shape, recomputing");
                cache.invalidate_key(&key).await;
                Arc::new(compute())
            }
        }
    }

    pub async fn list_locations(&self, page: Page) -> Listing<Location> {
        let [limit, offset] = page_components(page);
        let key = cache_key("locations", &[&limit, &offset]);
        let view = self
            .cached(
                key,
                &[Dimension::Locations],
                || self.store().list_locations(|_| true, page),
                View::Locations,
                |v| match v {
                    View::Locations(l) => Some(l),
                    _ => None,
                },
            )
            .await;
        Arc::unwrap_or_clone(view)
    }

    pub async fn list_sensors(&self, filter: &SensorFilter, page: Page) -> Listing<Sensor> {
        let [limit, offset] = page_components(page);
        let key = cache_key(
            "sensors",
            &[
                &opt(filter.sensor_type),
                &opt(filter.location_id),
                &opt(filter.is_active),
                &limit,
                &offset,
            ],
        );
        let view = self
            .cached(
                key,
                &[Dimension::Sensors],
                || self.store().list_sensors(|s| filter.matches(s), page),
                View::Sensors,
                |v| match v {
                    View::Sensors(s) => Some(s),
                    _ => None,
                },
            )
            .await;
        Arc::unwrap_or_clone(view)
    }

    /// Alerts newest first.
    pub async fn list_alerts(&self, filter: &AlertFilter, page: Page) -> Listing<Alert> {
        let [limit, offset] = page_components(page);
        let key = cache_key(
            "alerts",
            &[
                &opt(filter.status),
                &opt(filter.sensor_id),
                &opt(filter.severity),
                &limit,
                &offset,
            ],
        );
        let view = self
            .cached(
                key,
                &[Dimension::Alerts],
                || self.store().list_alerts(|a| filter.matches(a), page),
                View::Alerts,
                |v| match v {
                    View::Alerts(a) => Some(a),
                    _ => None,
                },
            )
            .await;
        Arc::unwrap_or_clone(view)
    }

    /// Reading history, newest timestamp first.
    pub async fn list_readings(&self, filter: &ReadingFilter, page: Page) -> Listing<Reading> {
        let [limit, offset] = page_components(page);
        let key = cache_key(
            "readings",
            &[
                &opt(filter.sensor_id),
                &opt(filter.start.map(|t| t.to_rfc3339())),
                &opt(filter.end.map(|t| t.to_rfc3339())),
                &limit,
                &offset,
            ],
        );
        let view = self
            .cached(
                key,
                &[Dimension::Readings],
                || {
                    self.store()
                        .list_readings(filter.sensor_id, |r| filter.matches(r), page)
                },
                View::Readings,
                |v| match v {
                    View::Readings(r) => Some(r),
                    _ => None,
                },
            )
            .await;
        Arc::unwrap_or_clone(view)
    }

    /// Most recent reading of every active sensor, optionally restricted to `sensor_ids`.
    pub async fn latest_readings_per_sensor(&self, sensor_ids: Option<&[Uuid]>) -> Vec<Reading> {
        let ids = sensor_ids
            .map(|ids| ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(","))
            .unwrap_or_default();
        let key = cache_key("readings_latest", &[&ids]);
        let view = self
            .cached(
                key,
                &[Dimension::Sensors, Dimension::Readings],
                || {
                    self.store().latest_readings(|s| {
                        s.is_active && sensor_ids.is_none_or(|ids| ids.contains(&s.id))
                    })
                },
                View::Latest,
                |v| match v {
                    View::Latest(r) => Some(r),
                    _ => None,
                },
            )
            .await;
        Arc::unwrap_or_clone(view)
    }

    pub async fn alert_summary(&self) -> AlertSummary {
        let view = self
            .cached(
                cache_key("alerts_summary", &[]),
                &[Dimension::Alerts],
                || AlertSummary::tally(&self.store().list_alerts(|_| true, Page::all()).items),
                View::Summary,
                |v| match v {
                    View::Summary(s) => Some(s),
                    _ => None,
                },
            )
            .await;
        *view
    }

    pub fn get_location(&self, id: Uuid) -> CoreResult<Location> {
        self.store().location(id)
    }

    pub fn get_sensor(&self, id: Uuid) -> CoreResult<Sensor> {
        self.store().sensor(id)
    }

    pub fn get_alert(&self, id: Uuid) -> CoreResult<Alert> {
        self.store().alert(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineSettings;

    #[test]
    fn page_is_clamped_to_configured_bounds() {
        let engine = Engine::in_memory(EngineSettings {
            default_page_size: 20,
            max_page_size: 50,
            ..EngineSettings::default()
        });

        assert_eq!(engine.page(None, None), Page::new(20, 0));
        assert_eq!(engine.page(Some(500), Some(7)), Page::new(50, 7));
        assert_eq!(engine.page(Some(0), None), Page::new(1, 0));
    }

    #[test]
    fn summary_counts_unresolved_severity_only() {
        let base = Alert {
            id: Uuid::new_v4(),
            sensor_id: Uuid::new_v4(),
            alert_type: crate::model::AlertType::Manual,
            severity: AlertSeverity::High,
            status: AlertStatus::Active,
            title: "t".into(),
            message: "m".into(),
            exceeded_bound: None,
            threshold_value: None,
            actual_value: None,
            triggered_at: Utc::now(),
            acknowledged_at: None,
            acknowledged_by: None,
            resolved_at: None,
            resolved_by: None,
            version: 1,
        };
        let acked = Alert {
            status: AlertStatus::Acknowledged,
            severity: AlertSeverity::Low,
            ..base.clone()
        };
        let resolved = Alert {
            status: AlertStatus::Resolved,
            severity: AlertSeverity::Critical,
            ..base.clone()
        };

        let summary = AlertSummary::tally([&base, &acked, &resolved]);
        assert_eq!(summary.total, 3);
        assert_eq!(
            summary.by_status,
            StatusCounts {
                active: 1,
                acknowledged: 1,
                resolved: 1
            }
        );
        assert_eq!(
            summary.unresolved_by_severity,
            SeverityCounts {
                low: 1,
                high: 1,
                ..SeverityCounts::default()
            }
        );
    }
}
