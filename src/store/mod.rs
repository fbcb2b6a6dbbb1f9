//! In-memory authoritative entity store.
//!
//! All four collections live behind a single `RwLock` that is only held for
//! the synchronous validate-and-commit step of one write, never across an
//! `.await`. Foreign keys and uniqueness are checked against the same snapshot
//! the write commits into, so a commit is atomic with respect to its checks.
//!
//! Writes of existing entities are compare-and-swap on `version`: the entity
//! handed to `put` must carry the version it was derived from.

mod table;

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::model::{Alert, AlertStatus, Entity, EntityKind, Location, Reading, Sensor};

use table::Table;

/// Limit/offset window over a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Page {
    #[must_use]
    pub fn new(limit: usize, offset: usize) -> Self {
        Self { limit, offset }
    }

    #[must_use]
    pub fn all() -> Self {
        Self {
            limit: usize::MAX,
            offset: 0,
        }
    }

    fn slice<T: Clone>(self, items: Vec<&T>) -> Listing<T> {
        let total = items.len();
        let items = items
            .into_iter()
            .skip(self.offset)
            .take(self.limit)
            .cloned()
            .collect();
        Listing { items, total }
    }
}

/// One page of results plus the number of matches before paging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub total: usize,
}

/// Result of a successful delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deleted {
    pub kind: EntityKind,
    pub id: Uuid,
    /// Readings removed together with a deleted sensor
    pub cascaded_readings: usize,
}

#[derive(Default)]
struct Tables {
    locations: Table<Location>,
    sensors: Table<Sensor>,
    readings: Table<Reading>,
    alerts: Table<Alert>,
    readings_by_sensor: HashMap<Uuid, Vec<Uuid>>,
    latest_by_sensor: HashMap<Uuid, Uuid>,
    alerts_by_sensor: HashMap<Uuid, Vec<Uuid>>,
}

impl Tables {
    fn check_version(
        kind: EntityKind,
        id: Uuid,
        stored: Option<u64>,
        given: u64,
    ) -> CoreResult<u64> {
        match stored {
            Some(actual) if actual != given => Err(CoreError::Conflict {
                kind,
                id,
                expected: given,
                actual,
            }),
            Some(actual) => Ok(actual + 1),
            // A non-zero version claims the entity already exists.
            None if given != 0 => Err(CoreError::not_found(kind, id)),
            None => Ok(1),
        }
    }

    fn track_reading(&mut self, reading: &Reading) {
        self.readings_by_sensor
            .entry(reading.sensor_id)
            .or_default()
            .push(reading.id);

        let newer = match self.latest_by_sensor.get(&reading.sensor_id) {
            Some(current) => self
                .readings
                .get(current)
                .is_none_or(|r| reading.timestamp >= r.timestamp),
            None => true,
        };
        if newer {
            self.latest_by_sensor.insert(reading.sensor_id, reading.id);
        }
    }
}

#[derive(Default)]
pub struct EntityStore {
    tables: RwLock<Tables>,
}

impl EntityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // A panic never happens mid-commit (all checks run before the first
    // mutation), so a poisoned lock still guards a consistent snapshot.
    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ========== READS ==========

    pub fn get(&self, kind: EntityKind, id: Uuid) -> CoreResult<Entity> {
        match kind {
            EntityKind::Location => self.location(id).map(Entity::Location),
            EntityKind::Sensor => self.sensor(id).map(Entity::Sensor),
            EntityKind::Reading => self.reading(id).map(Entity::Reading),
            EntityKind::Alert => self.alert(id).map(Entity::Alert),
        }
    }

    pub fn location(&self, id: Uuid) -> CoreResult<Location> {
        self.read()
            .locations
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(EntityKind::Location, id))
    }

    pub fn sensor(&self, id: Uuid) -> CoreResult<Sensor> {
        self.read()
            .sensors
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(EntityKind::Sensor, id))
    }

    pub fn reading(&self, id: Uuid) -> CoreResult<Reading> {
        self.read()
            .readings
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(EntityKind::Reading, id))
    }

    pub fn alert(&self, id: Uuid) -> CoreResult<Alert> {
        self.read()
            .alerts
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(EntityKind::Alert, id))
    }

    /// Locations in insertion order.
    pub fn list_locations(&self, filter: impl Fn(&Location) -> bool, page: Page) -> Listing<Location> {
        let tables = self.read();
        page.slice(tables.locations.iter().filter(|l| filter(l)).collect())
    }

    /// Sensors in insertion order.
    pub fn list_sensors(&self, filter: impl Fn(&Sensor) -> bool, page: Page) -> Listing<Sensor> {
        let tables = self.read();
        page.slice(tables.sensors.iter().filter(|s| filter(s)).collect())
    }

    /// Alerts newest first by `triggered_at`, ties broken by later insertion.
    pub fn list_alerts(&self, filter: impl Fn(&Alert) -> bool, page: Page) -> Listing<Alert> {
        let tables = self.read();
        let mut matched: Vec<&Alert> = tables.alerts.iter().rev().filter(|a| filter(a)).collect();
        // Stable sort keeps the reversed insertion order among equal timestamps.
        matched.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        page.slice(matched)
    }

    /// Alerts referencing `sensor_id`, in insertion order. Unknown ids yield an empty list.
    pub fn alerts_for_sensor(&self, sensor_id: Uuid) -> Vec<Alert> {
        let tables = self.read();
        tables
            .alerts_by_sensor
            .get(&sensor_id)
            .map(|ids| ids.iter().filter_map(|id| tables.alerts.get(id)).cloned().collect())
            .unwrap_or_default()
    }

    /// Readings newest first by `timestamp`, ties broken by later insertion.
    pub fn list_readings(
        &self,
        sensor_id: Option<Uuid>,
        filter: impl Fn(&Reading) -> bool,
        page: Page,
    ) -> Listing<Reading> {
        let tables = self.read();
        let mut matched: Vec<&Reading> = match sensor_id {
            Some(sensor_id) => tables
                .readings_by_sensor
                .get(&sensor_id)
                .map(|ids| ids.iter().rev().filter_map(|id| tables.readings.get(id)).collect())
                .unwrap_or_default(),
            None => tables.readings.iter().rev().collect(),
        };
        matched.retain(|r| filter(r));
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        page.slice(matched)
    }

    /// Most recent reading (by timestamp, last insert wins ties) of every
    /// sensor accepted by `filter`, in sensor insertion order.
    pub fn latest_readings(&self, filter: impl Fn(&Sensor) -> bool) -> Vec<Reading> {
        let tables = self.read();
        tables
            .sensors
            .iter()
            .filter(|s| filter(s))
            .filter_map(|s| tables.latest_by_sensor.get(&s.id))
            .filter_map(|id| tables.readings.get(id))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn counts(&self) -> HashMap<EntityKind, usize> {
        let tables = self.read();
        HashMap::from([
            (EntityKind::Location, tables.locations.len()),
            (EntityKind::Sensor, tables.sensors.len()),
            (EntityKind::Reading, tables.readings.len()),
            (EntityKind::Alert, tables.alerts.len()),
        ])
    }

    // ========== WRITES ==========

    /// Validate and commit any entity. Returns the stored copy with its new version.
    pub fn put(&self, entity: Entity) -> CoreResult<Entity> {
        match entity {
            Entity::Location(l) => self.put_location(l).map(Entity::Location),
            Entity::Sensor(s) => self.put_sensor(s).map(Entity::Sensor),
            Entity::Reading(r) => self.append_reading(r).map(Entity::Reading),
            Entity::Alert(a) => self.put_alert(a).map(Entity::Alert),
        }
    }

    pub fn put_location(&self, mut location: Location) -> CoreResult<Location> {
        let mut tables = self.write();

        let name = location.name.to_lowercase();
        if let Some(other) = tables
            .locations
            .iter()
            .find(|l| l.id != location.id && l.name.to_lowercase() == name)
        {
            return Err(CoreError::validation(format!(
                "location name '{}' is already used by location '{}'",
                location.name, other.id
            )));
        }

        location.version = Tables::check_version(
            EntityKind::Location,
            location.id,
            tables.locations.get(&location.id).map(|l| l.version),
            location.version,
        )?;
        tables.locations.upsert(location.id, location.clone());
        Ok(location)
    }

    pub fn put_sensor(&self, mut sensor: Sensor) -> CoreResult<Sensor> {
        sensor.check_thresholds()?;
        let mut tables = self.write();

        if !tables.locations.contains(&sensor.location_id) {
            return Err(CoreError::validation(format!(
                "location '{}' does not exist",
                sensor.location_id
            )));
        }
        if let Some(other) = tables
            .sensors
            .iter()
            .find(|s| s.id != sensor.id && s.device_id == sensor.device_id)
        {
            return Err(CoreError::validation(format!(
                "device_id '{}' is already registered to sensor '{}'",
                sensor.device_id, other.id
            )));
        }
        if let Some(serial) = &sensor.serial_number
            && let Some(other) = tables
                .sensors
                .iter()
                .find(|s| s.id != sensor.id && s.serial_number.as_ref() == Some(serial))
        {
            return Err(CoreError::validation(format!(
                "serial_number '{serial}' is already registered to sensor '{}'",
                other.id
            )));
        }

        sensor.version = Tables::check_version(
            EntityKind::Sensor,
            sensor.id,
            tables.sensors.get(&sensor.id).map(|s| s.version),
            sensor.version,
        )?;
        tables.sensors.upsert(sensor.id, sensor.clone());
        Ok(sensor)
    }

    /// Append a reading. Readings are immutable: re-using an id is rejected.
    pub fn append_reading(&self, reading: Reading) -> CoreResult<Reading> {
        if !reading.value.is_finite() {
            return Err(CoreError::validation("value must be a finite number"));
        }
        let mut tables = self.write();

        if tables.readings.contains(&reading.id) {
            return Err(CoreError::validation(format!(
                "reading '{}' already exists; readings are immutable",
                reading.id
            )));
        }
        if !tables.sensors.contains(&reading.sensor_id) {
            return Err(CoreError::validation(format!(
                "sensor '{}' does not exist",
                reading.sensor_id
            )));
        }

        tables.readings.upsert(reading.id, reading.clone());
        tables.track_reading(&reading);
        Ok(reading)
    }

    pub fn put_alert(&self, mut alert: Alert) -> CoreResult<Alert> {
        let mut tables = self.write();

        let stored = tables.alerts.get(&alert.id);
        match stored {
            Some(current) if current.status == AlertStatus::Resolved => {
                return Err(CoreError::InvalidTransition {
                    from: current.status,
                    to: alert.status,
                });
            }
            // Resolved alerts may outlive their sensor, so only new alerts need a live one.
            None if !tables.sensors.contains(&alert.sensor_id) => {
                return Err(CoreError::validation(format!(
                    "sensor '{}' does not exist",
                    alert.sensor_id
                )));
            }
            _ => {}
        }

        alert.version = Tables::check_version(
            EntityKind::Alert,
            alert.id,
            stored.map(|a| a.version),
            alert.version,
        )?;
        if alert.version == 1 {
            tables
                .alerts_by_sensor
                .entry(alert.sensor_id)
                .or_default()
                .push(alert.id);
        }
        tables.alerts.upsert(alert.id, alert.clone());
        Ok(alert)
    }

    /// Delete a location or sensor.
    ///
    /// Locations are blocked by any sensor referencing them; sensors by any
    /// alert that is not resolved. Deleting a sensor drops its readings and
    /// keeps its resolved alerts for audit. Readings and alerts cannot be deleted.
    pub fn delete(&self, kind: EntityKind, id: Uuid) -> CoreResult<Deleted> {
        let mut tables = self.write();

        match kind {
            EntityKind::Location => {
                if !tables.locations.contains(&id) {
                    return Err(CoreError::not_found(kind, id));
                }
                if let Some(sensor) = tables.sensors.iter().find(|s| s.location_id == id) {
                    return Err(CoreError::ReferentialIntegrity {
                        kind,
                        id,
                        blocked_by: EntityKind::Sensor,
                        blocking_id: sensor.id,
                    });
                }
                tables.locations.remove(&id);
                Ok(Deleted {
                    kind,
                    id,
                    cascaded_readings: 0,
                })
            }
            EntityKind::Sensor => {
                if !tables.sensors.contains(&id) {
                    return Err(CoreError::not_found(kind, id));
                }
                let blocking = tables.alerts_by_sensor.get(&id).and_then(|ids| {
                    ids.iter()
                        .filter_map(|aid| tables.alerts.get(aid))
                        .find(|a| a.is_unresolved())
                        .map(|a| a.id)
                });
                if let Some(blocking_id) = blocking {
                    return Err(CoreError::ReferentialIntegrity {
                        kind,
                        id,
                        blocked_by: EntityKind::Alert,
                        blocking_id,
                    });
                }

                tables.sensors.remove(&id);
                tables.latest_by_sensor.remove(&id);
                let reading_ids = tables.readings_by_sensor.remove(&id).unwrap_or_default();
                for reading_id in &reading_ids {
                    tables.readings.remove(reading_id);
                }
                Ok(Deleted {
                    kind,
                    id,
                    cascaded_readings: reading_ids.len(),
                })
            }
            EntityKind::Reading => Err(CoreError::validation("readings are append-only")),
            EntityKind::Alert => Err(CoreError::validation(
                "alerts are retained for audit and cannot be deleted",
            )),
        }
    }

    /// Load a previously persisted entity as-is, keeping its version.
    ///
    /// Used when hydrating from the database; callers restore locations,
    /// sensors, readings and alerts in that order.
    pub fn restore(&self, entity: Entity) {
        let mut tables = self.write();
        match entity {
            Entity::Location(l) => tables.locations.upsert(l.id, l),
            Entity::Sensor(s) => tables.sensors.upsert(s.id, s),
            Entity::Reading(r) => {
                if !tables.readings.contains(&r.id) {
                    tables.readings.upsert(r.id, r.clone());
                    tables.track_reading(&r);
                }
            }
            Entity::Alert(a) => {
                if !tables.alerts.contains(&a.id) {
                    tables
                        .alerts_by_sensor
                        .entry(a.sensor_id)
                        .or_default()
                        .push(a.id);
                }
                tables.alerts.upsert(a.id, a);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LocationInput, ReadingInput, SensorInput, SensorType};
    use chrono::{Duration, Utc};

    fn store_with_sensor() -> (EntityStore, Location, Sensor) {
        let store = EntityStore::new();
        let now = Utc::now();
        let location = store
            .put_location(LocationInput::named("Lab").into_location(Uuid::new_v4(), now))
            .unwrap();
        let sensor = store
            .put_sensor(
                SensorInput::new("T1", SensorType::Temperature, "dev-1", location.id)
                    .into_sensor(Uuid::new_v4(), now),
            )
            .unwrap();
        (store, location, sensor)
    }

    #[test]
    fn versions_start_at_one_and_reject_stale_writes() {
        let (store, location, _) = store_with_sensor();
        assert_eq!(location.version, 1);

        let renamed = Location {
            name: "Lab A".into(),
            ..location.clone()
        };
        let stored = store.put_location(renamed).unwrap();
        assert_eq!(stored.version, 2);

        // Derived from version 1 again: must not overwrite version 2.
        let err = store.put_location(location).unwrap_err();
        assert!(matches!(err, CoreError::Conflict { expected: 1, actual: 2, .. }));
        assert_eq!(store.location(stored.id).unwrap().name, "Lab A");
    }

    #[test]
    fn location_names_are_unique_case_insensitively() {
        let (store, _, _) = store_with_sensor();
        let dup = LocationInput::named("LAB").into_location(Uuid::new_v4(), Utc::now());
        assert!(matches!(store.put_location(dup), Err(CoreError::Validation(_))));
    }

    #[test]
    fn sensor_requires_existing_location_and_unique_device() {
        let (store, location, _) = store_with_sensor();
        let now = Utc::now();

        let orphan = SensorInput::new("T2", SensorType::Humidity, "dev-2", Uuid::new_v4())
            .into_sensor(Uuid::new_v4(), now);
        assert!(matches!(store.put_sensor(orphan), Err(CoreError::Validation(_))));

        let dup_device = SensorInput::new("T3", SensorType::Humidity, "dev-1", location.id)
            .into_sensor(Uuid::new_v4(), now);
        assert!(matches!(store.put_sensor(dup_device), Err(CoreError::Validation(_))));
    }

    #[test]
    fn serial_numbers_are_unique_when_present() {
        let (store, location, _) = store_with_sensor();
        let now = Utc::now();
        let with_serial = |device: &str, serial: Option<&str>| {
            let mut input = SensorInput::new("T", SensorType::Pressure, device, location.id);
            input.serial_number = serial.map(str::to_string);
            input.into_sensor(Uuid::new_v4(), now)
        };

        store.put_sensor(with_serial("dev-2", Some("SN-1"))).unwrap();
        let err = store.put_sensor(with_serial("dev-3", Some("SN-1"))).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        // Several sensors may leave it unset.
        store.put_sensor(with_serial("dev-4", None)).unwrap();
        store.put_sensor(with_serial("dev-5", None)).unwrap();
    }

    #[test]
    fn location_delete_is_blocked_by_sensor() {
        let (store, location, sensor) = store_with_sensor();
        match store.delete(EntityKind::Location, location.id).unwrap_err() {
            CoreError::ReferentialIntegrity {
                blocked_by,
                blocking_id,
                ..
            } => {
                assert_eq!(blocked_by, EntityKind::Sensor);
                assert_eq!(blocking_id, sensor.id);
            }
            other => panic!("unexpected {other:?}"),
        }

        store.delete(EntityKind::Sensor, sensor.id).unwrap();
        store.delete(EntityKind::Location, location.id).unwrap();
        assert!(store.location(location.id).is_err());
    }

    #[test]
    fn latest_reading_is_last_write_wins_by_timestamp() {
        let (store, _, sensor) = store_with_sensor();
        let now = Utc::now();
        let append = |value: f64, at| {
            store
                .append_reading(ReadingInput::new(sensor.id, value).at(at).into_reading(Uuid::new_v4(), now))
                .unwrap()
        };

        append(1.0, now);
        append(2.0, now - Duration::seconds(30)); // late delivery
        assert_eq!(store.latest_readings(|_| true)[0].value, 1.0);

        append(3.0, now); // same timestamp, inserted later
        assert_eq!(store.latest_readings(|_| true)[0].value, 3.0);

        let history = store.list_readings(Some(sensor.id), |_| true, Page::all());
        assert_eq!(history.total, 3);
        assert_eq!(history.items.last().unwrap().value, 2.0);
    }

    #[test]
    fn sensor_delete_cascades_readings() {
        let (store, _, sensor) = store_with_sensor();
        let now = Utc::now();
        for v in [1.0, 2.0] {
            store
                .append_reading(ReadingInput::new(sensor.id, v).into_reading(Uuid::new_v4(), now))
                .unwrap();
        }

        let deleted = store.delete(EntityKind::Sensor, sensor.id).unwrap();
        assert_eq!(deleted.cascaded_readings, 2);
        assert_eq!(store.list_readings(None, |_| true, Page::all()).total, 0);
        assert!(store.latest_readings(|_| true).is_empty());
    }

    #[test]
    fn paging_reports_total_before_window() {
        let store = EntityStore::new();
        for i in 0..5 {
            store
                .put_location(
                    LocationInput::named(format!("L{i}")).into_location(Uuid::new_v4(), Utc::now()),
                )
                .unwrap();
        }

        let page = store.list_locations(|_| true, Page::new(2, 3));
        assert_eq!(page.total, 5);
        let names: Vec<_> = page.items.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["L3", "L4"]);

        let beyond = store.list_locations(|_| true, Page::new(2, 10));
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total, 5);
    }

    #[test]
    fn readings_and_alerts_cannot_be_deleted() {
        let (store, _, _) = store_with_sensor();
        assert!(matches!(
            store.delete(EntityKind::Alert, Uuid::new_v4()),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            store.delete(EntityKind::Reading, Uuid::new_v4()),
            Err(CoreError::Validation(_))
        ));
    }
}
