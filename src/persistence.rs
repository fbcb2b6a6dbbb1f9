//! Optional durable copy of the entity store.
//!
//! The in-memory store stays authoritative. When a database is configured the
//! store is hydrated from it at startup and every committed mutation is
//! written through afterwards.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Alias, Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, Database, DatabaseConnection, DbErr, EntityTrait, IdenStatic, Insert,
    IntoActiveModel, Iterable, QueryOrder,
};
use sea_orm_migration::MigratorTrait;
use uuid::Uuid;

use crate::entity::{alerts, locations, readings, sensors};
use crate::error::{CoreError, CoreResult};
use crate::model::{Alert, Entity, EntityKind, Location, Reading, Sensor, ThresholdBound};
use crate::store::EntityStore;

#[derive(Clone)]
pub struct Persistence {
    db: DatabaseConnection,
}

/// Row counts loaded by [`Persistence::hydrate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Hydrated {
    pub locations: usize,
    pub sensors: usize,
    pub readings: usize,
    pub alerts: usize,
}

impl Persistence {
    /// Connect and bring the schema up to date.
    pub async fn connect(database_url: &str) -> Result<Self, DbErr> {
        tracing::info!("Connecting to database...");
        let db = Database::connect(database_url).await?;
        tracing::info!("Database connection established");

        tracing::info!("Running migrations...");
        migration::Migrator::up(&db, None).await?;
        tracing::info!("Migrations completed");

        Ok(Self { db })
    }

    /// Load every persisted entity into `store`, parents before children.
    pub async fn hydrate(&self, store: &EntityStore) -> CoreResult<Hydrated> {
        let mut counts = Hydrated::default();

        for row in locations::Entity::find()
            .order_by_asc(locations::Column::CreatedAt)
            .all(&self.db)
            .await?
        {
            store.restore(Entity::Location(Location::from(row)));
            counts.locations += 1;
        }

        for row in sensors::Entity::find()
            .order_by_asc(sensors::Column::CreatedAt)
            .all(&self.db)
            .await?
        {
            store.restore(Entity::Sensor(Sensor::try_from(row)?));
            counts.sensors += 1;
        }

        for row in readings::Entity::find()
            .order_by_asc(readings::Column::ReceivedAt)
            .all(&self.db)
            .await?
        {
            store.restore(Entity::Reading(Reading::from(row)));
            counts.readings += 1;
        }

        for row in alerts::Entity::find()
            .order_by_asc(alerts::Column::TriggeredAt)
            .all(&self.db)
            .await?
        {
            store.restore(Entity::Alert(Alert::try_from(row)?));
            counts.alerts += 1;
        }

        tracing::info!(
            locations = counts.locations,
            sensors = counts.sensors,
            readings = counts.readings,
            alerts = counts.alerts,
            "Store hydrated from database"
        );
        Ok(counts)
    }

    /// Persist a committed entity.
    ///
    /// Every write is an upsert that only replaces a row holding an older
    /// version, so writes that reach the database out of order still leave
    /// the newest copy in place.
    pub async fn save(&self, entity: &Entity) -> Result<(), DbErr> {
        match entity {
            Entity::Location(l) => {
                upsert(
                    locations::Model::from(l).into_active_model().reset_all(),
                    locations::Column::Id,
                    Some(locations::Column::Version),
                )
                .exec_without_returning(&self.db)
                .await?;
            }
            Entity::Sensor(s) => {
                upsert(
                    sensors::Model::from(s).into_active_model().reset_all(),
                    sensors::Column::Id,
                    Some(sensors::Column::Version),
                )
                .exec_without_returning(&self.db)
                .await?;
            }
            Entity::Reading(r) => {
                upsert(
                    readings::Model::from(r).into_active_model().reset_all(),
                    readings::Column::Id,
                    None,
                )
                .exec_without_returning(&self.db)
                .await?;
            }
            Entity::Alert(a) => {
                upsert(
                    alerts::Model::from(a).into_active_model().reset_all(),
                    alerts::Column::Id,
                    Some(alerts::Column::Version),
                )
                .exec_without_returning(&self.db)
                .await?;
            }
        }
        Ok(())
    }

    /// Remove a deleted location or sensor. Readings follow their sensor via
    /// the cascading foreign key.
    pub async fn delete(&self, kind: EntityKind, id: Uuid) -> Result<(), DbErr> {
        match kind {
            EntityKind::Location => {
                locations::Entity::delete_by_id(id).exec(&self.db).await?;
            }
            EntityKind::Sensor => {
                sensors::Entity::delete_by_id(id).exec(&self.db).await?;
            }
            EntityKind::Reading | EntityKind::Alert => {
                return Err(DbErr::Custom(format!("{kind} rows are never deleted")));
            }
        }
        Ok(())
    }
}

/// `INSERT .. ON CONFLICT (key) DO UPDATE` over every other column.
///
/// With a `version` column the update only applies when the incoming row is
/// newer. Without one (immutable rows) a conflicting insert is a no-op.
fn upsert<A>(
    model: A,
    key: <A::Entity as EntityTrait>::Column,
    version: Option<<A::Entity as EntityTrait>::Column>,
) -> Insert<A>
where
    A: ActiveModelTrait,
{
    let mut on_conflict = OnConflict::column(key);
    match version {
        Some(version) => {
            let columns: Vec<_> = <<A::Entity as EntityTrait>::Column as Iterable>::iter()
                .filter(|c| c.as_str() != key.as_str())
                .collect();
            on_conflict.update_columns(columns).action_and_where(
                Expr::col((A::Entity::default(), version))
                    .lt(Expr::col((Alias::new("excluded"), version))),
            );
        }
        None => {
            on_conflict.do_nothing();
        }
    }
    <A::Entity as EntityTrait>::insert(model).on_conflict(on_conflict)
}

fn db_version(version: u64) -> i64 {
    i64::try_from(version).unwrap_or(i64::MAX)
}

fn core_version(version: i64) -> u64 {
    u64::try_from(version).unwrap_or_default()
}

fn utc(at: sea_orm::prelude::DateTimeWithTimeZone) -> DateTime<Utc> {
    at.with_timezone(&Utc)
}

fn corrupt(table: &str, id: Uuid, e: &CoreError) -> CoreError {
    CoreError::Internal(format!("corrupt {table} row '{id}': {e}"))
}

// ========== LOCATIONS ==========

impl From<&Location> for locations::Model {
    fn from(l: &Location) -> Self {
        Self {
            id: l.id,
            name: l.name.clone(),
            description: l.description.clone(),
            latitude: l.latitude,
            longitude: l.longitude,
            altitude: l.altitude,
            building: l.building.clone(),
            floor: l.floor.clone(),
            room: l.room.clone(),
            zone: l.zone.clone(),
            responsible_person: l.responsible_person.clone(),
            phone: l.phone.clone(),
            email: l.email.clone(),
            created_at: l.created_at.into(),
            updated_at: l.updated_at.map(Into::into),
            version: db_version(l.version),
        }
    }
}

impl From<locations::Model> for Location {
    fn from(m: locations::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            description: m.description,
            latitude: m.latitude,
            longitude: m.longitude,
            altitude: m.altitude,
            building: m.building,
            floor: m.floor,
            room: m.room,
            zone: m.zone,
            responsible_person: m.responsible_person,
            phone: m.phone,
            email: m.email,
            created_at: utc(m.created_at),
            updated_at: m.updated_at.map(utc),
            version: core_version(m.version),
        }
    }
}

// ========== SENSORS ==========

impl From<&Sensor> for sensors::Model {
    fn from(s: &Sensor) -> Self {
        Self {
            id: s.id,
            name: s.name.clone(),
            sensor_type: s.sensor_type.as_str().to_string(),
            device_id: s.device_id.clone(),
            location_id: s.location_id,
            is_active: s.is_active,
            model: s.model.clone(),
            manufacturer: s.manufacturer.clone(),
            serial_number: s.serial_number.clone(),
            description: s.description.clone(),
            unit: s.unit.clone(),
            min_value: s.min_value,
            max_value: s.max_value,
            update_interval: i32::try_from(s.update_interval).unwrap_or(i32::MAX),
            alert_threshold_min: s.alert_threshold_min,
            alert_threshold_max: s.alert_threshold_max,
            installation_date: s.installation_date.map(Into::into),
            last_calibration: s.last_calibration.map(Into::into),
            created_at: s.created_at.into(),
            updated_at: s.updated_at.map(Into::into),
            version: db_version(s.version),
        }
    }
}

impl TryFrom<sensors::Model> for Sensor {
    type Error = CoreError;

    fn try_from(m: sensors::Model) -> Result<Self, Self::Error> {
        let sensor_type = m
            .sensor_type
            .parse()
            .map_err(|e| corrupt("sensors", m.id, &e))?;
        let update_interval = u32::try_from(m.update_interval)
            .ok()
            .filter(|i| *i > 0)
            .ok_or_else(|| {
                corrupt(
                    "sensors",
                    m.id,
                    &CoreError::validation(format!("update_interval {}", m.update_interval)),
                )
            })?;
        Ok(Self {
            id: m.id,
            name: m.name,
            sensor_type,
            device_id: m.device_id,
            location_id: m.location_id,
            is_active: m.is_active,
            model: m.model,
            manufacturer: m.manufacturer,
            serial_number: m.serial_number,
            description: m.description,
            unit: m.unit,
            min_value: m.min_value,
            max_value: m.max_value,
            update_interval,
            alert_threshold_min: m.alert_threshold_min,
            alert_threshold_max: m.alert_threshold_max,
            installation_date: m.installation_date.map(utc),
            last_calibration: m.last_calibration.map(utc),
            created_at: utc(m.created_at),
            updated_at: m.updated_at.map(utc),
            version: core_version(m.version),
        })
    }
}

// ========== READINGS ==========

impl From<&Reading> for readings::Model {
    fn from(r: &Reading) -> Self {
        Self {
            id: r.id,
            sensor_id: r.sensor_id,
            value: r.value,
            timestamp: r.timestamp.into(),
            received_at: r.received_at.into(),
            quality_score: r.quality_score,
            is_valid: r.is_valid,
        }
    }
}

impl From<readings::Model> for Reading {
    fn from(m: readings::Model) -> Self {
        Self {
            id: m.id,
            sensor_id: m.sensor_id,
            value: m.value,
            timestamp: utc(m.timestamp),
            received_at: utc(m.received_at),
            quality_score: m.quality_score,
            is_valid: m.is_valid,
        }
    }
}

// ========== ALERTS ==========

impl From<&Alert> for alerts::Model {
    fn from(a: &Alert) -> Self {
        Self {
            id: a.id,
            sensor_id: a.sensor_id,
            alert_type: a.alert_type.as_str().to_string(),
            severity: a.severity.as_str().to_string(),
            status: a.status.as_str().to_string(),
            title: a.title.clone(),
            message: a.message.clone(),
            exceeded_bound: a.exceeded_bound.map(|b| b.as_str().to_string()),
            threshold_value: a.threshold_value,
            actual_value: a.actual_value,
            triggered_at: a.triggered_at.into(),
            acknowledged_at: a.acknowledged_at.map(Into::into),
            acknowledged_by: a.acknowledged_by.clone(),
            resolved_at: a.resolved_at.map(Into::into),
            resolved_by: a.resolved_by.clone(),
            version: db_version(a.version),
        }
    }
}

impl TryFrom<alerts::Model> for Alert {
    type Error = CoreError;

    fn try_from(m: alerts::Model) -> Result<Self, Self::Error> {
        let id = m.id;
        let bad = |e: CoreError| corrupt("alerts", id, &e);
        Ok(Self {
            id,
            sensor_id: m.sensor_id,
            alert_type: m.alert_type.parse().map_err(bad)?,
            severity: m.severity.parse().map_err(bad)?,
            status: m.status.parse().map_err(bad)?,
            title: m.title,
            message: m.message,
            exceeded_bound: m
                .exceeded_bound
                .as_deref()
                .map(str::parse::<ThresholdBound>)
                .transpose()
                .map_err(bad)?,
            threshold_value: m.threshold_value,
            actual_value: m.actual_value,
            triggered_at: utc(m.triggered_at),
            acknowledged_at: m.acknowledged_at.map(utc),
            acknowledged_by: m.acknowledged_by,
            resolved_at: m.resolved_at.map(utc),
            resolved_by: m.resolved_by,
            version: core_version(m.version),
        })
    }
}
