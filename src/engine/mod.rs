//! Consistency layer.
//!
//! Every mutation goes through [`Engine::apply`], which serializes it behind
//! the per-entity lock, commits it to the [`EntityStore`], runs the alert
//! pipeline for readings and then marks dependent cached views stale.
//!
//! ```text
//! Mutation ─► lock (kind, id) ─► store commit ─► evaluate / transition
//!                                     │
//!                                     └─► invalidate views ─► write-through
//! ```
//!
//! Readings are ingested under their sensor's lock so two readings of the
//! same sensor can never race each other into duplicate alerts. A trigger
//! folds into an unresolved alert for the same bound only while that alert is
//! younger than the coalescing window; a sensor that stays out of range past
//! the window raises a fresh alert next to the still-open one.
//!
//! Locks are taken in the order location, sensor, alert, and each is held
//! until the entity's write-through finishes, so database writes for one
//! entity (and a sensor after its location) land in commit order.

pub mod locks;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::model::{
    Alert, AlertStatus, AlertType, Entity, EntityKind, Location, LocationInput, ManualAlertInput,
    OperatorContext, Reading, ReadingInput, Sensor, SensorInput,
};
use crate::monitor::{lifecycle, threshold, AlertPolicy, Trigger};
use crate::persistence::Persistence;
use crate::query::View;
use crate::services::cache::{Dimension, ViewCache};
use crate::store::{Deleted, EntityStore};

use locks::LockRegistry;

/// Tunables for an [`Engine`], usually derived from [`Config`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub policy: AlertPolicy,
    pub cache_ttl: Duration,
    pub cache_max_entries: u64,
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        Self {
            policy: config.alert_policy(),
            cache_ttl: Duration::from_secs(config.cache_ttl_seconds),
            cache_max_entries: config.cache_max_entries,
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
        }
    }
}

/// A write request, dispatched by [`Engine::apply`].
#[derive(Debug, Clone)]
pub enum Mutation {
    CreateLocation(LocationInput),
    UpdateLocation { id: Uuid, input: LocationInput },
    DeleteLocation { id: Uuid },
    CreateSensor(SensorInput),
    UpdateSensor { id: Uuid, input: SensorInput },
    DeleteSensor { id: Uuid },
    SubmitReading(ReadingInput),
    RaiseAlert(ManualAlertInput),
    TransitionAlert { id: Uuid, to: AlertStatus },
}

impl Mutation {
    fn name(&self) -> &'static str {
        match self {
            Self::CreateLocation(_) => "create_location",
            Self::UpdateLocation { .. } => "update_location",
            Self::DeleteLocation { .. } => "delete_location",
            Self::CreateSensor(_) => "create_sensor",
            Self::UpdateSensor { .. } => "update_sensor",
            Self::DeleteSensor { .. } => "delete_sensor",
            Self::SubmitReading(_) => "submit_reading",
            Self::RaiseAlert(_) => "raise_alert",
            Self::TransitionAlert { .. } => "transition_alert",
        }
    }
}

/// What a reading did to the alert set.
#[derive(Debug, Clone, PartialEq)]
pub struct Ingestion {
    pub reading: Reading,
    /// False when the sensor is inactive; the reading is stored but not checked
    pub evaluated: bool,
    pub raised: Option<Alert>,
    /// Existing alert that absorbed this trigger inside the coalescing window
    pub coalesced_into: Option<Uuid>,
    /// Alerts auto-resolved by an in-range reading
    pub resolved: Vec<Alert>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    Location(Location),
    Sensor(Sensor),
    Ingested(Ingestion),
    Alert(Alert),
    Deleted(Deleted),
}

pub(crate) struct Inner {
    pub(crate) store: EntityStore,
    locks: LockRegistry,
    pub(crate) cache: ViewCache<View>,
    pub(crate) settings: EngineSettings,
    persistence: Option<Persistence>,
}

#[derive(Clone)]
pub struct Engine {
    pub(crate) inner: Arc<Inner>,
}

impl Engine {
    /// Engine over an empty store with no persistence.
    #[must_use]
    pub fn in_memory(settings: EngineSettings) -> Self {
        Self::new(settings, EntityStore::new(), None)
    }

    #[must_use]
    pub fn new(settings: EngineSettings, store: EntityStore, persistence: Option<Persistence>) -> Self {
        let cache = ViewCache::new(settings.cache_max_entries, settings.cache_ttl);
        Self {
            inner: Arc::new(Inner {
                store,
                locks: LockRegistry::new(),
                cache,
                settings,
                persistence,
            }),
        }
    }

    #[must_use]
    pub fn store(&self) -> &EntityStore {
        &self.inner.store
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.inner.settings
    }

    /// Run one mutation to completion.
    ///
    /// The work is spawned onto the runtime, so dropping the returned future
    /// abandons only the wait: once started, the mutation still commits.
    pub async fn apply(&self, ctx: OperatorContext, mutation: Mutation) -> CoreResult<MutationOutcome> {
        let engine = self.clone();
        let name = mutation.name();
        tokio::spawn(async move { engine.run(&ctx, mutation).await })
            .await
            .map_err(|e| CoreError::Internal(format!("{name} task failed: {e}")))?
    }

    async fn run(&self, ctx: &OperatorContext, mutation: Mutation) -> CoreResult<MutationOutcome> {
        let name = mutation.name();
        let result = match mutation {
            Mutation::CreateLocation(input) => self.do_create_location(input).await,
            Mutation::UpdateLocation { id, input } => self.do_update_location(id, input).await,
            Mutation::DeleteLocation { id } => self.do_delete(EntityKind::Location, id).await,
            Mutation::CreateSensor(input) => self.do_create_sensor(input).await,
            Mutation::UpdateSensor { id, input } => self.do_update_sensor(id, input).await,
            Mutation::DeleteSensor { id } => self.do_delete(EntityKind::Sensor, id).await,
            Mutation::SubmitReading(input) => self.do_submit_reading(input).await,
            Mutation::RaiseAlert(input) => self.do_raise_alert(input).await,
            Mutation::TransitionAlert { id, to } => self.do_transition_alert(ctx, id, to).await,
        };

        if let Err(e) = &result {
            tracing::debug!(mutation = name, operator = ctx.label(), error = %e, "Mutation rejected");
        }
        result
    }

    /// Read-modify-write one entity under its lock.
    ///
    /// `update` receives the committed entity and returns its replacement,
    /// which must keep the same kind and id. The store's version check turns
    /// a replacement derived from a stale copy into `Conflict`.
    pub async fn mutate<F>(&self, kind: EntityKind, id: Uuid, update: F) -> CoreResult<Entity>
    where
        F: FnOnce(Entity) -> CoreResult<Entity>,
    {
        let _guard = self.inner.locks.acquire(kind, id).await;
        self.mutate_locked(kind, id, update).await
    }

    async fn mutate_locked<F>(&self, kind: EntityKind, id: Uuid, update: F) -> CoreResult<Entity>
    where
        F: FnOnce(Entity) -> CoreResult<Entity>,
    {
        let current = self.inner.store.get(kind, id)?;
        let next = update(current)?;
        if next.kind() != kind || next.id() != id {
            return Err(CoreError::Internal(format!(
                "update of {kind} '{id}' produced {} '{}'",
                next.kind(),
                next.id()
            )));
        }

        let stored = self.inner.store.put(next)?;
        self.committed(&[dimension(kind)]);
        self.write_through(&stored).await;
        Ok(stored)
    }

    async fn create(&self, entity: Entity) -> CoreResult<Entity> {
        let kind = entity.kind();
        let _guard = self.inner.locks.acquire(kind, entity.id()).await;
        let stored = self.inner.store.put(entity)?;
        self.committed(&[dimension(kind)]);
        self.write_through(&stored).await;
        Ok(stored)
    }

    // ========== MUTATIONS ==========

    async fn do_create_location(&self, input: LocationInput) -> CoreResult<MutationOutcome> {
        let location = input.validate()?.into_location(Uuid::new_v4(), Utc::now());
        let Entity::Location(stored) = self.create(Entity::Location(location)).await? else {
            return Err(unexpected(EntityKind::Location));
        };
        tracing::info!(location_id = %stored.id, name = %stored.name, "Location created");
        Ok(MutationOutcome::Location(stored))
    }

    async fn do_update_location(&self, id: Uuid, input: LocationInput) -> CoreResult<MutationOutcome> {
        let input = input.validate()?;
        let entity = self
            .mutate(EntityKind::Location, id, |current| match current {
                Entity::Location(current) => {
                    let expected = input.version.unwrap_or(current.version);
                    let mut next = input.apply_to(&current, Utc::now());
                    next.version = expected;
                    Ok(Entity::Location(next))
                }
                _ => Err(unexpected(EntityKind::Location)),
            })
            .await?;
        let Entity::Location(stored) = entity else {
            return Err(unexpected(EntityKind::Location));
        };
        tracing::info!(location_id = %id, version = stored.version, "Location updated");
        Ok(MutationOutcome::Location(stored))
    }

    async fn do_create_sensor(&self, input: SensorInput) -> CoreResult<MutationOutcome> {
        let sensor = input.validate()?.into_sensor(Uuid::new_v4(), Utc::now());
        let _location = self
            .inner
            .locks
            .acquire(EntityKind::Location, sensor.location_id)
            .await;
        let Entity::Sensor(stored) = self.create(Entity::Sensor(sensor)).await? else {
            return Err(unexpected(EntityKind::Sensor));
        };
        tracing::info!(
            sensor_id = %stored.id,
            device_id = %stored.device_id,
            location_id = %stored.location_id,
            "Sensor created"
        );
        Ok(MutationOutcome::Sensor(stored))
    }

    async fn do_update_sensor(&self, id: Uuid, input: SensorInput) -> CoreResult<MutationOutcome> {
        let input = input.validate()?;
        let _location = self
            .inner
            .locks
            .acquire(EntityKind::Location, input.location_id)
            .await;
        let entity = self
            .mutate(EntityKind::Sensor, id, |current| match current {
                Entity::Sensor(current) => {
                    let expected = input.version.unwrap_or(current.version);
                    let mut next = input.apply_to(&current, Utc::now());
                    next.version = expected;
                    Ok(Entity::Sensor(next))
                }
                _ => Err(unexpected(EntityKind::Sensor)),
            })
            .await?;
        let Entity::Sensor(stored) = entity else {
            return Err(unexpected(EntityKind::Sensor));
        };
        tracing::info!(sensor_id = %id, version = stored.version, "Sensor updated");
        Ok(MutationOutcome::Sensor(stored))
    }

    async fn do_delete(&self, kind: EntityKind, id: Uuid) -> CoreResult<MutationOutcome> {
        let _guard = self.inner.locks.acquire(kind, id).await;
        let deleted = self.inner.store.delete(kind, id)?;

        match kind {
            EntityKind::Sensor => self.committed(&[Dimension::Sensors, Dimension::Readings]),
            _ => self.committed(&[dimension(kind)]),
        }
        if let Some(db) = &self.inner.persistence {
            if let Err(e) = db.delete(kind, id).await {
                tracing::error!(error = %e, kind = %kind, id = %id, "Write-through delete failed");
            }
        }

        tracing::info!(
            kind = %kind,
            id = %id,
            cascaded_readings = deleted.cascaded_readings,
            "Entity deleted"
        );
        Ok(MutationOutcome::Deleted(deleted))
    }

    async fn do_submit_reading(&self, input: ReadingInput) -> CoreResult<MutationOutcome> {
        let input = input.validate()?;
        let sensor_id = input.sensor_id;
        let _guard = self.inner.locks.acquire(EntityKind::Sensor, sensor_id).await;

        let sensor = self.inner.store.sensor(sensor_id)?;
        let reading = self
            .inner
            .store
            .append_reading(input.into_reading(Uuid::new_v4(), Utc::now()))?;
        self.committed(&[Dimension::Readings]);
        self.write_through(&Entity::Reading(reading.clone())).await;

        let mut ingestion = Ingestion {
            reading,
            evaluated: sensor.is_active,
            raised: None,
            coalesced_into: None,
            resolved: Vec::new(),
        };

        if sensor.is_active {
            let policy = &self.inner.settings.policy;
            match threshold::evaluate(&sensor, ingestion.reading.value, &policy.severity) {
                Some(trigger) => self.raise_or_coalesce(&sensor, &trigger, &mut ingestion).await?,
                None if policy.auto_resolve => self.auto_resolve(&sensor, &mut ingestion).await,
                None => {}
            }
        }

        tracing::debug!(
            sensor_id = %sensor_id,
            reading_id = %ingestion.reading.id,
            value = ingestion.reading.value,
            evaluated = ingestion.evaluated,
            "Reading ingested"
        );
        Ok(MutationOutcome::Ingested(ingestion))
    }

    /// Caller holds the sensor lock; the new alert's lock is taken beneath it.
    async fn raise_or_coalesce(
        &self,
        sensor: &Sensor,
        trigger: &Trigger,
        ingestion: &mut Ingestion,
    ) -> CoreResult<()> {
        let at = ingestion.reading.received_at;
        if let Some(existing) = self.coalescing_candidate(sensor.id, trigger, at) {
            tracing::debug!(
                sensor_id = %sensor.id,
                alert_id = %existing.id,
                bound = %trigger.bound.as_str(),
                "Trigger coalesced into existing alert"
            );
            ingestion.coalesced_into = Some(existing.id);
            return Ok(());
        }

        let alert = lifecycle::open_threshold_alert(sensor, &ingestion.reading, trigger);
        let _alert_guard = self.inner.locks.acquire(EntityKind::Alert, alert.id).await;
        let stored = self.inner.store.put_alert(alert)?;
        self.committed(&[Dimension::Alerts]);
        self.write_through(&Entity::Alert(stored.clone())).await;

        tracing::info!(
            sensor_id = %sensor.id,
            alert_id = %stored.id,
            severity = %stored.severity,
            bound = %trigger.bound.as_str(),
            actual = ingestion.reading.value,
            threshold = trigger.threshold,
            "Alert raised"
        );
        ingestion.raised = Some(stored);
        Ok(())
    }

    fn coalescing_candidate(&self, sensor_id: Uuid, trigger: &Trigger, at: DateTime<Utc>) -> Option<Alert> {
        let window_ms =
            i64::try_from(self.inner.settings.policy.coalesce_window.as_millis()).unwrap_or(i64::MAX);
        self.inner
            .store
            .alerts_for_sensor(sensor_id)
            .into_iter()
            .filter(|a| a.alert_type == AlertType::ThresholdExceeded)
            .filter(|a| a.is_unresolved() && a.exceeded_bound == Some(trigger.bound))
            .filter(|a| at.signed_duration_since(a.triggered_at).num_milliseconds() <= window_ms)
            .max_by_key(|a| a.triggered_at)
    }

    /// Caller holds the sensor lock. Failures are logged and skipped: the
    /// reading itself is already committed.
    async fn auto_resolve(&self, sensor: &Sensor, ingestion: &mut Ingestion) {
        let at = ingestion.reading.received_at;
        let candidates = self
            .inner
            .store
            .alerts_for_sensor(sensor.id)
            .into_iter()
            .filter(|a| a.alert_type == AlertType::ThresholdExceeded && a.status == AlertStatus::Active);

        for alert in candidates {
            let _alert_guard = self.inner.locks.acquire(EntityKind::Alert, alert.id).await;
            let resolved = self.inner.store.alert(alert.id).and_then(|current| {
                let next = lifecycle::transition(&current, AlertStatus::Resolved, at, &OperatorContext::system())?;
                self.inner.store.put_alert(next)
            });
            match resolved {
                Ok(stored) => {
                    self.committed(&[Dimension::Alerts]);
                    self.write_through(&Entity::Alert(stored.clone())).await;
                    tracing::info!(sensor_id = %sensor.id, alert_id = %stored.id, "Alert auto-resolved");
                    ingestion.resolved.push(stored);
                }
                Err(e) => {
                    tracing::debug!(alert_id = %alert.id, error = %e, "Auto-resolve skipped");
                }
            }
        }
    }

    async fn do_raise_alert(&self, input: ManualAlertInput) -> CoreResult<MutationOutcome> {
        let alert = lifecycle::open_manual_alert(input.validate()?, Utc::now());
        let Entity::Alert(stored) = self.create(Entity::Alert(alert)).await? else {
            return Err(unexpected(EntityKind::Alert));
        };
        tracing::info!(
            sensor_id = %stored.sensor_id,
            alert_id = %stored.id,
            severity = %stored.severity,
            "Manual alert raised"
        );
        Ok(MutationOutcome::Alert(stored))
    }

    async fn do_transition_alert(
        &self,
        ctx: &OperatorContext,
        id: Uuid,
        to: AlertStatus,
    ) -> CoreResult<MutationOutcome> {
        let entity = self
            .mutate(EntityKind::Alert, id, |current| match current {
                Entity::Alert(current) => {
                    lifecycle::transition(&current, to, Utc::now(), ctx).map(Entity::Alert)
                }
                _ => Err(unexpected(EntityKind::Alert)),
            })
            .await?;
        let Entity::Alert(stored) = entity else {
            return Err(unexpected(EntityKind::Alert));
        };
        tracing::info!(alert_id = %id, status = %stored.status, operator = ctx.label(), "Alert transitioned");
        Ok(MutationOutcome::Alert(stored))
    }

    // ========== TYPED ENTRY POINTS ==========

    pub async fn create_location(&self, ctx: &OperatorContext, input: LocationInput) -> CoreResult<Location> {
        match self.apply(ctx.clone(), Mutation::CreateLocation(input)).await? {
            MutationOutcome::Location(l) => Ok(l),
            _ => Err(unexpected(EntityKind::Location)),
        }
    }

    pub async fn update_location(
        &self,
        ctx: &OperatorContext,
        id: Uuid,
        input: LocationInput,
    ) -> CoreResult<Location> {
        match self.apply(ctx.clone(), Mutation::UpdateLocation { id, input }).await? {
            MutationOutcome::Location(l) => Ok(l),
            _ => Err(unexpected(EntityKind::Location)),
        }
    }

    pub async fn delete_location(&self, ctx: &OperatorContext, id: Uuid) -> CoreResult<Deleted> {
        match self.apply(ctx.clone(), Mutation::DeleteLocation { id }).await? {
            MutationOutcome::Deleted(d) => Ok(d),
            _ => Err(unexpected(EntityKind::Location)),
        }
    }

    pub async fn create_sensor(&self, ctx: &OperatorContext, input: SensorInput) -> CoreResult<Sensor> {
        match self.apply(ctx.clone(), Mutation::CreateSensor(input)).await? {
            MutationOutcome::Sensor(s) => Ok(s),
            _ => Err(unexpected(EntityKind::Sensor)),
        }
    }

    pub async fn update_sensor(
        &self,
        ctx: &OperatorContext,
        id: Uuid,
        input: SensorInput,
    ) -> CoreResult<Sensor> {
        match self.apply(ctx.clone(), Mutation::UpdateSensor { id, input }).await? {
            MutationOutcome::Sensor(s) => Ok(s),
            _ => Err(unexpected(EntityKind::Sensor)),
        }
    }

    pub async fn delete_sensor(&self, ctx: &OperatorContext, id: Uuid) -> CoreResult<Deleted> {
        match self.apply(ctx.clone(), Mutation::DeleteSensor { id }).await? {
            MutationOutcome::Deleted(d) => Ok(d),
            _ => Err(unexpected(EntityKind::Sensor)),
        }
    }

    /// Ingest one reading and run the alert pipeline for its sensor.
    ///
    /// # Errors
    ///
    /// `NotFound` if the sensor does not exist, `Validation` for a non-finite value.
    pub async fn submit_reading(&self, ctx: &OperatorContext, input: ReadingInput) -> CoreResult<Ingestion> {
        match self.apply(ctx.clone(), Mutation::SubmitReading(input)).await? {
            MutationOutcome::Ingested(i) => Ok(i),
            _ => Err(unexpected(EntityKind::Reading)),
        }
    }

    pub async fn raise_alert(&self, ctx: &OperatorContext, input: ManualAlertInput) -> CoreResult<Alert> {
        match self.apply(ctx.clone(), Mutation::RaiseAlert(input)).await? {
            MutationOutcome::Alert(a) => Ok(a),
            _ => Err(unexpected(EntityKind::Alert)),
        }
    }

    pub async fn transition_alert(
        &self,
        ctx: &OperatorContext,
        id: Uuid,
        to: AlertStatus,
    ) -> CoreResult<Alert> {
        match self.apply(ctx.clone(), Mutation::TransitionAlert { id, to }).await? {
            MutationOutcome::Alert(a) => Ok(a),
            _ => Err(unexpected(EntityKind::Alert)),
        }
    }

    // ========== HOUSEKEEPING ==========

    /// Mark views over `dims` stale. Always after the store commit.
    fn committed(&self, dims: &[Dimension]) {
        self.inner.cache.invalidate(dims);
    }

    async fn write_through(&self, entity: &Entity) {
        let Some(db) = &self.inner.persistence else {
            return;
        };
        if let Err(e) = db.save(entity).await {
            tracing::error!(
                error = %e,
                kind = %entity.kind(),
                id = %entity.id(),
                "Write-through failed"
            );
        }
    }
}

fn dimension(kind: EntityKind) -> Dimension {
    match kind {
        EntityKind::Location => Dimension::Locations,
        EntityKind::Sensor => Dimension::Sensors,
        EntityKind::Reading => Dimension::Readings,
        EntityKind::Alert => Dimension::Alerts,
    }
}

fn unexpected(kind: EntityKind) -> CoreError {
    CoreError::Internal(format!("unexpected entity variant for {kind}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AlertSeverity, SensorType, ThresholdBound};

    async fn sensor(engine: &Engine, min: Option<f64>, max: Option<f64>) -> Sensor {
        let ctx = OperatorContext::system();
        let location = engine
            .create_location(&ctx, LocationInput::named(format!("Lab {}", Uuid::new_v4())))
            .await
            .unwrap();
        engine
            .create_sensor(
                &ctx,
                SensorInput::new("Thermo", SensorType::Temperature, Uuid::new_v4().to_string(), location.id)
                    .with_thresholds(min, max),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn mutate_rejects_identity_change() {
        let engine = Engine::in_memory(EngineSettings::default());
        let s = sensor(&engine, None, None).await;

        let err = engine
            .mutate(EntityKind::Sensor, s.id, |e| match e {
                Entity::Sensor(mut s) => {
                    s.id = Uuid::new_v4();
                    Ok(Entity::Sensor(s))
                }
                other => Ok(other),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Internal(_)));
        assert_eq!(engine.store().sensor(s.id).unwrap().version, 1);
    }

    #[tokio::test]
    async fn mutate_missing_entity_is_not_found() {
        let engine = Engine::in_memory(EngineSettings::default());
        let err = engine
            .mutate(EntityKind::Alert, Uuid::new_v4(), Ok)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { kind: EntityKind::Alert, .. }));
    }

    #[tokio::test]
    async fn stale_update_version_is_a_conflict() {
        let engine = Engine::in_memory(EngineSettings::default());
        let ctx = OperatorContext::named("ops");
        let s = sensor(&engine, Some(0.0), Some(10.0)).await;

        let mut input = SensorInput::new("Renamed", s.sensor_type, s.device_id.clone(), s.location_id);
        input.version = Some(s.version);
        let updated = engine.update_sensor(&ctx, s.id, input.clone()).await.unwrap();
        assert_eq!(updated.version, 2);

        // Same expected version again: someone else already moved it on.
        let err = engine.update_sensor(&ctx, s.id, input).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict { expected: 1, actual: 2, .. }));
    }

    #[tokio::test]
    async fn inactive_sensor_reading_is_stored_not_evaluated() {
        let engine = Engine::in_memory(EngineSettings::default());
        let ctx = OperatorContext::system();
        let s = sensor(&engine, None, Some(30.0)).await;

        let mut input = SensorInput::new(s.name.clone(), s.sensor_type, s.device_id.clone(), s.location_id)
            .with_thresholds(None, Some(30.0));
        input.is_active = Some(false);
        engine.update_sensor(&ctx, s.id, input).await.unwrap();

        let ingestion = engine.submit_reading(&ctx, ReadingInput::new(s.id, 99.0)).await.unwrap();
        assert!(!ingestion.evaluated);
        assert!(ingestion.raised.is_none());
        assert!(engine.store().reading(ingestion.reading.id).is_ok());
        assert!(engine.store().alerts_for_sensor(s.id).is_empty());
    }

    #[tokio::test]
    async fn opposite_bounds_do_not_coalesce() {
        let engine = Engine::in_memory(EngineSettings::default());
        let ctx = OperatorContext::system();
        let s = sensor(&engine, Some(10.0), Some(30.0)).await;

        let high = engine.submit_reading(&ctx, ReadingInput::new(s.id, 40.0)).await.unwrap();
        let low = engine.submit_reading(&ctx, ReadingInput::new(s.id, 1.0)).await.unwrap();

        assert_eq!(high.raised.unwrap().exceeded_bound, Some(ThresholdBound::Max));
        assert_eq!(low.raised.unwrap().exceeded_bound, Some(ThresholdBound::Min));
        assert_eq!(engine.store().alerts_for_sensor(s.id).len(), 2);
    }

    #[tokio::test]
    async fn zero_window_raises_every_trigger() {
        let mut settings = EngineSettings::default();
        settings.policy.coalesce_window = Duration::ZERO;
        let engine = Engine::in_memory(settings);
        let ctx = OperatorContext::system();
        let s = sensor(&engine, None, Some(30.0)).await;

        engine.submit_reading(&ctx, ReadingInput::new(s.id, 31.0)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        engine.submit_reading(&ctx, ReadingInput::new(s.id, 32.0)).await.unwrap();

        assert_eq!(engine.store().alerts_for_sensor(s.id).len(), 2);
    }

    #[tokio::test]
    async fn auto_resolve_closes_only_active_threshold_alerts() {
        let mut settings = EngineSettings::default();
        settings.policy.auto_resolve = true;
        let engine = Engine::in_memory(settings);
        let ctx = OperatorContext::named("ops");
        let s = sensor(&engine, None, Some(30.0)).await;

        let raised = engine
            .submit_reading(&ctx, ReadingInput::new(s.id, 35.0))
            .await
            .unwrap()
            .raised
            .unwrap();
        let manual = engine
            .raise_alert(
                &ctx,
                ManualAlertInput {
                    sensor_id: s.id,
                    title: "Door open".into(),
                    message: "Checked by hand".into(),
                    severity: AlertSeverity::Low,
                    threshold_value: None,
                    actual_value: None,
                },
            )
            .await
            .unwrap();

        let back = engine.submit_reading(&ctx, ReadingInput::new(s.id, 20.0)).await.unwrap();
        assert_eq!(back.resolved.len(), 1);
        assert_eq!(back.resolved[0].id, raised.id);
        assert!(back.resolved[0].resolved_by.is_none());

        assert_eq!(engine.store().alert(raised.id).unwrap().status, AlertStatus::Resolved);
        assert_eq!(engine.store().alert(manual.id).unwrap().status, AlertStatus::Active);
    }

    #[tokio::test]
    async fn reading_for_unknown_sensor_is_not_found() {
        let engine = Engine::in_memory(EngineSettings::default());
        let err = engine
            .submit_reading(&OperatorContext::system(), ReadingInput::new(Uuid::new_v4(), 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { kind: EntityKind::Sensor, .. }));
    }

    #[tokio::test]
    async fn trigger_past_the_window_opens_a_second_alert() {
        let mut settings = EngineSettings::default();
        settings.policy.coalesce_window = Duration::from_millis(50);
        let engine = Engine::in_memory(settings);
        let ctx = OperatorContext::system();
        let s = sensor(&engine, None, Some(30.0)).await;

        let first = engine.submit_reading(&ctx, ReadingInput::new(s.id, 31.0)).await.unwrap();
        let first = first.raised.unwrap();
        let folded = engine.submit_reading(&ctx, ReadingInput::new(s.id, 32.0)).await.unwrap();
        assert_eq!(folded.coalesced_into, Some(first.id));

        tokio::time::sleep(Duration::from_millis(80)).await;
        let later = engine.submit_reading(&ctx, ReadingInput::new(s.id, 33.0)).await.unwrap();
        let second = later.raised.unwrap();
        assert_ne!(second.id, first.id);

        // The first alert stays open next to the new one.
        assert_eq!(engine.store().alert(first.id).unwrap().status, AlertStatus::Active);
        assert_eq!(engine.store().alerts_for_sensor(s.id).len(), 2);
    }

    #[tokio::test]
    async fn reading_views_are_invalidated_before_the_alert_pipeline() {
        let mut settings = EngineSettings::default();
        settings.policy.auto_resolve = true;
        let engine = Engine::in_memory(settings);
        let ctx = OperatorContext::system();
        let s = sensor(&engine, None, Some(30.0)).await;
        let alert = engine
            .submit_reading(&ctx, ReadingInput::new(s.id, 35.0))
            .await
            .unwrap()
            .raised
            .unwrap();

        let before = engine.inner.cache.generation(Dimension::Readings);
        let held = engine.inner.locks.acquire(EntityKind::Alert, alert.id).await;
        let pending = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .submit_reading(&OperatorContext::system(), ReadingInput::new(s.id, 20.0))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!pending.is_finished());
        assert!(engine.inner.cache.generation(Dimension::Readings) > before);
        assert_eq!(engine.store().counts()[&EntityKind::Reading], 2);

        drop(held);
        let ingestion = pending.await.unwrap().unwrap();
        assert_eq!(ingestion.resolved.len(), 1);
    }

    #[tokio::test]
    async fn sensor_create_waits_for_its_location() {
        let engine = Engine::in_memory(EngineSettings::default());
        let location = engine
            .create_location(&OperatorContext::system(), LocationInput::named("Annex"))
            .await
            .unwrap();

        let held = engine.inner.locks.acquire(EntityKind::Location, location.id).await;
        let pending = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .create_sensor(
                        &OperatorContext::system(),
                        SensorInput::new("Thermo", SensorType::Temperature, "annex-1", location.id),
                    )
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!pending.is_finished());
        assert_eq!(engine.store().counts()[&EntityKind::Sensor], 0);

        drop(held);
        let created = pending.await.unwrap().unwrap();
        assert_eq!(created.location_id, location.id);
    }
}
