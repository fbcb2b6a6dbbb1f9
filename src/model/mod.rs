//! Domain entities shared by the store, the monitor and the HTTP layer.
//!
//! The four entity collections reference each other by id only:
//!
//! ```text
//! Location ◄── Sensor.location_id
//! Sensor   ◄── Reading.sensor_id
//! Sensor   ◄── Alert.sensor_id
//! ```

mod alert;
mod location;
mod reading;
mod sensor;

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::error::CoreError;

pub use alert::{Alert, AlertSeverity, AlertStatus, AlertType, ManualAlertInput, ThresholdBound};
pub use location::{Location, LocationInput};
pub use reading::{Reading, ReadingInput};
pub use sensor::{Sensor, SensorInput, SensorType};

/// Discriminant for the four entity collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Location,
    Sensor,
    Reading,
    Alert,
}

impl EntityKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::Sensor => "sensor",
            Self::Reading => "reading",
            Self::Alert => "alert",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any stored entity, used by the kind-generic store and mutation paths.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Location(Location),
    Sensor(Sensor),
    Reading(Reading),
    Alert(Alert),
}

impl Entity {
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Location(_) => EntityKind::Location,
            Self::Sensor(_) => EntityKind::Sensor,
            Self::Reading(_) => EntityKind::Reading,
            Self::Alert(_) => EntityKind::Alert,
        }
    }

    #[must_use]
    pub fn id(&self) -> uuid::Uuid {
        match self {
            Self::Location(l) => l.id,
            Self::Sensor(s) => s.id,
            Self::Reading(r) => r.id,
            Self::Alert(a) => a.id,
        }
    }
}

/// Who is performing a mutation.
///
/// Passed explicitly into every core call; the core never reads session state
/// from anywhere else.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperatorContext {
    pub operator: Option<String>,
}

impl OperatorContext {
    /// Context for mutations issued by the service itself (ingestion, auto-resolve).
    #[must_use]
    pub fn system() -> Self {
        Self { operator: None }
    }

    #[must_use]
    pub fn named(operator: impl Into<String>) -> Self {
        Self {
            operator: Some(operator.into()),
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        self.operator.as_deref().unwrap_or("system")
    }
}

/// Trim a free-text field, mapping blank values to `None`.
pub(crate) fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trim a required field and enforce `1..=max` characters.
pub(crate) fn clean_required(field: &str, value: &str, max: usize) -> Result<String, CoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::validation(format!("{field} must not be empty")));
    }
    check_len(field, trimmed, max)?;
    Ok(trimmed.to_string())
}

pub(crate) fn check_len(field: &str, value: &str, max: usize) -> Result<(), CoreError> {
    if value.chars().count() > max {
        return Err(CoreError::validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

pub(crate) fn check_optional_len(
    field: &str,
    value: Option<&String>,
    max: usize,
) -> Result<(), CoreError> {
    match value {
        Some(v) => check_len(field, v, max),
        None => Ok(()),
    }
}

pub(crate) fn check_finite(field: &str, value: Option<f64>) -> Result<(), CoreError> {
    match value {
        Some(v) if !v.is_finite() => Err(CoreError::validation(format!(
            "{field} must be a finite number"
        ))),
        _ => Ok(()),
    }
}
