use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{check_finite, check_optional_len, clean_optional, clean_required};
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SensorType {
    Temperature,
    Humidity,
    Pressure,
    Light,
    Motion,
}

impl SensorType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Pressure => "pressure",
            Self::Light => "light",
            Self::Motion => "motion",
        }
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "temperature" => Ok(Self::Temperature),
            "humidity" => Ok(Self::Humidity),
            "pressure" => Ok(Self::Pressure),
            "light" => Ok(Self::Light),
            "motion" => Ok(Self::Motion),
            other => Err(CoreError::validation(format!(
                "unknown sensor type '{other}'"
            ))),
        }
    }
}

/// Polling interval used when none is given, in seconds
pub const DEFAULT_UPDATE_INTERVAL: u32 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Sensor {
    pub id: Uuid,
    pub name: String,
    pub sensor_type: SensorType,
    /// Physical device identifier, unique across the system
    pub device_id: String,
    pub location_id: Uuid,
    pub is_active: bool,
    pub model: Option<String>,
    pub manufacturer: Option<String>,
    /// Unique across the system when present
    pub serial_number: Option<String>,
    pub description: Option<String>,
    pub unit: Option<String>,
    /// Lower end of the device's measuring range
    pub min_value: Option<f64>,
    /// Upper end of the device's measuring range
    pub max_value: Option<f64>,
    /// Expected seconds between readings
    pub update_interval: u32,
    pub alert_threshold_min: Option<f64>,
    pub alert_threshold_max: Option<f64>,
    pub installation_date: Option<DateTime<Utc>>,
    pub last_calibration: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl Sensor {
    /// Check the threshold invariant: both bounds finite and `min <= max`.
    pub fn check_thresholds(&self) -> Result<(), CoreError> {
        check_range(
            "alert_threshold_min",
            "alert_threshold_max",
            self.alert_threshold_min,
            self.alert_threshold_max,
        )
    }
}

fn check_range(
    min_field: &str,
    max_field: &str,
    min: Option<f64>,
    max: Option<f64>,
) -> Result<(), CoreError> {
    check_finite(min_field, min)?;
    check_finite(max_field, max)?;
    if let (Some(min), Some(max)) = (min, max)
        && min > max
    {
        return Err(CoreError::validation(format!(
            "{min_field} ({min}) must not exceed {max_field} ({max})"
        )));
    }
    Ok(())
}

/// Create/replace payload for a sensor.
///
/// `is_active` defaults to `true` on create and keeps the current value on
/// update when omitted. Every other optional field is replaced as given.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SensorInput {
    pub name: String,
    pub sensor_type: SensorType,
    pub device_id: String,
    pub location_id: Uuid,
    pub model: Option<String>,
    pub manufacturer: Option<String>,
    pub serial_number: Option<String>,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    /// Seconds, at least 1; defaults to 60
    pub update_interval: Option<u32>,
    pub alert_threshold_min: Option<f64>,
    pub alert_threshold_max: Option<f64>,
    pub installation_date: Option<DateTime<Utc>>,
    pub last_calibration: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
    /// Expected current version; a mismatch on update is reported as a conflict
    pub version: Option<u64>,
}

impl SensorInput {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        sensor_type: SensorType,
        device_id: impl Into<String>,
        location_id: Uuid,
    ) -> Self {
        Self {
            name: name.into(),
            sensor_type,
            device_id: device_id.into(),
            location_id,
            model: None,
            manufacturer: None,
            serial_number: None,
            description: None,
            unit: None,
            min_value: None,
            max_value: None,
            update_interval: None,
            alert_threshold_min: None,
            alert_threshold_max: None,
            installation_date: None,
            last_calibration: None,
            is_active: None,
            version: None,
        }
    }

    #[must_use]
    pub fn with_thresholds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.alert_threshold_min = min;
        self.alert_threshold_max = max;
        self
    }

    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    #[must_use]
    pub fn with_serial_number(mut self, serial_number: impl Into<String>) -> Self {
        self.serial_number = Some(serial_number.into());
        self
    }

    pub fn validate(self) -> Result<Self, CoreError> {
        let name = clean_required("name", &self.name, 100)?;
        let device_id = clean_required("device_id", &self.device_id, 100)?;
        let model = clean_optional(self.model);
        let manufacturer = clean_optional(self.manufacturer);
        let serial_number = clean_optional(self.serial_number);
        let description = clean_optional(self.description);
        let unit = clean_optional(self.unit);
        check_optional_len("model", model.as_ref(), 100)?;
        check_optional_len("manufacturer", manufacturer.as_ref(), 100)?;
        check_optional_len("serial_number", serial_number.as_ref(), 100)?;
        check_optional_len("unit", unit.as_ref(), 20)?;
        check_range("min_value", "max_value", self.min_value, self.max_value)?;
        check_range(
            "alert_threshold_min",
            "alert_threshold_max",
            self.alert_threshold_min,
            self.alert_threshold_max,
        )?;
        if self.update_interval == Some(0) {
            return Err(CoreError::validation("update_interval must be at least 1 second"));
        }

        Ok(Self {
            name,
            device_id,
            model,
            manufacturer,
            serial_number,
            description,
            unit,
            ..self
        })
    }

    #[must_use]
    pub fn into_sensor(self, id: Uuid, now: DateTime<Utc>) -> Sensor {
        Sensor {
            id,
            name: self.name,
            sensor_type: self.sensor_type,
            device_id: self.device_id,
            location_id: self.location_id,
            is_active: self.is_active.unwrap_or(true),
            model: self.model,
            manufacturer: self.manufacturer,
            serial_number: self.serial_number,
            description: self.description,
            unit: self.unit,
            min_value: self.min_value,
            max_value: self.max_value,
            update_interval: self.update_interval.unwrap_or(DEFAULT_UPDATE_INTERVAL),
            alert_threshold_min: self.alert_threshold_min,
            alert_threshold_max: self.alert_threshold_max,
            installation_date: self.installation_date,
            last_calibration: self.last_calibration,
            created_at: now,
            updated_at: None,
            version: 0,
        }
    }

    #[must_use]
    pub fn apply_to(self, current: &Sensor, now: DateTime<Utc>) -> Sensor {
        let is_active = self.is_active.unwrap_or(current.is_active);
        Sensor {
            id: current.id,
            is_active,
            created_at: current.created_at,
            updated_at: Some(now),
            version: current.version,
            ..self.into_sensor(current.id, now)
        }
    }
}
