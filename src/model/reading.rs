use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::CoreError;

/// A single sensor sample. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Reading {
    pub id: Uuid,
    pub sensor_id: Uuid,
    pub value: f64,
    /// Sample time reported by the device (may arrive out of order)
    pub timestamp: DateTime<Utc>,
    /// Ingestion time
    pub received_at: DateTime<Utc>,
    /// Device-reported confidence in `0.0..=1.0`
    pub quality_score: f64,
    /// Device flagged the sample as usable
    pub is_valid: bool,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ReadingInput {
    pub sensor_id: Uuid,
    pub value: f64,
    /// Defaults to the ingestion time
    pub timestamp: Option<DateTime<Utc>>,
    /// Defaults to 1.0
    pub quality_score: Option<f64>,
    /// Defaults to true
    pub is_valid: Option<bool>,
}

impl ReadingInput {
    #[must_use]
    pub fn new(sensor_id: Uuid, value: f64) -> Self {
        Self {
            sensor_id,
            value,
            timestamp: None,
            quality_score: None,
            is_valid: None,
        }
    }

    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn validate(self) -> Result<Self, CoreError> {
        if !self.value.is_finite() {
            return Err(CoreError::validation("value must be a finite number"));
        }
        if let Some(q) = self.quality_score
            && !(0.0..=1.0).contains(&q)
        {
            return Err(CoreError::validation(format!(
                "quality_score ({q}) must be between 0 and 1"
            )));
        }
        Ok(self)
    }

    #[must_use]
    pub fn into_reading(self, id: Uuid, received_at: DateTime<Utc>) -> Reading {
        Reading {
            id,
            sensor_id: self.sensor_id,
            value: self.value,
            timestamp: self.timestamp.unwrap_or(received_at),
            received_at,
            quality_score: self.quality_score.unwrap_or(1.0),
            is_valid: self.is_valid.unwrap_or(true),
        }
    }
}
