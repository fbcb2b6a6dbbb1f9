use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::model::{Sensor, SensorType};
use crate::query::SensorFilter;

#[derive(Debug, Serialize, ToSchema)]
pub struct SensorListResponse {
    pub sensors: Vec<Sensor>,
    /// Matching sensors before paging
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(deny_unknown_fields)]
pub struct SensorsQuery {
    /// Page size (default from server config, capped at the maximum page size)
    pub limit: Option<usize>,
    /// Number of sensors to skip
    pub offset: Option<usize>,
    /// Filter by sensor type
    pub sensor_type: Option<SensorType>,
    /// Filter by location ID
    pub location_id: Option<Uuid>,
    /// Filter by active flag
    pub is_active: Option<bool>,
}

impl SensorsQuery {
    pub fn filter(&self) -> SensorFilter {
        SensorFilter {
            sensor_type: self.sensor_type,
            location_id: self.location_id,
            is_active: self.is_active,
        }
    }
}
