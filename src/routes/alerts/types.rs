use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::model::{Alert, AlertSeverity, AlertStatus};
use crate::query::AlertFilter;

#[derive(Debug, Serialize, ToSchema)]
pub struct AlertListResponse {
    pub alerts: Vec<Alert>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(deny_unknown_fields)]
pub struct AlertsQuery {
    /// Filter by lifecycle status
    pub status: Option<AlertStatus>,
    /// Filter by sensor ID (unknown IDs return an empty list)
    pub sensor_id: Option<Uuid>,
    /// Filter by severity
    pub severity: Option<AlertSeverity>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl AlertsQuery {
    pub fn filter(&self) -> AlertFilter {
        AlertFilter {
            status: self.status,
            sensor_id: self.sensor_id,
            severity: self.severity,
        }
    }
}

/// Requested lifecycle move. Timestamps are set by the server.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AlertStatusUpdate {
    pub status: AlertStatus,
}
