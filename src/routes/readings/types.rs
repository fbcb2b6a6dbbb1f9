use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::engine::Ingestion;
use crate::error::CoreError;
use crate::model::{Alert, Reading};
use crate::query::ReadingFilter;

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadingListResponse {
    pub readings: Vec<Reading>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(deny_unknown_fields)]
pub struct ReadingsQuery {
    /// Filter by sensor ID (unknown IDs return an empty list)
    pub sensor_id: Option<Uuid>,
    /// Earliest sample time, inclusive (RFC 3339)
    pub start: Option<DateTime<Utc>>,
    /// Latest sample time, inclusive (RFC 3339)
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ReadingsQuery {
    pub fn filter(&self) -> Result<ReadingFilter, CoreError> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(CoreError::validation("start must not be after end"));
            }
        }
        Ok(ReadingFilter {
            sensor_id: self.sensor_id,
            start: self.start,
            end: self.end,
        })
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(deny_unknown_fields)]
pub struct LatestQuery {
    /// Comma-separated sensor IDs to restrict the result to
    pub sensor_ids: Option<String>,
}

impl LatestQuery {
    pub fn sensor_ids(&self) -> Result<Option<Vec<Uuid>>, CoreError> {
        let Some(raw) = &self.sensor_ids else {
            return Ok(None);
        };
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<Uuid>()
                    .map_err(|_| CoreError::validation(format!("invalid sensor id '{s}'")))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}

/// Result of ingesting one reading.
#[derive(Debug, Serialize, ToSchema)]
pub struct IngestionResponse {
    pub reading: Reading,
    /// False when the sensor is inactive
    pub evaluated: bool,
    /// Alert raised by this reading
    pub alert: Option<Alert>,
    /// Existing alert that absorbed this reading's trigger
    pub coalesced_into: Option<Uuid>,
    /// Alerts resolved because the reading was back in range
    pub resolved: Vec<Alert>,
}

impl From<Ingestion> for IngestionResponse {
    fn from(i: Ingestion) -> Self {
        Self {
            reading: i.reading,
            evaluated: i.evaluated,
            alert: i.raised,
            coalesced_into: i.coalesced_into,
            resolved: i.resolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sensor_id_list() {
        let id = Uuid::new_v4();
        let query = LatestQuery {
            sensor_ids: Some(format!(" {id}, ,")),
        };
        assert_eq!(query.sensor_ids().unwrap(), Some(vec![id]));
        assert_eq!(LatestQuery::default().sensor_ids().unwrap(), None);

        let bad = LatestQuery {
            sensor_ids: Some("nope".into()),
        };
        assert!(bad.sensor_ids().is_err());
    }
}
