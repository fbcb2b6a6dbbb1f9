use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::model::Location;

#[derive(Debug, Serialize, ToSchema)]
pub struct LocationListResponse {
    pub locations: Vec<Location>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(deny_unknown_fields)]
pub struct LocationsQuery {
    /// Page size (default from server config, capped at the maximum page size)
    pub limit: Option<usize>,
    /// Number of locations to skip
    pub offset: Option<usize>,
}
