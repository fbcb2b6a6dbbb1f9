use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Alerts keep a plain `sensor_id`: resolved alerts are retained after their
/// sensor is deleted.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "alerts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub sensor_id: Uuid,
    pub alert_type: String,
    pub severity: String,
    pub status: String,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub message: String,
    pub exceeded_bound: Option<String>,
    pub threshold_value: Option<f64>,
    pub actual_value: Option<f64>,
    pub triggered_at: DateTimeWithTimeZone,
    pub acknowledged_at: Option<DateTimeWithTimeZone>,
    pub acknowledged_by: Option<String>,
    pub resolved_at: Option<DateTimeWithTimeZone>,
    pub resolved_by: Option<String>,
    pub version: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
