mod handlers;
mod types;

pub use handlers::{alert_summary, create_alert, get_alert, list_alerts, update_alert};
pub use types::{AlertListResponse, AlertStatusUpdate, AlertsQuery};

// Re-export utoipa path structs for OpenAPI documentation
pub use handlers::{
    __path_alert_summary, __path_create_alert, __path_get_alert, __path_list_alerts,
    __path_update_alert,
};
