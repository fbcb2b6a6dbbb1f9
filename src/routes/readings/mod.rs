mod handlers;
mod types;

pub use handlers::{latest_readings, list_readings, submit_reading};
pub use types::{IngestionResponse, LatestQuery, ReadingListResponse, ReadingsQuery};

// Re-export utoipa path structs for OpenAPI documentation
pub use handlers::{__path_latest_readings, __path_list_readings, __path_submit_reading};
