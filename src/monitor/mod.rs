//! Alert derivation: the threshold evaluator and the alert state machine.

pub mod lifecycle;
pub mod threshold;

use std::time::Duration;

pub use threshold::{SeverityPolicy, Trigger};

/// Policy knobs for the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct AlertPolicy {
    pub severity: SeverityPolicy,
    /// Repeated triggers for the same sensor and bound inside this window
    /// collapse into the alert already raised.
    pub coalesce_window: Duration,
    /// Resolve a sensor's active threshold alerts once a reading is back in range.
    pub auto_resolve: bool,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            severity: SeverityPolicy::default(),
            coalesce_window: Duration::from_secs(60),
            auto_resolve: false,
        }
    }
}
