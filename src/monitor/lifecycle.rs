//! Alert state machine.
//!
//! ```text
//!  create ──► active ──► acknowledged ──► resolved
//!               │                            ▲
//!               └────────────────────────────┘
//! ```
//!
//! Transitions never move backward and `resolved` is terminal. Every function
//! here returns a new `Alert`; the caller commits it.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::Trigger;
use crate::error::CoreError;
use crate::model::{
    Alert, AlertStatus, AlertType, ManualAlertInput, OperatorContext, Reading, Sensor,
    ThresholdBound,
};

/// Whether `from → to` is a legal transition.
#[must_use]
pub fn can_transition(from: AlertStatus, to: AlertStatus) -> bool {
    matches!(
        (from, to),
        (AlertStatus::Active, AlertStatus::Acknowledged)
            | (AlertStatus::Active, AlertStatus::Resolved)
            | (AlertStatus::Acknowledged, AlertStatus::Resolved)
    )
}

/// Open a threshold alert for a reading that crossed one of the sensor's bounds.
///
/// `triggered_at` is the reading's ingestion time.
#[must_use]
pub fn open_threshold_alert(sensor: &Sensor, reading: &Reading, trigger: &Trigger) -> Alert {
    let unit = sensor.unit.as_deref();
    let actual = with_unit(reading.value, unit);
    let bound = with_unit(trigger.threshold, unit);
    let (title, message) = match trigger.bound {
        ThresholdBound::Max => (
            format!("High {} Alert", sensor.sensor_type),
            format!(
                "Sensor {} reading ({actual}) exceeds threshold ({bound})",
                sensor.name
            ),
        ),
        ThresholdBound::Min => (
            format!("Low {} Alert", sensor.sensor_type),
            format!(
                "Sensor {} reading ({actual}) is below threshold ({bound})",
                sensor.name
            ),
        ),
    };

    Alert {
        id: Uuid::new_v4(),
        sensor_id: sensor.id,
        alert_type: AlertType::ThresholdExceeded,
        severity: trigger.severity,
        status: AlertStatus::Active,
        title,
        message,
        exceeded_bound: Some(trigger.bound),
        threshold_value: Some(trigger.threshold),
        actual_value: Some(reading.value),
        triggered_at: reading.received_at,
        acknowledged_at: None,
        acknowledged_by: None,
        resolved_at: None,
        resolved_by: None,
        version: 0,
    }
}

fn with_unit(value: f64, unit: Option<&str>) -> String {
    match unit {
        Some(u) => format!("{value} {u}"),
        None => value.to_string(),
    }
}

/// Open an operator-authored alert.
#[must_use]
pub fn open_manual_alert(input: ManualAlertInput, now: DateTime<Utc>) -> Alert {
    Alert {
        id: Uuid::new_v4(),
        sensor_id: input.sensor_id,
        alert_type: AlertType::Manual,
        severity: input.severity,
        status: AlertStatus::Active,
        title: input.title,
        message: input.message,
        exceeded_bound: None,
        threshold_value: input.threshold_value,
        actual_value: input.actual_value,
        triggered_at: now,
        acknowledged_at: None,
        acknowledged_by: None,
        resolved_at: None,
        resolved_by: None,
        version: 0,
    }
}

/// Apply `to` to `alert`, stamping the matching timestamp.
///
/// # Errors
///
/// `CoreError::InvalidTransition` for any move not allowed by
/// [`can_transition`], including same-state requests and anything out of
/// `resolved`.
pub fn transition(
    alert: &Alert,
    to: AlertStatus,
    at: DateTime<Utc>,
    ctx: &OperatorContext,
) -> Result<Alert, CoreError> {
    if !can_transition(alert.status, to) {
        return Err(CoreError::InvalidTransition {
            from: alert.status,
            to,
        });
    }

    let mut next = alert.clone();
    if to == AlertStatus::Acknowledged {
        next.acknowledged_at = Some(at);
        next.acknowledged_by = ctx.operator.clone();
    } else {
        next.resolved_at = Some(at);
        next.resolved_by = ctx.operator.clone();
    }
    next.status = to;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AlertSeverity;

    fn manual() -> Alert {
        open_manual_alert(
            ManualAlertInput {
                sensor_id: Uuid::new_v4(),
                title: "Door open".into(),
                message: "Checked by hand".into(),
                severity: AlertSeverity::High,
                threshold_value: None,
                actual_value: None,
            },
            Utc::now(),
        )
    }

    #[test]
    fn acknowledge_then_resolve_sets_each_timestamp_once() {
        let ctx = OperatorContext::named("alice");
        let alert = manual();
        assert_eq!(alert.status, AlertStatus::Active);

        let acked = transition(&alert, AlertStatus::Acknowledged, Utc::now(), &ctx).unwrap();
        assert!(acked.acknowledged_at.is_some());
        assert_eq!(acked.acknowledged_by.as_deref(), Some("alice"));
        assert!(acked.resolved_at.is_none());

        let resolved = transition(&acked, AlertStatus::Resolved, Utc::now(), &ctx).unwrap();
        assert_eq!(resolved.acknowledged_at, acked.acknowledged_at);
        assert!(resolved.resolved_at.is_some());
    }

    #[test]
    fn active_can_resolve_directly() {
        let resolved = transition(
            &manual(),
            AlertStatus::Resolved,
            Utc::now(),
            &OperatorContext::system(),
        )
        .unwrap();
        assert!(resolved.acknowledged_at.is_none());
        assert!(resolved.resolved_at.is_some());
    }

    #[test]
    fn backward_and_repeated_transitions_are_rejected() {
        let ctx = OperatorContext::system();
        let active = manual();
        let acked = transition(&active, AlertStatus::Acknowledged, Utc::now(), &ctx).unwrap();
        let resolved = transition(&acked, AlertStatus::Resolved, Utc::now(), &ctx).unwrap();

        for (alert, to) in [
            (&active, AlertStatus::Active),
            (&acked, AlertStatus::Acknowledged),
            (&acked, AlertStatus::Active),
            (&resolved, AlertStatus::Active),
            (&resolved, AlertStatus::Acknowledged),
            (&resolved, AlertStatus::Resolved),
        ] {
            let err = transition(alert, to, Utc::now(), &ctx).unwrap_err();
            assert!(matches!(err, CoreError::InvalidTransition { .. }), "{alert:?} -> {to}");
        }
    }

    #[test]
    fn transition_follows_the_legal_move_table() {
        let ctx = OperatorContext::system();
        let active = manual();
        let acked = transition(&active, AlertStatus::Acknowledged, Utc::now(), &ctx).unwrap();
        let resolved = transition(&acked, AlertStatus::Resolved, Utc::now(), &ctx).unwrap();

        for alert in [&active, &acked, &resolved] {
            for to in AlertStatus::ALL {
                let moved = transition(alert, to, Utc::now(), &ctx);
                assert_eq!(
                    moved.is_ok(),
                    can_transition(alert.status, to),
                    "{} -> {to}",
                    alert.status
                );
            }
        }
    }
}
