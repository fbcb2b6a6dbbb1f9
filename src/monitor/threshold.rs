//! Threshold evaluation.
//!
//! Pure functions only: the same reading value against the same sensor
//! configuration always yields the same decision.
//!
//! # Severity bands
//!
//! Severity is derived from how far the value lies beyond the crossed bound,
//! as a fraction of the bound's magnitude:
//!
//! | Overshoot ratio | Severity |
//! |-----------------|----------|
//! | `< medium_ratio` (10%) | low |
//! | `< high_ratio` (30%) | medium |
//! | `<= critical_ratio` (75%) | high |
//! | `> critical_ratio` | critical |
//!
//! Sensor types listed in [`SeverityPolicy::critical_types`] are always critical.
//! A bound of zero has no magnitude, so the absolute distance is used instead.

use crate::model::{AlertSeverity, Sensor, SensorType, ThresholdBound};

#[derive(Debug, Clone, PartialEq)]
pub struct SeverityPolicy {
    pub medium_ratio: f64,
    pub high_ratio: f64,
    pub critical_ratio: f64,
    pub critical_types: Vec<SensorType>,
}

impl Default for SeverityPolicy {
    fn default() -> Self {
        Self {
            medium_ratio: 0.10,
            high_ratio: 0.30,
            critical_ratio: 0.75,
            critical_types: vec![SensorType::Motion, SensorType::Pressure],
        }
    }
}

impl SeverityPolicy {
    #[must_use]
    pub fn classify(&self, overshoot_ratio: f64, sensor_type: SensorType) -> AlertSeverity {
        if self.critical_types.contains(&sensor_type) {
            return AlertSeverity::Critical;
        }
        if overshoot_ratio < self.medium_ratio {
            AlertSeverity::Low
        } else if overshoot_ratio < self.high_ratio {
            AlertSeverity::Medium
        } else if overshoot_ratio <= self.critical_ratio {
            AlertSeverity::High
        } else {
            AlertSeverity::Critical
        }
    }
}

/// A reading fell outside the sensor's configured range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trigger {
    pub bound: ThresholdBound,
    /// Value of the crossed bound
    pub threshold: f64,
    pub severity: AlertSeverity,
    pub overshoot_ratio: f64,
}

/// Evaluate `value` against the sensor's thresholds.
///
/// Returns `None` when the value is inside `[min, max]` or no bound is set on
/// the side it falls. Bounds are exclusive triggers: a value equal to a bound
/// is in range.
#[must_use]
pub fn evaluate(sensor: &Sensor, value: f64, policy: &SeverityPolicy) -> Option<Trigger> {
    let (bound, threshold) = match (sensor.alert_threshold_min, sensor.alert_threshold_max) {
        (Some(min), _) if value < min => (ThresholdBound::Min, min),
        (_, Some(max)) if value > max => (ThresholdBound::Max, max),
        _ => return None,
    };

    let overshoot_ratio = overshoot_ratio(value, threshold);
    Some(Trigger {
        bound,
        threshold,
        severity: policy.classify(overshoot_ratio, sensor.sensor_type),
        overshoot_ratio,
    })
}

fn overshoot_ratio(value: f64, threshold: f64) -> f64 {
    let distance = (value - threshold).abs();
    let magnitude = threshold.abs();
    if magnitude < f64::EPSILON {
        distance
    } else {
        distance / magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SensorInput;
    use chrono::Utc;
    use uuid::Uuid;

    fn sensor(sensor_type: SensorType, min: Option<f64>, max: Option<f64>) -> Sensor {
        SensorInput::new("thermo", sensor_type, "dev", Uuid::new_v4())
            .with_thresholds(min, max)
            .with_unit("°C")
            .into_sensor(Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn in_range_and_unbounded_values_do_not_trigger() {
        let policy = SeverityPolicy::default();
        let s = sensor(SensorType::Temperature, Some(10.0), Some(30.0));
        assert_eq!(evaluate(&s, 20.0, &policy), None);
        assert_eq!(evaluate(&s, 30.0, &policy), None);
        assert_eq!(evaluate(&s, 10.0, &policy), None);

        let unbounded = sensor(SensorType::Temperature, None, None);
        assert_eq!(evaluate(&unbounded, 1e9, &policy), None);

        let max_only = sensor(SensorType::Temperature, None, Some(30.0));
        assert_eq!(evaluate(&max_only, -1e9, &policy), None);
    }

    #[test]
    fn reports_crossed_bound_and_value() {
        let policy = SeverityPolicy::default();
        let s = sensor(SensorType::Temperature, Some(10.0), Some(30.0));

        let high = evaluate(&s, 35.0, &policy).unwrap();
        assert_eq!(high.bound, ThresholdBound::Max);
        assert_eq!(high.threshold, 30.0);
        assert_eq!(high.severity, AlertSeverity::Medium);

        let low = evaluate(&s, 9.5, &policy).unwrap();
        assert_eq!(low.bound, ThresholdBound::Min);
        assert_eq!(low.threshold, 10.0);
        assert_eq!(low.severity, AlertSeverity::Low);
    }

    #[test]
    fn severity_follows_overshoot_bands() {
        let policy = SeverityPolicy::default();
        let s = sensor(SensorType::Humidity, None, Some(100.0));

        assert_eq!(evaluate(&s, 105.0, &policy).unwrap().severity, AlertSeverity::Low);
        assert_eq!(evaluate(&s, 120.0, &policy).unwrap().severity, AlertSeverity::Medium);
        assert_eq!(evaluate(&s, 150.0, &policy).unwrap().severity, AlertSeverity::High);
        assert_eq!(evaluate(&s, 190.0, &policy).unwrap().severity, AlertSeverity::Critical);
    }

    #[test]
    fn critical_sensor_types_are_always_critical() {
        let policy = SeverityPolicy::default();
        let s = sensor(SensorType::Pressure, None, Some(1000.0));
        assert_eq!(evaluate(&s, 1001.0, &policy).unwrap().severity, AlertSeverity::Critical);

        let relaxed = SeverityPolicy {
            critical_types: Vec::new(),
            ..SeverityPolicy::default()
        };
        assert_eq!(evaluate(&s, 1001.0, &relaxed).unwrap().severity, AlertSeverity::Low);
    }

    #[test]
    fn zero_bound_uses_absolute_distance() {
        let policy = SeverityPolicy::default();
        let s = sensor(SensorType::Temperature, Some(0.0), None);
        assert_eq!(evaluate(&s, -0.05, &policy).unwrap().severity, AlertSeverity::Low);
        assert_eq!(evaluate(&s, -2.0, &policy).unwrap().severity, AlertSeverity::Critical);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let policy = SeverityPolicy::default();
        let s = sensor(SensorType::Light, Some(100.0), Some(800.0));
        let first = evaluate(&s, 1200.0, &policy);
        for _ in 0..10 {
            assert_eq!(evaluate(&s, 1200.0, &policy), first);
        }
    }
}
