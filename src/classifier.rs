//! Measurement classification
//!
//! This module maps one coerced measurement to classification output:
//! - Per-signal normal/abnormal flags against the medical thresholds
//! - Problem and suggestion lists for real-time client feedback
//! - Severity level from the abnormal-signal count
//! - Deviation magnitudes, computed whether or not a signal is abnormal

use crate::thresholds::MedicalThresholds;
use crate::types::{Classification, Deviations, Measurement, PostureAnalysis, SeverityLevel};

/// Classifier for evaluating a measurement against medical thresholds
pub struct Classifier;

impl Classifier {
    /// Classify one measurement. Pure; no failure modes for well-formed
    /// numeric input.
    pub fn classify(measurement: &Measurement, thresholds: &MedicalThresholds) -> Classification {
        let is_neck_angle_normal = in_range(measurement.neck_angle, thresholds.neck_angle_range);
        let is_forward_head_normal =
            measurement.forward_head_distance <= thresholds.forward_head_max;
        let is_head_tilt_normal = in_range(measurement.head_tilt, thresholds.head_tilt_range);

        // Feedback lists stay parallel and keep a fixed signal order:
        // neck, then forward head, then head tilt.
        let mut problems = Vec::new();
        let mut suggestions = Vec::new();

        if !is_neck_angle_normal {
            problems.push("Neck angle is outside the normal range".to_string());
            suggestions.push("Return your neck to a centered position".to_string());
        }
        if !is_forward_head_normal {
            problems.push("Head is protruding too far forward".to_string());
            suggestions.push("Tuck your chin back".to_string());
        }
        if !is_head_tilt_normal {
            problems.push("Head is tilted to the side".to_string());
            suggestions.push("Align your head upright over your shoulders".to_string());
        }

        let severity_level = severity_for(problems.len());

        let deviations = Deviations {
            neck_angle_deviation: (measurement.neck_angle - thresholds.neck_angle_midpoint())
                .abs(),
            forward_head_deviation: (measurement.forward_head_distance
                - thresholds.forward_head_max)
                .max(0.0),
            head_tilt_deviation: (measurement.head_tilt - thresholds.head_tilt_midpoint()).abs(),
        };

        Classification {
            analysis: PostureAnalysis {
                is_neck_angle_normal,
                is_forward_head_normal,
                is_head_tilt_normal,
                problems,
                suggestions,
                severity_level,
            },
            deviations,
            medical_standards: thresholds.clone(),
        }
    }
}

/// Inclusive range membership
fn in_range(value: f64, (min, max): (f64, f64)) -> bool {
    min <= value && value <= max
}

/// Severity is a function of the abnormal-signal count alone
fn severity_for(problem_count: usize) -> SeverityLevel {
    match problem_count {
        0 => SeverityLevel::Low,
        1 => SeverityLevel::Medium,
        _ => SeverityLevel::High,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn measurement(neck_angle: f64, forward_head_distance: f64, head_tilt: f64) -> Measurement {
        Measurement {
            user_id: 1,
            session_id: "test-session".to_string(),
            device_info: None,
            timestamp: None,
            neck_angle,
            shoulder_slope: 0.0,
            head_forward: 0.0,
            shoulder_height_diff: 0.0,
            score: 75.0,
            cervical_lordosis: 0.0,
            forward_head_distance,
            head_tilt,
            left_shoulder_height_diff: 0.0,
            left_scapular_winging: 0.0,
            right_scapular_winging: 0.0,
            shoulder_forward_movement: 0.0,
            head_rotation: 0.0,
            issues: vec![],
        }
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let thresholds = MedicalThresholds::default();

        for angle in [-30.0, 0.0, 30.0] {
            let result = Classifier::classify(&measurement(angle, 50.0, 0.0), &thresholds);
            assert!(result.analysis.is_neck_angle_normal, "angle {angle}");
        }
        for angle in [-31.0, 31.0] {
            let result = Classifier::classify(&measurement(angle, 50.0, 0.0), &thresholds);
            assert!(!result.analysis.is_neck_angle_normal, "angle {angle}");
        }

        for tilt in [-15.0, 15.0] {
            let result = Classifier::classify(&measurement(0.0, 50.0, tilt), &thresholds);
            assert!(result.analysis.is_head_tilt_normal, "tilt {tilt}");
        }
        for tilt in [-16.0, 16.0] {
            let result = Classifier::classify(&measurement(0.0, 50.0, tilt), &thresholds);
            assert!(!result.analysis.is_head_tilt_normal, "tilt {tilt}");
        }
    }

    #[test]
    fn forward_head_bound_is_at_most() {
        let thresholds = MedicalThresholds::default();

        let at_max = Classifier::classify(&measurement(0.0, 100.0, 0.0), &thresholds);
        assert!(at_max.analysis.is_forward_head_normal);

        let over = Classifier::classify(&measurement(0.0, 100.1, 0.0), &thresholds);
        assert!(!over.analysis.is_forward_head_normal);
    }

    #[test]
    fn forward_head_deviation_never_negative() {
        let thresholds = MedicalThresholds::default();

        let inside = Classifier::classify(&measurement(0.0, 50.0, 0.0), &thresholds);
        assert_eq!(inside.deviations.forward_head_deviation, 0.0);

        let outside = Classifier::classify(&measurement(0.0, 150.0, 0.0), &thresholds);
        assert_eq!(outside.deviations.forward_head_deviation, 50.0);
    }

    #[test]
    fn deviations_computed_even_when_normal() {
        let thresholds = MedicalThresholds::default();
        let result = Classifier::classify(&measurement(20.0, 50.0, -10.0), &thresholds);

        assert!(result.analysis.is_neck_angle_normal);
        assert_eq!(result.deviations.neck_angle_deviation, 20.0);
        assert_eq!(result.deviations.head_tilt_deviation, 10.0);
    }

    #[test]
    fn severity_depends_only_on_abnormal_count() {
        let thresholds = MedicalThresholds::default();

        let none = Classifier::classify(&measurement(0.0, 50.0, 0.0), &thresholds);
        assert_eq!(none.analysis.severity_level, SeverityLevel::Low);

        // Each single-signal failure alone is medium
        for m in [
            measurement(40.0, 50.0, 0.0),
            measurement(0.0, 120.0, 0.0),
            measurement(0.0, 50.0, 20.0),
        ] {
            let result = Classifier::classify(&m, &thresholds);
            assert_eq!(result.analysis.severity_level, SeverityLevel::Medium);
        }

        let two = Classifier::classify(&measurement(40.0, 120.0, 0.0), &thresholds);
        assert_eq!(two.analysis.severity_level, SeverityLevel::High);

        let three = Classifier::classify(&measurement(40.0, 120.0, 20.0), &thresholds);
        assert_eq!(three.analysis.severity_level, SeverityLevel::High);
    }

    #[test]
    fn problem_and_suggestion_lists_stay_parallel_and_ordered() {
        let thresholds = MedicalThresholds::default();

        // Tilt and neck abnormal, forward head normal: neck entry must
        // still come before the tilt entry.
        let result = Classifier::classify(&measurement(40.0, 50.0, 20.0), &thresholds);
        assert_eq!(result.analysis.problems.len(), 2);
        assert_eq!(
            result.analysis.problems.len(),
            result.analysis.suggestions.len()
        );
        assert!(result.analysis.problems[0].contains("Neck angle"));
        assert!(result.analysis.problems[1].contains("tilted"));
        assert!(result.analysis.suggestions[0].contains("neck"));
        assert!(result.analysis.suggestions[1].contains("head"));
    }

    #[test]
    fn end_to_end_reference_scenario() {
        // neck 35°, forward head 120mm, tilt 0°, score 60:
        // neck and forward head abnormal, severity high,
        // deviations 35 / 20 / 0.
        let thresholds = MedicalThresholds::default();
        let mut m = measurement(35.0, 120.0, 0.0);
        m.score = 60.0;

        let result = Classifier::classify(&m, &thresholds);

        assert!(!result.analysis.is_neck_angle_normal);
        assert!(!result.analysis.is_forward_head_normal);
        assert!(result.analysis.is_head_tilt_normal);
        assert_eq!(result.analysis.problems.len(), 2);
        assert_eq!(result.analysis.severity_level, SeverityLevel::High);
        assert_eq!(result.deviations.neck_angle_deviation, 35.0);
        assert_eq!(result.deviations.forward_head_deviation, 20.0);
        assert_eq!(result.deviations.head_tilt_deviation, 0.0);
        assert_eq!(result.medical_standards, thresholds);
    }
}
