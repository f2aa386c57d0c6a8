//! Medical normal-range thresholds
//!
//! The fixed clinical bounds every measurement is judged against. Values
//! mirror published ergonomic norms: craniovertebral angle within ±30°,
//! forward head protrusion at most 100 mm, lateral head tilt within ±15°.

use serde::{Deserialize, Serialize};

/// Normal-range bounds for the three classified signals.
///
/// Immutable configuration; `Default` carries the medical constants used
/// in production. Ranges are inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalThresholds {
    /// Neck angle normal range (degrees), inclusive
    pub neck_angle_range: (f64, f64),
    /// Maximum normal forward head distance (millimeters)
    pub forward_head_max: f64,
    /// Head tilt normal range (degrees), inclusive
    pub head_tilt_range: (f64, f64),
}

impl Default for MedicalThresholds {
    fn default() -> Self {
        Self {
            neck_angle_range: (-30.0, 30.0),
            forward_head_max: 100.0,
            head_tilt_range: (-15.0, 15.0),
        }
    }
}

impl MedicalThresholds {
    /// Midpoint of the neck-angle range, the reference point for
    /// deviation magnitudes.
    pub fn neck_angle_midpoint(&self) -> f64 {
        (self.neck_angle_range.0 + self.neck_angle_range.1) / 2.0
    }

    /// Midpoint of the head-tilt range.
    pub fn head_tilt_midpoint(&self) -> f64 {
        (self.head_tilt_range.0 + self.head_tilt_range.1) / 2.0
    }
}

/// Thresholds plus human-readable descriptions, served by the
/// medical-standards operation for client display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardsReport {
    pub neck_angle_normal_range: (f64, f64),
    pub forward_head_normal_max: f64,
    pub head_tilt_normal_range: (f64, f64),
    pub description: StandardsDescription,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardsDescription {
    pub neck_angle: String,
    pub forward_head_distance: String,
    pub head_tilt: String,
}

impl StandardsReport {
    pub fn from_thresholds(thresholds: &MedicalThresholds) -> Self {
        Self {
            neck_angle_normal_range: thresholds.neck_angle_range,
            forward_head_normal_max: thresholds.forward_head_max,
            head_tilt_normal_range: thresholds.head_tilt_range,
            description: StandardsDescription {
                neck_angle: "Normal neck angle range (degrees)".to_string(),
                forward_head_distance: "Maximum normal forward head distance (mm)".to_string(),
                head_tilt: "Normal lateral head tilt range (degrees)".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_thresholds_match_medical_constants() {
        let t = MedicalThresholds::default();
        assert_eq!(t.neck_angle_range, (-30.0, 30.0));
        assert_eq!(t.forward_head_max, 100.0);
        assert_eq!(t.head_tilt_range, (-15.0, 15.0));
    }

    #[test]
    fn midpoints_are_range_centers() {
        let t = MedicalThresholds::default();
        assert_eq!(t.neck_angle_midpoint(), 0.0);
        assert_eq!(t.head_tilt_midpoint(), 0.0);

        let skewed = MedicalThresholds {
            neck_angle_range: (-10.0, 30.0),
            ..Default::default()
        };
        assert_eq!(skewed.neck_angle_midpoint(), 10.0);
    }

    #[test]
    fn standards_report_echoes_thresholds() {
        let report = StandardsReport::from_thresholds(&MedicalThresholds::default());
        assert_eq!(report.neck_angle_normal_range, (-30.0, 30.0));
        assert_eq!(report.forward_head_normal_max, 100.0);

        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("description").is_some());
    }
}
