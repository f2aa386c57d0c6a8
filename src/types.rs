//! Core types for the posture engine
//!
//! This module defines the data that flows through the engine: coerced
//! measurements, classification output, persisted records, aggregate
//! summaries, and in-memory sessions.

use crate::thresholds::MedicalThresholds;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A fully coerced posture measurement, ready for classification.
///
/// All 13 signals are present and numeric; the boundary layer
/// ([`crate::schema`]) is responsible for coercion and validation before
/// one of these is constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    /// Owning user
    pub user_id: i64,
    /// Client-supplied measurement session identifier
    pub session_id: String,
    /// Device/browser description, free text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_info: Option<String>,
    /// Client capture time; `None` means "use receipt time"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Neck flexion/extension angle (degrees)
    pub neck_angle: f64,
    /// Shoulder line slope (degrees)
    pub shoulder_slope: f64,
    /// Head forward translation (mm)
    pub head_forward: f64,
    /// Shoulder height imbalance (mm)
    pub shoulder_height_diff: f64,
    /// Composite posture score, produced client-side on a 0-100 scale
    pub score: f64,
    /// Cervical lordosis angle (degrees)
    pub cervical_lordosis: f64,
    /// Forward head distance (mm)
    pub forward_head_distance: f64,
    /// Lateral head tilt (degrees)
    pub head_tilt: f64,
    /// Left shoulder height offset from reference (mm)
    pub left_shoulder_height_diff: f64,
    /// Left scapular winging (mm)
    pub left_scapular_winging: f64,
    /// Right scapular winging (mm)
    pub right_scapular_winging: f64,
    /// Shoulder forward translation (mm)
    pub shoulder_forward_movement: f64,
    /// Head rotation (degrees)
    pub head_rotation: f64,

    /// Problem tags attached by the client, normalized to display strings
    #[serde(default)]
    pub issues: Vec<String>,
}

/// Coarse severity of one measurement, determined solely by how many
/// signals fall outside their normal range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLevel {
    Low,
    Medium,
    High,
}

impl SeverityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityLevel::Low => "low",
            SeverityLevel::Medium => "medium",
            SeverityLevel::High => "high",
        }
    }
}

/// Per-signal normal flags plus derived feedback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostureAnalysis {
    pub is_neck_angle_normal: bool,
    pub is_forward_head_normal: bool,
    pub is_head_tilt_normal: bool,
    /// Human-readable problem statements, one per abnormal signal,
    /// in neck → forward-head → head-tilt order
    pub problems: Vec<String>,
    /// Corrective suggestions, parallel to `problems`
    pub suggestions: Vec<String>,
    pub severity_level: SeverityLevel,
}

/// Distance of each classified signal from its normal range.
///
/// Range-based signals measure from the range midpoint; the forward-head
/// deviation is the overshoot past the maximum, clamped at zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deviations {
    pub neck_angle_deviation: f64,
    pub forward_head_deviation: f64,
    pub head_tilt_deviation: f64,
}

/// Complete classification output: flags, feedback, deviations, and an
/// echo of the thresholds applied (for client display and auditability).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub analysis: PostureAnalysis,
    pub deviations: Deviations,
    pub medical_standards: MedicalThresholds,
}

/// A measurement as persisted: input signals plus derived normal flags,
/// storage identity, and the server-side creation time.
///
/// Created exactly once at write time and never mutated; removed only
/// when the owning account is deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatedRecord {
    pub id: i64,
    pub user_id: i64,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_info: Option<String>,

    pub neck_angle: f64,
    pub shoulder_slope: f64,
    pub head_forward: f64,
    pub shoulder_height_diff: f64,
    pub score: f64,
    pub cervical_lordosis: f64,
    pub forward_head_distance: f64,
    pub head_tilt: f64,
    pub left_shoulder_height_diff: f64,
    pub left_scapular_winging: f64,
    pub right_scapular_winging: f64,
    pub shoulder_forward_movement: f64,
    pub head_rotation: f64,

    #[serde(default)]
    pub issues: Vec<String>,

    pub is_neck_angle_normal: bool,
    pub is_forward_head_normal: bool,
    pub is_head_tilt_normal: bool,
    pub created_at: DateTime<Utc>,
}

impl EvaluatedRecord {
    /// True when every classified signal is inside its normal range
    pub fn is_fully_normal(&self) -> bool {
        self.is_neck_angle_normal && self.is_forward_head_normal && self.is_head_tilt_normal
    }
}

/// Summary statistics over a user's trailing window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    pub total_records: u64,
    /// Mean composite score, rounded to 2 decimals; 0 when no records
    pub average_score: f64,
    /// Percent change of the last 7 days' mean score against the 7 days
    /// before that; 0 when the earlier week has no records
    pub improvement_rate: f64,
    /// Percent of records with all three normal flags set
    pub normal_posture_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_measurement: Option<DateTime<Utc>>,
}

impl StatsSummary {
    /// The all-zero summary returned for an empty window
    pub fn empty() -> Self {
        Self {
            total_records: 0,
            average_score: 0.0,
            improvement_rate: 0.0,
            normal_posture_rate: 0.0,
            last_measurement: None,
        }
    }
}

/// One calendar day's aggregate for trend visualization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTrend {
    pub date: NaiveDate,
    pub average_score: f64,
    pub record_count: u64,
    pub neck_angle_avg: f64,
    pub forward_head_distance_avg: f64,
}

/// Lifecycle of an in-memory measurement session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Stopped,
}

/// An ephemeral measurement session tracked by the registry.
///
/// Sessions live only in process memory; records referencing a session
/// outlive it in storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub user_id: i64,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_info: Option<String>,
    /// Client-side sampling interval between measurements
    pub analysis_interval_secs: u32,
    /// Records written under this session while it was registered
    pub record_count: u64,
}

/// Result of stopping a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStopResult {
    pub session_id: String,
    pub duration_seconds: i64,
    pub total_records: u64,
}

/// A registered user account, as exposed to callers (no password hash)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Round to two decimal places, the precision used by every reported
/// aggregate figure.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SeverityLevel::High).unwrap(),
            "\"high\""
        );
        assert_eq!(SeverityLevel::Medium.as_str(), "medium");
    }

    #[test]
    fn round2_half_cases() {
        assert_eq!(round2(80.0), 80.0);
        assert_eq!(round2(33.333333), 33.33);
        assert_eq!(round2(66.666666), 66.67);
        assert_eq!(round2(-12.345678), -12.35);
    }

    #[test]
    fn fully_normal_requires_all_flags() {
        let mut record = EvaluatedRecord {
            id: 1,
            user_id: 1,
            session_id: "s".into(),
            device_info: None,
            neck_angle: 0.0,
            shoulder_slope: 0.0,
            head_forward: 0.0,
            shoulder_height_diff: 0.0,
            score: 90.0,
            cervical_lordosis: 0.0,
            forward_head_distance: 0.0,
            head_tilt: 0.0,
            left_shoulder_height_diff: 0.0,
            left_scapular_winging: 0.0,
            right_scapular_winging: 0.0,
            shoulder_forward_movement: 0.0,
            head_rotation: 0.0,
            issues: vec![],
            is_neck_angle_normal: true,
            is_forward_head_normal: true,
            is_head_tilt_normal: true,
            created_at: Utc::now(),
        };
        assert!(record.is_fully_normal());
        record.is_head_tilt_normal = false;
        assert!(!record.is_fully_normal());
    }

    #[test]
    fn empty_summary_is_all_zero() {
        let s = StatsSummary::empty();
        assert_eq!(s.total_records, 0);
        assert_eq!(s.average_score, 0.0);
        assert_eq!(s.improvement_rate, 0.0);
        assert_eq!(s.normal_posture_rate, 0.0);
        assert!(s.last_measurement.is_none());
    }
}
