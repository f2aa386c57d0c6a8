//! Raw measurement schema and coercion
//!
//! The frontend's pose-estimation loop has shipped several payload
//! generations: signals as numbers or stringified numbers, and `issues`
//! as plain strings, `{message}` objects, or `{type}` objects. The
//! coercion here is deliberate and total — every historical shape maps
//! to a defined value, with parse fallbacks surfaced as flags rather
//! than silently folded into genuine zeros.

use crate::error::EngineError;
use crate::types::Measurement;
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A numeric signal as it appears on the wire: a number, or a string
/// that should contain one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalValue {
    Number(f64),
    Text(String),
}

impl SignalValue {
    /// Coerce to `f64`. Unparseable text falls back to `0.0` and
    /// reports the fallback through `flags`.
    fn coerce(&self, field: &'static str, flags: &mut Vec<CoercionFlag>) -> f64 {
        match self {
            SignalValue::Number(v) => *v,
            SignalValue::Text(s) => match s.trim().parse::<f64>() {
                Ok(v) => v,
                Err(_) => {
                    warn!("non-numeric value for {field}: {s:?}, defaulting to 0.0");
                    flags.push(CoercionFlag {
                        field,
                        raw: s.clone(),
                    });
                    0.0
                }
            },
        }
    }
}

impl From<f64> for SignalValue {
    fn from(v: f64) -> Self {
        SignalValue::Number(v)
    }
}

/// Record of one parse-fallback coercion, so callers and tests can tell
/// a defaulted zero from a measured zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoercionFlag {
    /// Signal field that failed to parse
    pub field: &'static str,
    /// The original string value
    pub raw: String,
}

/// An issue tag in any of the shapes clients have sent.
///
/// Reduction priority is message > type > raw stringify; the variants
/// are tried in that order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IssueInput {
    Message { message: String },
    Type { r#type: String },
    Other(Value),
}

impl IssueInput {
    /// Reduce to a single display string
    pub fn display_string(&self) -> String {
        match self {
            IssueInput::Message { message } => message.clone(),
            IssueInput::Type { r#type } => r#type.clone(),
            // Bare JSON strings pass through unquoted; anything else is
            // stringified wholesale.
            IssueInput::Other(Value::String(s)) => s.clone(),
            IssueInput::Other(value) => value.to_string(),
        }
    }
}

/// One measurement as received from a client, before coercion.
///
/// All 13 signals are required; a missing signal is a deserialization
/// error and therefore a validation failure at the boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMeasurement {
    pub user_id: i64,
    pub session_id: String,
    #[serde(default)]
    pub device_info: Option<String>,
    /// Client capture time; omitted means the server stamps receipt time
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    pub neck_angle: SignalValue,
    pub shoulder_slope: SignalValue,
    pub head_forward: SignalValue,
    pub shoulder_height_diff: SignalValue,
    pub score: SignalValue,
    pub cervical_lordosis: SignalValue,
    pub forward_head_distance: SignalValue,
    pub head_tilt: SignalValue,
    pub left_shoulder_height_diff: SignalValue,
    pub left_scapular_winging: SignalValue,
    pub right_scapular_winging: SignalValue,
    pub shoulder_forward_movement: SignalValue,
    pub head_rotation: SignalValue,

    #[serde(default)]
    pub issues: Vec<IssueInput>,
}

impl RawMeasurement {
    /// Parse a raw measurement from JSON. Missing or mistyped required
    /// fields surface as [`EngineError::Validation`].
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        serde_json::from_str(json)
            .map_err(|e| EngineError::Validation(format!("malformed measurement: {e}")))
    }

    /// Coerce into a strict [`Measurement`], returning any parse
    /// fallbacks alongside it.
    pub fn coerce(&self) -> (Measurement, Vec<CoercionFlag>) {
        let mut flags = Vec::new();

        let measurement = Measurement {
            user_id: self.user_id,
            session_id: self.session_id.clone(),
            device_info: self.device_info.clone(),
            timestamp: self.timestamp,
            neck_angle: self.neck_angle.coerce("neck_angle", &mut flags),
            shoulder_slope: self.shoulder_slope.coerce("shoulder_slope", &mut flags),
            head_forward: self.head_forward.coerce("head_forward", &mut flags),
            shoulder_height_diff: self
                .shoulder_height_diff
                .coerce("shoulder_height_diff", &mut flags),
            score: self.score.coerce("score", &mut flags),
            cervical_lordosis: self
                .cervical_lordosis
                .coerce("cervical_lordosis", &mut flags),
            forward_head_distance: self
                .forward_head_distance
                .coerce("forward_head_distance", &mut flags),
            head_tilt: self.head_tilt.coerce("head_tilt", &mut flags),
            left_shoulder_height_diff: self
                .left_shoulder_height_diff
                .coerce("left_shoulder_height_diff", &mut flags),
            left_scapular_winging: self
                .left_scapular_winging
                .coerce("left_scapular_winging", &mut flags),
            right_scapular_winging: self
                .right_scapular_winging
                .coerce("right_scapular_winging", &mut flags),
            shoulder_forward_movement: self
                .shoulder_forward_movement
                .coerce("shoulder_forward_movement", &mut flags),
            head_rotation: self.head_rotation.coerce("head_rotation", &mut flags),
            issues: self.issues.iter().map(IssueInput::display_string).collect(),
        };

        (measurement, flags)
    }
}
