//! Summary statistics
//!
//! Computes a user's trailing-window posture summary: record count, mean
//! score, normal-posture rate, and the week-over-week improvement rate.
//!
//! The improvement rate always compares the last 7 days against the 7
//! days before that, regardless of the requested window. That keeps the
//! figure comparable across calls with different reporting windows, at
//! the cost that a window shorter than 14 days still reads week-before
//! records for this one number.

use crate::error::EngineError;
use crate::store::RecordStore;
use crate::types::{round2, StatsSummary};
use chrono::{DateTime, Duration, Utc};

/// Span of each improvement-rate sub-window
const IMPROVEMENT_SPAN_DAYS: i64 = 7;

/// Aggregator for trailing-window summary statistics
pub struct StatsAggregator;

impl StatsAggregator {
    /// Compute the summary for `user_id` over the trailing
    /// `window_days`, evaluated at `now`.
    ///
    /// An empty window yields the all-zero summary, never an error.
    pub fn compute(
        store: &RecordStore,
        user_id: i64,
        window_days: u32,
        now: DateTime<Utc>,
    ) -> Result<StatsSummary, EngineError> {
        let window_start = now - Duration::days(i64::from(window_days));

        let total_records = store.count_records_since(user_id, window_start)?;
        if total_records == 0 {
            return Ok(StatsSummary::empty());
        }

        let average_score = store
            .average_score_between(user_id, window_start, None)?
            .map(round2)
            .unwrap_or(0.0);

        let normal_records = store.count_fully_normal_since(user_id, window_start)?;
        let normal_posture_rate = round2(normal_records as f64 / total_records as f64 * 100.0);

        let improvement_rate = improvement_rate(store, user_id, now)?;

        let last_measurement = store.last_record_time_since(user_id, window_start)?;

        Ok(StatsSummary {
            total_records,
            average_score,
            improvement_rate,
            normal_posture_rate,
            last_measurement,
        })
    }
}

/// Percent change of the trailing week's mean score against the week
/// before it. Zero when the earlier week is empty.
fn improvement_rate(
    store: &RecordStore,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<f64, EngineError> {
    let recent_start = now - Duration::days(IMPROVEMENT_SPAN_DAYS);
    let previous_start = recent_start - Duration::days(IMPROVEMENT_SPAN_DAYS);

    let recent_avg = store
        .average_score_between(user_id, recent_start, None)?
        .unwrap_or(0.0);
    let previous_avg = store
        .average_score_between(user_id, previous_start, Some(recent_start))?
        .unwrap_or(0.0);

    if previous_avg > 0.0 {
        Ok(round2((recent_avg - previous_avg) / previous_avg * 100.0))
    } else {
        Ok(0.0)
    }
}
