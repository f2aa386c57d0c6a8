//! Daily trend aggregation
//!
//! Buckets a user's records by calendar day of `created_at` and computes
//! per-day averages for trend visualization. Days without records are
//! omitted rather than zero-filled, and the output is ordered ascending
//! by date.

use crate::error::EngineError;
use crate::store::RecordStore;
use crate::types::{round2, DailyTrend, EvaluatedRecord};
use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use std::collections::BTreeMap;

/// Aggregator for per-day trend series
pub struct TrendAggregator;

impl TrendAggregator {
    /// Compute the daily series for `user_id` over the trailing
    /// `window_days`, evaluated at `now`. Bucketing uses the server's
    /// local calendar day.
    pub fn compute(
        store: &RecordStore,
        user_id: i64,
        window_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<DailyTrend>, EngineError> {
        let window_start = now - Duration::days(i64::from(window_days));
        let records = store.records_since(user_id, window_start)?;
        Ok(bucket_by_day(&records))
    }
}

/// Group records into calendar-day buckets. BTreeMap keys keep the
/// output ordering ascending and deterministic.
fn bucket_by_day(records: &[EvaluatedRecord]) -> Vec<DailyTrend> {
    let mut buckets: BTreeMap<NaiveDate, Vec<&EvaluatedRecord>> = BTreeMap::new();
    for record in records {
        let day = record.created_at.with_timezone(&Local).date_naive();
        buckets.entry(day).or_default().push(record);
    }

    buckets
        .into_iter()
        .map(|(date, day_records)| {
            let count = day_records.len() as f64;
            let avg = |f: fn(&EvaluatedRecord) -> f64| {
                round2(day_records.iter().map(|r| f(r)).sum::<f64>() / count)
            };

            DailyTrend {
                date,
                average_score: avg(|r| r.score),
                record_count: day_records.len() as u64,
                neck_angle_avg: avg(|r| r.neck_angle),
                forward_head_distance_avg: avg(|r| r.forward_head_distance),
            }
        })
        .collect()
}
