//! Posture record persistence
//!
//! Append-only writes, newest-first range reads, and the windowed
//! aggregate queries the stats and trend aggregators are built on.

use super::{parse_ts, to_ts, RecordStore};
use crate::error::EngineError;
use crate::types::{EvaluatedRecord, Measurement};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

/// Default cap on range reads
pub const DEFAULT_QUERY_LIMIT: u32 = 100;

/// A record ready for insertion: coerced measurement, derived flags,
/// and the creation time stamped by the engine.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub measurement: Measurement,
    pub is_neck_angle_normal: bool,
    pub is_forward_head_normal: bool,
    pub is_head_tilt_normal: bool,
    pub created_at: DateTime<Utc>,
}

impl RecordStore {
    /// Insert one evaluated record, assigning its identity.
    pub fn insert_record(&self, record: &NewRecord) -> Result<EvaluatedRecord, EngineError> {
        self.with_conn(|conn| {
            let m = &record.measurement;
            let issues_json = serde_json::to_string(&m.issues)?;

            conn.execute(
                "INSERT INTO posture_records (
                    user_id, session_id, device_info,
                    neck_angle, shoulder_slope, head_forward, shoulder_height_diff, score,
                    cervical_lordosis, forward_head_distance, head_tilt,
                    left_shoulder_height_diff, left_scapular_winging, right_scapular_winging,
                    shoulder_forward_movement, head_rotation,
                    issues, is_neck_angle_normal, is_forward_head_normal, is_head_tilt_normal,
                    created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                           ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
                params![
                    m.user_id,
                    m.session_id,
                    m.device_info,
                    m.neck_angle,
                    m.shoulder_slope,
                    m.head_forward,
                    m.shoulder_height_diff,
                    m.score,
                    m.cervical_lordosis,
                    m.forward_head_distance,
                    m.head_tilt,
                    m.left_shoulder_height_diff,
                    m.left_scapular_winging,
                    m.right_scapular_winging,
                    m.shoulder_forward_movement,
                    m.head_rotation,
                    issues_json,
                    record.is_neck_angle_normal,
                    record.is_forward_head_normal,
                    record.is_head_tilt_normal,
                    to_ts(record.created_at),
                ],
            )?;

            let id = conn.last_insert_rowid();
            Ok(EvaluatedRecord {
                id,
                user_id: m.user_id,
                session_id: m.session_id.clone(),
                device_info: m.device_info.clone(),
                neck_angle: m.neck_angle,
                shoulder_slope: m.shoulder_slope,
                head_forward: m.head_forward,
                shoulder_height_diff: m.shoulder_height_diff,
                score: m.score,
                cervical_lordosis: m.cervical_lordosis,
                forward_head_distance: m.forward_head_distance,
                head_tilt: m.head_tilt,
                left_shoulder_height_diff: m.left_shoulder_height_diff,
                left_scapular_winging: m.left_scapular_winging,
                right_scapular_winging: m.right_scapular_winging,
                shoulder_forward_movement: m.shoulder_forward_movement,
                head_rotation: m.head_rotation,
                issues: m.issues.clone(),
                is_neck_angle_normal: record.is_neck_angle_normal,
                is_forward_head_normal: record.is_forward_head_normal,
                is_head_tilt_normal: record.is_head_tilt_normal,
                created_at: record.created_at,
            })
        })
    }

    /// Range-filtered read for one user, newest first.
    ///
    /// `start` is inclusive, `end` exclusive; either bound may be
    /// omitted. Results are truncated to `limit`.
    pub fn records_for_user(
        &self,
        user_id: i64,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<EvaluatedRecord>, EngineError> {
        self.with_conn(|conn| {
            let mut sql = String::from(
                "SELECT id, user_id, session_id, device_info,
                        neck_angle, shoulder_slope, head_forward, shoulder_height_diff, score,
                        cervical_lordosis, forward_head_distance, head_tilt,
                        left_shoulder_height_diff, left_scapular_winging, right_scapular_winging,
                        shoulder_forward_movement, head_rotation,
                        issues, is_neck_angle_normal, is_forward_head_normal, is_head_tilt_normal,
                        created_at
                 FROM posture_records
                 WHERE user_id = ?1",
            );
            let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id)];

            if let Some(start) = start {
                args.push(Box::new(to_ts(start)));
                sql.push_str(&format!(" AND created_at >= ?{}", args.len()));
            }
            if let Some(end) = end {
                args.push(Box::new(to_ts(end)));
                sql.push_str(&format!(" AND created_at < ?{}", args.len()));
            }

            args.push(Box::new(limit));
            sql.push_str(&format!(" ORDER BY created_at DESC LIMIT ?{}", args.len()));

            let mut stmt = conn.prepare(&sql)?;
            let params = rusqlite::params_from_iter(args.iter().map(|a| a.as_ref()));
            let mut rows = stmt.query(params)?;

            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(record_from_row(row)?);
            }
            Ok(records)
        })
    }

    /// All of a user's records with `created_at >= since`, oldest first.
    /// Feeds the trend aggregator's day bucketing.
    pub fn records_since(
        &self,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<EvaluatedRecord>, EngineError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, session_id, device_info,
                        neck_angle, shoulder_slope, head_forward, shoulder_height_diff, score,
                        cervical_lordosis, forward_head_distance, head_tilt,
                        left_shoulder_height_diff, left_scapular_winging, right_scapular_winging,
                        shoulder_forward_movement, head_rotation,
                        issues, is_neck_angle_normal, is_forward_head_normal, is_head_tilt_normal,
                        created_at
                 FROM posture_records
                 WHERE user_id = ?1 AND created_at >= ?2
                 ORDER BY created_at ASC",
            )?;
            let mut rows = stmt.query(params![user_id, to_ts(since)])?;

            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(record_from_row(row)?);
            }
            Ok(records)
        })
    }

    /// Count of a user's records with `created_at >= since`.
    pub fn count_records_since(
        &self,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<u64, EngineError> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM posture_records
                 WHERE user_id = ?1 AND created_at >= ?2",
                params![user_id, to_ts(since)],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    /// Count of records in the window with every normal flag set.
    pub fn count_fully_normal_since(
        &self,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<u64, EngineError> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM posture_records
                 WHERE user_id = ?1 AND created_at >= ?2
                   AND is_neck_angle_normal = 1
                   AND is_forward_head_normal = 1
                   AND is_head_tilt_normal = 1",
                params![user_id, to_ts(since)],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    /// Mean score between `start` (inclusive) and an optional `end`
    /// (exclusive). `None` when the range holds no records.
    pub fn average_score_between(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Option<f64>, EngineError> {
        self.with_conn(|conn| {
            let avg: Option<f64> = match end {
                Some(end) => conn.query_row(
                    "SELECT AVG(score) FROM posture_records
                     WHERE user_id = ?1 AND created_at >= ?2 AND created_at < ?3",
                    params![user_id, to_ts(start), to_ts(end)],
                    |row| row.get(0),
                )?,
                None => conn.query_row(
                    "SELECT AVG(score) FROM posture_records
                     WHERE user_id = ?1 AND created_at >= ?2",
                    params![user_id, to_ts(start)],
                    |row| row.get(0),
                )?,
            };
            Ok(avg)
        })
    }

    /// Most recent `created_at` in the window, if any.
    pub fn last_record_time_since(
        &self,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, EngineError> {
        self.with_conn(|conn| {
            let ts: Option<String> = conn.query_row(
                "SELECT MAX(created_at) FROM posture_records
                 WHERE user_id = ?1 AND created_at >= ?2",
                params![user_id, to_ts(since)],
                |row| row.get(0),
            )?;
            ts.as_deref().map(parse_ts).transpose()
        })
    }

    /// Remove every record belonging to a user. Only the account
    /// deletion cascade calls this.
    pub(crate) fn delete_records_for_user(
        &self,
        conn: &Connection,
        user_id: i64,
    ) -> Result<usize, EngineError> {
        let deleted = conn.execute(
            "DELETE FROM posture_records WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(deleted)
    }
}

fn record_from_row(row: &Row<'_>) -> Result<EvaluatedRecord, EngineError> {
    let issues_json: String = row.get(17)?;
    let issues: Vec<String> = serde_json::from_str(&issues_json)?;
    let created_at_raw: String = row.get(21)?;

    Ok(EvaluatedRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        session_id: row.get(2)?,
        device_info: row.get(3)?,
        neck_angle: row.get(4)?,
        shoulder_slope: row.get(5)?,
        head_forward: row.get(6)?,
        shoulder_height_diff: row.get(7)?,
        score: row.get(8)?,
        cervical_lordosis: row.get(9)?,
        forward_head_distance: row.get(10)?,
        head_tilt: row.get(11)?,
        left_shoulder_height_diff: row.get(12)?,
        left_scapular_winging: row.get(13)?,
        right_scapular_winging: row.get(14)?,
        shoulder_forward_movement: row.get(15)?,
        head_rotation: row.get(16)?,
        issues,
        is_neck_angle_normal: row.get(18)?,
        is_forward_head_normal: row.get(19)?,
        is_head_tilt_normal: row.get(20)?,
        created_at: parse_ts(&created_at_raw)?,
    })
}
