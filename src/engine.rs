//! Engine orchestration
//!
//! This module provides the public API of the posture engine. A
//! [`PostureEngine`] owns the thresholds, the record store, and the
//! session registry; the transport layer (HTTP handlers, CLI) calls
//! only this.
//!
//! Pipeline for a persisted measurement:
//! 1. Schema coercion - lenient wire input to a strict [`Measurement`]
//! 2. Classifier - normal flags, feedback, severity, deviations
//! 3. RecordStore - append the evaluated record
//! 4. SessionRegistry - count the record against its session

use crate::accounts::{AccountService, PasswordHasher};
use crate::classifier::Classifier;
use crate::error::EngineError;
use crate::schema::{CoercionFlag, RawMeasurement};
use crate::sessions::{SessionRegistry, StartSession};
use crate::stats::StatsAggregator;
use crate::store::{NewRecord, RecordStore, DEFAULT_QUERY_LIMIT};
use crate::thresholds::{MedicalThresholds, StandardsReport};
use crate::trends::TrendAggregator;
use crate::types::{
    Classification, DailyTrend, EvaluatedRecord, Session, SessionStopResult, StatsSummary,
};
use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use log::warn;

/// Default stats reporting window
pub const DEFAULT_STATS_WINDOW_DAYS: u32 = 30;
/// Default trend reporting window
pub const DEFAULT_TREND_WINDOW_DAYS: u32 = 7;

/// The posture engine facade
pub struct PostureEngine {
    thresholds: MedicalThresholds,
    store: RecordStore,
    sessions: SessionRegistry,
}

impl PostureEngine {
    /// Create an engine over the given store with the production
    /// medical thresholds.
    pub fn new(store: RecordStore) -> Self {
        Self::with_thresholds(store, MedicalThresholds::default())
    }

    pub fn with_thresholds(store: RecordStore, thresholds: MedicalThresholds) -> Self {
        Self {
            thresholds,
            store,
            sessions: SessionRegistry::new(),
        }
    }

    pub fn thresholds(&self) -> &MedicalThresholds {
        &self.thresholds
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Account flows over this engine's store. Hashing stays an
    /// injected collaborator, supplied by the transport layer.
    pub fn accounts<'a>(&'a self, hasher: &'a dyn PasswordHasher) -> AccountService<'a> {
        AccountService::new(&self.store, hasher)
    }

    /// Stateless real-time analysis: coerce and classify without
    /// persisting anything.
    pub fn analyze(&self, raw: &RawMeasurement) -> Classification {
        let (measurement, flags) = raw.coerce();
        log_coercions("analyze", &flags);
        Classifier::classify(&measurement, &self.thresholds)
    }

    /// Evaluate and persist one measurement, counting it against its
    /// session.
    pub fn save_record(&self, raw: &RawMeasurement) -> Result<EvaluatedRecord, EngineError> {
        let now = Utc::now();
        let (measurement, flags) = raw.coerce();
        log_coercions("save_record", &flags);

        let classification = Classifier::classify(&measurement, &self.thresholds);
        let created_at = measurement.timestamp.unwrap_or(now);
        let session_id = measurement.session_id.clone();

        let record = self.store.insert_record(&NewRecord {
            measurement,
            is_neck_angle_normal: classification.analysis.is_neck_angle_normal,
            is_forward_head_normal: classification.analysis.is_forward_head_normal,
            is_head_tilt_normal: classification.analysis.is_head_tilt_normal,
            created_at,
        })?;

        self.sessions.record_created(&session_id, now);
        Ok(record)
    }

    /// List a user's records, newest first, optionally bounded by
    /// `YYYY-MM-DD` calendar dates. The end date covers its entire day.
    pub fn list_records(
        &self,
        user_id: i64,
        start_date: Option<&str>,
        end_date: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<EvaluatedRecord>, EngineError> {
        let start = start_date
            .map(|s| parse_date(s).map(day_start))
            .transpose()?;
        // End-of-day inclusive: expand the date to the next local
        // midnight and filter strictly below it.
        let end = end_date
            .map(|s| parse_date(s).map(|d| day_start(d + Duration::days(1))))
            .transpose()?;

        self.store
            .records_for_user(user_id, start, end, limit.unwrap_or(DEFAULT_QUERY_LIMIT))
    }

    /// Summary statistics over a trailing window (default 30 days)
    pub fn stats(
        &self,
        user_id: i64,
        window_days: Option<u32>,
    ) -> Result<StatsSummary, EngineError> {
        StatsAggregator::compute(
            &self.store,
            user_id,
            window_days.unwrap_or(DEFAULT_STATS_WINDOW_DAYS),
            Utc::now(),
        )
    }

    /// Daily trend series over a trailing window (default 7 days)
    pub fn trends(
        &self,
        user_id: i64,
        window_days: Option<u32>,
    ) -> Result<Vec<DailyTrend>, EngineError> {
        TrendAggregator::compute(
            &self.store,
            user_id,
            window_days.unwrap_or(DEFAULT_TREND_WINDOW_DAYS),
            Utc::now(),
        )
    }

    /// The medical thresholds with display descriptions
    pub fn medical_standards(&self) -> StandardsReport {
        StandardsReport::from_thresholds(&self.thresholds)
    }

    pub fn start_session(&self, params: StartSession) -> Session {
        self.sessions.start(params, Utc::now())
    }

    pub fn stop_session(&self, session_id: &str) -> Result<SessionStopResult, EngineError> {
        self.sessions.stop(session_id, Utc::now())
    }

    pub fn active_sessions(&self) -> Vec<Session> {
        self.sessions.list_active()
    }

    /// Evict stopped and stale sessions; the embedder schedules this.
    pub fn sweep_sessions(&self, idle_ttl: Duration) -> usize {
        self.sessions.sweep(idle_ttl, Utc::now())
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, EngineError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| EngineError::DateParse(value.to_string()))
}

/// Local midnight of a calendar date, in UTC. Date bounds follow the
/// server-local day, matching the trend bucketing. A DST gap or fold at
/// midnight resolves to the earliest representable instant.
fn day_start(date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

fn log_coercions(operation: &str, flags: &[CoercionFlag]) {
    for flag in flags {
        warn!(
            "{operation}: coerced non-numeric {} ({:?}) to 0.0",
            flag.field, flag.raw
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::Registration;
    use crate::types::{SessionStatus, SeverityLevel};
    use pretty_assertions::assert_eq;

    struct PlainHasher;

    impl PasswordHasher for PlainHasher {
        fn hash(&self, password: &str) -> String {
            format!("plain:{password}")
        }

        fn verify(&self, password: &str, hash: &str) -> bool {
            hash == format!("plain:{password}")
        }
    }

    fn engine() -> PostureEngine {
        PostureEngine::new(RecordStore::open_in_memory().unwrap())
    }

    fn raw_measurement(user_id: i64, session_id: &str) -> RawMeasurement {
        RawMeasurement::from_json(&format!(
            r#"{{
                "user_id": {user_id},
                "session_id": "{session_id}",
                "neck_angle": 35.0,
                "shoulder_slope": 1.0,
                "head_forward": 2.0,
                "shoulder_height_diff": 3.0,
                "score": 60.0,
                "cervical_lordosis": 4.0,
                "forward_head_distance": 120.0,
                "head_tilt": 0.0,
                "left_shoulder_height_diff": 0.5,
                "left_scapular_winging": 0.1,
                "right_scapular_winging": 0.2,
                "shoulder_forward_movement": 6.0,
                "head_rotation": 0.0
            }}"#
        ))
        .unwrap()
    }

    #[test]
    fn analyze_reference_scenario() {
        let engine = engine();
        let result = engine.analyze(&raw_measurement(1, "s1"));

        assert!(!result.analysis.is_neck_angle_normal);
        assert!(!result.analysis.is_forward_head_normal);
        assert!(result.analysis.is_head_tilt_normal);
        assert_eq!(result.analysis.severity_level, SeverityLevel::High);
        assert_eq!(result.deviations.neck_angle_deviation, 35.0);
        assert_eq!(result.deviations.forward_head_deviation, 20.0);
        assert_eq!(result.deviations.head_tilt_deviation, 0.0);

        // Wire shape: analysis / deviations / medical_standards
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("analysis").is_some());
        assert!(json.get("deviations").is_some());
        assert!(json.get("medical_standards").is_some());
        assert_eq!(json["analysis"]["severity_level"], "high");
    }

    #[test]
    fn save_then_list_roundtrips_signals() {
        let engine = engine();

        let saved = engine.save_record(&raw_measurement(1, "s1")).unwrap();
        assert!(saved.id > 0);
        assert!(!saved.is_neck_angle_normal);
        assert!(!saved.is_forward_head_normal);
        assert!(saved.is_head_tilt_normal);

        let listed = engine.list_records(1, None, None, None).unwrap();
        assert_eq!(listed.len(), 1);

        let r = &listed[0];
        assert_eq!(r.neck_angle, 35.0);
        assert_eq!(r.shoulder_slope, 1.0);
        assert_eq!(r.head_forward, 2.0);
        assert_eq!(r.shoulder_height_diff, 3.0);
        assert_eq!(r.score, 60.0);
        assert_eq!(r.cervical_lordosis, 4.0);
        assert_eq!(r.forward_head_distance, 120.0);
        assert_eq!(r.head_tilt, 0.0);
        assert_eq!(r.left_shoulder_height_diff, 0.5);
        assert_eq!(r.left_scapular_winging, 0.1);
        assert_eq!(r.right_scapular_winging, 0.2);
        assert_eq!(r.shoulder_forward_movement, 6.0);
        assert_eq!(r.head_rotation, 0.0);
    }

    #[test]
    fn list_records_accepts_date_bounds() {
        let engine = engine();
        engine.save_record(&raw_measurement(1, "s1")).unwrap();

        let today = Local::now().date_naive().format("%Y-%m-%d").to_string();
        let listed = engine
            .list_records(1, Some(&today), Some(&today), None)
            .unwrap();
        assert_eq!(listed.len(), 1);

        let yesterday = (Local::now().date_naive() - Duration::days(1))
            .format("%Y-%m-%d")
            .to_string();
        let none = engine
            .list_records(1, Some(&yesterday), Some(&yesterday), None)
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn malformed_date_is_a_client_error() {
        let engine = engine();
        let err = engine
            .list_records(1, Some("2025/01/01"), None, None)
            .unwrap_err();
        assert!(matches!(err, EngineError::DateParse(_)));
        assert!(err.is_client_error());
    }

    #[test]
    fn record_creation_increments_its_session() {
        let engine = engine();

        let session = engine.start_session(StartSession {
            session_id: Some("s1".to_string()),
            user_id: 1,
            device_info: None,
            analysis_interval_secs: Some(2),
        });
        assert_eq!(session.status, SessionStatus::Active);

        engine.save_record(&raw_measurement(1, "s1")).unwrap();
        engine.save_record(&raw_measurement(1, "s1")).unwrap();
        // A record for a session the registry never saw is still saved
        engine.save_record(&raw_measurement(1, "untracked")).unwrap();

        let stopped = engine.stop_session("s1").unwrap();
        assert_eq!(stopped.total_records, 2);
        assert!(stopped.duration_seconds >= 0);

        assert!(engine.active_sessions().is_empty());
        assert_eq!(engine.sweep_sessions(Duration::hours(1)), 1);
    }

    #[test]
    fn stats_and_trends_cover_saved_records() {
        let engine = engine();

        for _ in 0..3 {
            engine.save_record(&raw_measurement(1, "s1")).unwrap();
        }

        let stats = engine.stats(1, None).unwrap();
        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.average_score, 60.0);
        // Neck and forward-head are abnormal in every record
        assert_eq!(stats.normal_posture_rate, 0.0);
        assert!(stats.last_measurement.is_some());

        let trends = engine.trends(1, None).unwrap();
        assert_eq!(trends.len(), 1);
        assert_eq!(trends[0].record_count, 3);
        assert_eq!(trends[0].average_score, 60.0);
    }

    #[test]
    fn account_flow_through_engine() {
        let engine = engine();
        let accounts = engine.accounts(&PlainHasher);

        let user = accounts
            .register(
                &Registration {
                    username: "ana".to_string(),
                    email: "ana@example.com".to_string(),
                    password: "hunter22".to_string(),
                },
                Utc::now(),
            )
            .unwrap();

        engine
            .save_record(&raw_measurement(user.id, "s1"))
            .unwrap();

        engine.accounts(&PlainHasher).delete(user.id).unwrap();
        assert!(engine.list_records(user.id, None, None, None).unwrap().is_empty());
    }

    #[test]
    fn medical_standards_echo_engine_thresholds() {
        let engine = engine();
        let standards = engine.medical_standards();
        assert_eq!(standards.neck_angle_normal_range, (-30.0, 30.0));
        assert_eq!(standards.forward_head_normal_max, 100.0);
        assert_eq!(standards.head_tilt_normal_range, (-15.0, 15.0));
    }
}
