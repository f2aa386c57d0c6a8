//! In-memory session registry
//!
//! Tracks "active analysis" sessions for UI and reporting. Entries are
//! ephemeral: they live only for the process lifetime and records
//! referencing a session outlive it in storage.
//!
//! The registry is shared mutable state across concurrent requests and
//! serializes every operation on a single lock. Growth is bounded by
//! [`SessionRegistry::sweep`], which evicts stopped and stale-idle
//! entries; the embedder decides when to call it.

use crate::error::EngineError;
use crate::types::{Session, SessionStatus, SessionStopResult};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Default client-side sampling interval when the caller does not
/// supply one.
pub const DEFAULT_ANALYSIS_INTERVAL_SECS: u32 = 5;

/// Parameters for starting a session
#[derive(Debug, Clone, Default)]
pub struct StartSession {
    /// Client-supplied id; `None` generates an opaque one
    pub session_id: Option<String>,
    pub user_id: i64,
    pub device_info: Option<String>,
    pub analysis_interval_secs: Option<u32>,
}

struct Entry {
    session: Session,
    /// Last start/record activity, used by the staleness sweep
    touched_at: DateTime<Utc>,
}

/// Lock-guarded registry of measurement sessions
pub struct SessionRegistry {
    entries: Mutex<HashMap<String, Entry>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Start (or restart) a session. A reused id overwrites the prior
    /// entry: last writer wins, not an error.
    pub fn start(&self, params: StartSession, now: DateTime<Utc>) -> Session {
        let session_id = params
            .session_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let session = Session {
            session_id: session_id.clone(),
            user_id: params.user_id,
            start_time: now,
            end_time: None,
            status: SessionStatus::Active,
            device_info: params.device_info,
            analysis_interval_secs: params
                .analysis_interval_secs
                .unwrap_or(DEFAULT_ANALYSIS_INTERVAL_SECS),
            record_count: 0,
        };

        let mut entries = self.lock();
        entries.insert(
            session_id.clone(),
            Entry {
                session: session.clone(),
                touched_at: now,
            },
        );
        debug!("session {session_id} started for user {}", session.user_id);
        session
    }

    /// Stop a session, freezing its end time and duration.
    ///
    /// Stopping an already-stopped session is a no-op that returns the
    /// same frozen result; an unknown id is `NotFound`.
    pub fn stop(&self, session_id: &str, now: DateTime<Utc>) -> Result<SessionStopResult, EngineError> {
        let mut entries = self.lock();
        let entry = entries
            .get_mut(session_id)
            .ok_or_else(|| EngineError::NotFound(format!("session {session_id}")))?;

        let end_time = match entry.session.status {
            SessionStatus::Stopped => entry.session.end_time.unwrap_or(now),
            SessionStatus::Active => {
                entry.session.status = SessionStatus::Stopped;
                entry.session.end_time = Some(now);
                now
            }
        };

        Ok(SessionStopResult {
            session_id: session_id.to_string(),
            duration_seconds: (end_time - entry.session.start_time).num_seconds(),
            total_records: entry.session.record_count,
        })
    }

    /// Note one record written under `session_id`. Ids the registry has
    /// never seen are ignored: records may reference sessions started
    /// before a process restart.
    pub fn record_created(&self, session_id: &str, now: DateTime<Utc>) {
        let mut entries = self.lock();
        if let Some(entry) = entries.get_mut(session_id) {
            entry.session.record_count += 1;
            entry.touched_at = now;
        }
    }

    /// Snapshot of every active session
    pub fn list_active(&self) -> Vec<Session> {
        let entries = self.lock();
        let mut active: Vec<Session> = entries
            .values()
            .filter(|e| e.session.status == SessionStatus::Active)
            .map(|e| e.session.clone())
            .collect();
        active.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        active
    }

    /// Look up one session by id
    pub fn get(&self, session_id: &str) -> Option<Session> {
        self.lock().get(session_id).map(|e| e.session.clone())
    }

    /// Evict stopped sessions and active sessions with no start/record
    /// activity within `idle_ttl`. Returns the number evicted.
    pub fn sweep(&self, idle_ttl: Duration, now: DateTime<Utc>) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| {
            entry.session.status == SessionStatus::Active && now - entry.touched_at < idle_ttl
        });
        let evicted = before - entries.len();
        if evicted > 0 {
            info!("session sweep evicted {evicted} of {before} entries");
        }
        evicted
    }

    /// Number of tracked sessions, active or stopped
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
