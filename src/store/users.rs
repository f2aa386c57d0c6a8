//! User account persistence
//!
//! The users table backs the account service: unique username/email,
//! hashed credentials, activation state, and the single outstanding
//! password-reset token per user.

use super::{parse_ts, to_ts, RecordStore};
use crate::error::EngineError;
use crate::types::User;
use chrono::{DateTime, Utc};
use log::info;
use rusqlite::{params, OptionalExtension, Row};

/// Input for account creation; the password is already hashed by the
/// time it reaches the store.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Optional field updates; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

/// A user row including credential material. Internal to the engine;
/// the public [`User`] type omits the hash and token fields.
#[derive(Debug, Clone)]
pub struct StoredUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub reset_token: Option<String>,
    pub reset_token_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredUser {
    pub fn to_public(&self) -> User {
        User {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, is_active,
                            reset_token, reset_token_expires, created_at, updated_at";

impl RecordStore {
    /// Insert a new user. The UNIQUE constraints are the race backstop
    /// behind the service-level duplicate checks; a violation surfaces
    /// as a conflict, not a storage fault.
    pub fn insert_user(&self, user: &NewUser, now: DateTime<Utc>) -> Result<User, EngineError> {
        self.with_conn(|conn| {
            let result = conn.execute(
                "INSERT INTO users (username, email, password_hash, is_active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 1, ?4, ?4)",
                params![user.username, user.email, user.password_hash, to_ts(now)],
            );

            match result {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => {
                    return Err(EngineError::Conflict(
                        "username or email already registered".to_string(),
                    ));
                }
                Err(e) => return Err(e.into()),
            }

            let id = conn.last_insert_rowid();
            info!("registered user {id} ({})", user.username);
            Ok(User {
                id,
                username: user.username.clone(),
                email: user.email.clone(),
                is_active: true,
                created_at: now,
                updated_at: now,
            })
        })
    }

    pub fn user_by_id(&self, id: i64) -> Result<Option<StoredUser>, EngineError> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                user_from_row,
            )
            .optional()?
            .transpose()
        })
    }

    pub fn user_by_email(&self, email: &str) -> Result<Option<StoredUser>, EngineError> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
                user_from_row,
            )
            .optional()?
            .transpose()
        })
    }

    pub fn user_by_username(&self, username: &str) -> Result<Option<StoredUser>, EngineError> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                params![username],
                user_from_row,
            )
            .optional()?
            .transpose()
        })
    }

    /// Apply field changes and bump `updated_at`.
    pub fn update_user(
        &self,
        id: i64,
        changes: &UserChanges,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        self.with_conn(|conn| {
            let result = conn.execute(
                "UPDATE users SET
                    username = COALESCE(?1, username),
                    email = COALESCE(?2, email),
                    password_hash = COALESCE(?3, password_hash),
                    updated_at = ?4
                 WHERE id = ?5",
                params![
                    changes.username,
                    changes.email,
                    changes.password_hash,
                    to_ts(now),
                    id
                ],
            );

            match result {
                Ok(0) => Err(EngineError::NotFound(format!("user {id}"))),
                Ok(_) => Ok(()),
                Err(e) if is_unique_violation(&e) => Err(EngineError::Conflict(
                    "username or email already registered".to_string(),
                )),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Store a password-reset token and its expiry on the user row;
    /// a newer token replaces any outstanding one.
    pub fn set_reset_token(
        &self,
        user_id: i64,
        token: &str,
        expires: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE users SET reset_token = ?1, reset_token_expires = ?2 WHERE id = ?3",
                params![token, to_ts(expires), user_id],
            )?;
            if updated == 0 {
                return Err(EngineError::NotFound(format!("user {user_id}")));
            }
            Ok(())
        })
    }

    pub fn user_by_reset_token(&self, token: &str) -> Result<Option<StoredUser>, EngineError> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE reset_token = ?1"),
                params![token],
                user_from_row,
            )
            .optional()?
            .transpose()
        })
    }

    /// Replace the password hash and clear any reset token.
    pub fn set_password_hash(
        &self,
        user_id: i64,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE users SET password_hash = ?1, reset_token = NULL,
                        reset_token_expires = NULL, updated_at = ?2
                 WHERE id = ?3",
                params![password_hash, to_ts(now), user_id],
            )?;
            if updated == 0 {
                return Err(EngineError::NotFound(format!("user {user_id}")));
            }
            Ok(())
        })
    }

    /// Delete a user and cascade to their records. The only path that
    /// removes posture records.
    pub fn delete_user(&self, user_id: i64) -> Result<(), EngineError> {
        self.with_conn(|conn| {
            let removed_records = self.delete_records_for_user(conn, user_id)?;
            let removed = conn.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;
            if removed == 0 {
                return Err(EngineError::NotFound(format!("user {user_id}")));
            }
            info!("deleted user {user_id} and {removed_records} records");
            Ok(())
        })
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<Result<StoredUser, EngineError>> {
    let created_at_raw: String = row.get(7)?;
    let updated_at_raw: String = row.get(8)?;
    let reset_expires_raw: Option<String> = row.get(6)?;

    Ok((|| {
        Ok(StoredUser {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            is_active: row.get(4)?,
            reset_token: row.get(5)?,
            reset_token_expires: reset_expires_raw.as_deref().map(parse_ts).transpose()?,
            created_at: parse_ts(&created_at_raw)?,
            updated_at: parse_ts(&updated_at_raw)?,
        })
    })())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewRecord;
    use crate::types::Measurement;
    use chrono::Duration;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: format!("hashed:{username}"),
        }
    }

    #[test]
    fn insert_and_lookup() {
        let store = RecordStore::open_in_memory().unwrap();
        let now = Utc::now();

        let user = store.insert_user(&new_user("ana", "ana@example.com"), now).unwrap();
        assert!(user.id > 0);
        assert!(user.is_active);

        let by_email = store.user_by_email("ana@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        assert_eq!(by_email.password_hash, "hashed:ana");

        let by_name = store.user_by_username("ana").unwrap().unwrap();
        assert_eq!(by_name.id, user.id);

        assert!(store.user_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn unique_constraints_surface_as_conflict() {
        let store = RecordStore::open_in_memory().unwrap();
        let now = Utc::now();

        store.insert_user(&new_user("ana", "ana@example.com"), now).unwrap();

        let same_email = store.insert_user(&new_user("other", "ana@example.com"), now);
        assert!(matches!(same_email, Err(EngineError::Conflict(_))));

        let same_username = store.insert_user(&new_user("ana", "other@example.com"), now);
        assert!(matches!(same_username, Err(EngineError::Conflict(_))));
    }

    #[test]
    fn update_applies_only_set_fields() {
        let store = RecordStore::open_in_memory().unwrap();
        let now = Utc::now();
        let user = store.insert_user(&new_user("ana", "ana@example.com"), now).unwrap();

        let changes = UserChanges {
            email: Some("ana@new.example.com".to_string()),
            ..Default::default()
        };
        store
            .update_user(user.id, &changes, now + Duration::seconds(5))
            .unwrap();

        let stored = store.user_by_id(user.id).unwrap().unwrap();
        assert_eq!(stored.email, "ana@new.example.com");
        assert_eq!(stored.username, "ana");
        assert_eq!(stored.password_hash, "hashed:ana");
        assert!(stored.updated_at > stored.created_at);
    }

    #[test]
    fn reset_token_roundtrip_and_clear() {
        let store = RecordStore::open_in_memory().unwrap();
        let now = Utc::now();
        let user = store.insert_user(&new_user("ana", "ana@example.com"), now).unwrap();

        store
            .set_reset_token(user.id, "tok-123", now + Duration::hours(1))
            .unwrap();

        let found = store.user_by_reset_token("tok-123").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(found.reset_token_expires.unwrap() > now);

        store.set_password_hash(user.id, "hashed:new", now).unwrap();
        assert!(store.user_by_reset_token("tok-123").unwrap().is_none());

        let stored = store.user_by_id(user.id).unwrap().unwrap();
        assert_eq!(stored.password_hash, "hashed:new");
        assert!(stored.reset_token.is_none());
    }

    #[test]
    fn delete_cascades_to_records() {
        let store = RecordStore::open_in_memory().unwrap();
        let now = Utc::now();
        let user = store.insert_user(&new_user("ana", "ana@example.com"), now).unwrap();

        let m = Measurement {
            user_id: user.id,
            session_id: "sess".to_string(),
            device_info: None,
            timestamp: None,
            neck_angle: 0.0,
            shoulder_slope: 0.0,
            head_forward: 0.0,
            shoulder_height_diff: 0.0,
            score: 70.0,
            cervical_lordosis: 0.0,
            forward_head_distance: 0.0,
            head_tilt: 0.0,
            left_shoulder_height_diff: 0.0,
            left_scapular_winging: 0.0,
            right_scapular_winging: 0.0,
            shoulder_forward_movement: 0.0,
            head_rotation: 0.0,
            issues: vec![],
        };
        store
            .insert_record(&NewRecord {
                measurement: m,
                is_neck_angle_normal: true,
                is_forward_head_normal: true,
                is_head_tilt_normal: true,
                created_at: now,
            })
            .unwrap();

        store.delete_user(user.id).unwrap();

        assert!(store.user_by_id(user.id).unwrap().is_none());
        assert!(store
            .records_for_user(user.id, None, None, 100)
            .unwrap()
            .is_empty());

        // Deleting again reports not-found
        assert!(matches!(
            store.delete_user(user.id),
            Err(EngineError::NotFound(_))
        ));
    }
}
