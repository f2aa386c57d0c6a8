//! User account management
//!
//! Registration, authentication, profile updates, password reset, and
//! account deletion. Hashing and token signing are external
//! collaborators injected behind the [`PasswordHasher`] seam; this
//! module owns the flows around them.

use crate::error::EngineError;
use crate::store::{NewUser, RecordStore, UserChanges};
use crate::types::User;
use chrono::{DateTime, Duration, Utc};
use log::debug;
use uuid::Uuid;

/// How long a password-reset token stays valid
pub const RESET_TOKEN_TTL_HOURS: i64 = 1;

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 50;
const PASSWORD_MIN: usize = 6;

/// Credential hashing seam. The engine never sees hashing internals;
/// production wires a bcrypt/argon2 implementation here.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> String;
    fn verify(&self, password: &str, hash: &str) -> bool;
}

/// Registration input (plaintext password; hashed before storage)
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Profile update input; unset fields are left unchanged
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// A pending password reset, handed to the mail collaborator.
///
/// Never returned to the requesting client: the outward response is
/// identical whether or not the email was known.
#[derive(Debug, Clone)]
pub struct ResetTicket {
    pub user_id: i64,
    pub email: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Account flows over the store and the injected hasher
pub struct AccountService<'a> {
    store: &'a RecordStore,
    hasher: &'a dyn PasswordHasher,
}

impl<'a> AccountService<'a> {
    pub fn new(store: &'a RecordStore, hasher: &'a dyn PasswordHasher) -> Self {
        Self { store, hasher }
    }

    /// Register a new account. Duplicate email or username is a
    /// conflict detected before the insert; the table's UNIQUE
    /// constraints backstop the check-then-insert race.
    pub fn register(&self, input: &Registration, now: DateTime<Utc>) -> Result<User, EngineError> {
        validate_username(&input.username)?;
        validate_email(&input.email)?;
        validate_password(&input.password)?;

        if self.store.user_by_email(&input.email)?.is_some() {
            return Err(EngineError::Conflict("email already registered".to_string()));
        }
        if self.store.user_by_username(&input.username)?.is_some() {
            return Err(EngineError::Conflict(
                "username already registered".to_string(),
            ));
        }

        self.store.insert_user(
            &NewUser {
                username: input.username.clone(),
                email: input.email.clone(),
                password_hash: self.hasher.hash(&input.password),
            },
            now,
        )
    }

    /// Verify credentials by email. Returns `None` for unknown email,
    /// wrong password, or an inactive account; the caller issues the
    /// access token.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>, EngineError> {
        let Some(stored) = self.store.user_by_email(email)? else {
            return Ok(None);
        };
        if !stored.is_active || !self.hasher.verify(password, &stored.password_hash) {
            return Ok(None);
        }
        Ok(Some(stored.to_public()))
    }

    pub fn get(&self, user_id: i64) -> Result<User, EngineError> {
        self.store
            .user_by_id(user_id)?
            .map(|u| u.to_public())
            .ok_or_else(|| EngineError::NotFound(format!("user {user_id}")))
    }

    /// Update profile fields, re-checking uniqueness on change.
    pub fn update(
        &self,
        user_id: i64,
        update: &ProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<User, EngineError> {
        let current = self
            .store
            .user_by_id(user_id)?
            .ok_or_else(|| EngineError::NotFound(format!("user {user_id}")))?;

        if let Some(email) = &update.email {
            validate_email(email)?;
            if email != &current.email && self.store.user_by_email(email)?.is_some() {
                return Err(EngineError::Conflict("email already registered".to_string()));
            }
        }
        if let Some(username) = &update.username {
            validate_username(username)?;
            if username != &current.username && self.store.user_by_username(username)?.is_some() {
                return Err(EngineError::Conflict(
                    "username already registered".to_string(),
                ));
            }
        }
        if let Some(password) = &update.password {
            validate_password(password)?;
        }

        self.store.update_user(
            user_id,
            &UserChanges {
                username: update.username.clone(),
                email: update.email.clone(),
                password_hash: update.password.as_deref().map(|p| self.hasher.hash(p)),
            },
            now,
        )?;
        self.get(user_id)
    }

    /// Begin a password reset. Always succeeds from the caller's point
    /// of view; the ticket is `Some` only when the email matched an
    /// account, and goes to the mail collaborator, never to the client.
    pub fn request_password_reset(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ResetTicket>, EngineError> {
        let Some(user) = self.store.user_by_email(email)? else {
            debug!("password reset requested for unknown email");
            return Ok(None);
        };

        let token = Uuid::new_v4().to_string();
        let expires_at = now + Duration::hours(RESET_TOKEN_TTL_HOURS);
        self.store.set_reset_token(user.id, &token, expires_at)?;

        Ok(Some(ResetTicket {
            user_id: user.id,
            email: user.email,
            token,
            expires_at,
        }))
    }

    /// Complete a password reset with a previously issued token.
    pub fn confirm_password_reset(
        &self,
        token: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        validate_password(new_password)?;

        let Some(user) = self.store.user_by_reset_token(token)? else {
            return Err(EngineError::Validation(
                "invalid or expired reset token".to_string(),
            ));
        };

        let expired = user
            .reset_token_expires
            .map(|expires| expires <= now)
            .unwrap_or(true);
        if expired {
            return Err(EngineError::Validation(
                "invalid or expired reset token".to_string(),
            ));
        }

        self.store
            .set_password_hash(user.id, &self.hasher.hash(new_password), now)
    }

    /// Delete an account and every record it owns.
    pub fn delete(&self, user_id: i64) -> Result<(), EngineError> {
        self.store.delete_user(user_id)
    }
}

fn validate_username(username: &str) -> Result<(), EngineError> {
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(EngineError::Validation(format!(
            "username must be {USERNAME_MIN}-{USERNAME_MAX} characters"
        )));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), EngineError> {
    let valid = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
        .unwrap_or(false);
    if !valid {
        return Err(EngineError::Validation("invalid email address".to_string()));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), EngineError> {
    if password.chars().count() < PASSWORD_MIN {
        return Err(EngineError::Validation(format!(
            "password must be at least {PASSWORD_MIN} characters"
        )));
    }
    Ok(())
}
