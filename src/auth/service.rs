//! Credential checks, account creation and brute-force lockout.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use super::password::{hash_password_async, verify_password_async};
use super::token::{Identity, TokenService};
use super::AuthError;
use crate::config::AuthConfig;
use crate::db::{format_timestamp, is_unique_violation, parse_timestamp, DbPool, Role, User, UserResponse};

/// How many consecutive failures lock an account, and for how long
#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    pub max_failed_attempts: i64,
    pub lockout: Duration,
}

impl LockoutPolicy {
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            max_failed_attempts: config.max_failed_logins,
            lockout: Duration::minutes(config.lockout_minutes),
        }
    }
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            lockout: Duration::minutes(15),
        }
    }
}

/// Successful login: the session token and the public user projection
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub token: String,
    pub user: UserResponse,
}

/// Account to create, from self-registration, an admin or the seeder
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub active: bool,
}

impl NewAccount {
    /// Self-registration always yields an active `user`
    pub fn registration(username: impl Into<String>, email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            role: Role::User,
            active: true,
        }
    }
}

pub struct AuthService {
    db: DbPool,
    tokens: Arc<TokenService>,
    lockout: LockoutPolicy,
}

impl AuthService {
    pub fn new(db: DbPool, tokens: Arc<TokenService>, lockout: LockoutPolicy) -> Self {
        Self { db, tokens, lockout }
    }

    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
        remember: bool,
    ) -> Result<AuthOutcome, AuthError> {
        self.authenticate_at(email, password, remember, Utc::now()).await
    }

    /// Check credentials as of `now`.
    ///
    /// A locked account is rejected before the password is looked at. Every
    /// attempt that reaches the hash comparison updates the lockout state.
    pub async fn authenticate_at(
        &self,
        email: &str,
        password: &str,
        remember: bool,
        now: DateTime<Utc>,
    ) -> Result<AuthOutcome, AuthError> {
        let email = normalize_email(email);

        let user: User = sqlx::query_as("SELECT * FROM users WHERE email = ? AND active = 1")
            .bind(&email)
            .fetch_optional(&self.db)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if let Some(retry_after_secs) = remaining_lock(&user, now) {
            warn!(user_id = %user.id, "Login attempt on locked account");
            return Err(AuthError::AccountLocked { retry_after_secs });
        }

        let matches = verify_password_async(password.to_string(), user.password_hash.clone()).await?;

        if !matches {
            return Err(self.record_failure(&user, now).await);
        }

        let now_str = format_timestamp(now);
        let result = sqlx::query(
            "UPDATE users SET failed_login_attempts = 0, locked_until = NULL, last_login = ?1, updated_at = ?1 \
             WHERE id = ?2 AND (locked_until IS NULL OR locked_until <= ?1)",
        )
        .bind(&now_str)
        .bind(&user.id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            // Another request locked the account between the read and now
            return Err(self.current_lock_error(&user.id, now).await);
        }

        let token = self.tokens.issue(&user, remember, now)?;

        info!(user_id = %user.id, role = %user.role, "User logged in");

        let mut user = user;
        user.failed_login_attempts = 0;
        user.locked_until = None;
        user.last_login = Some(now_str);

        Ok(AuthOutcome {
            token,
            user: UserResponse::from(user),
        })
    }

    /// Bump the failure counter atomically, locking the account when the
    /// threshold is reached. An expired lock restarts the count.
    async fn record_failure(&self, user: &User, now: DateTime<Utc>) -> AuthError {
        let now_str = format_timestamp(now);
        let lock_until = format_timestamp(now + self.lockout.lockout);

        let row: Result<Option<(i64, Option<String>)>, sqlx::Error> = sqlx::query_as(
            "UPDATE users SET \
                 failed_login_attempts = CASE WHEN locked_until IS NOT NULL THEN 1 ELSE failed_login_attempts + 1 END, \
                 locked_until = CASE WHEN (CASE WHEN locked_until IS NOT NULL THEN 1 ELSE failed_login_attempts + 1 END) >= ?1 \
                     THEN ?2 ELSE NULL END, \
                 updated_at = ?3 \
             WHERE id = ?4 AND (locked_until IS NULL OR locked_until <= ?3) \
             RETURNING failed_login_attempts, locked_until",
        )
        .bind(self.lockout.max_failed_attempts)
        .bind(&lock_until)
        .bind(&now_str)
        .bind(&user.id)
        .fetch_optional(&self.db)
        .await;

        match row {
            Ok(Some((attempts, locked_until))) => {
                if locked_until.is_some() {
                    warn!(user_id = %user.id, attempts, "Account locked after repeated login failures");
                } else {
                    warn!(user_id = %user.id, attempts, "Failed login attempt");
                }
                AuthError::InvalidCredentials
            }
            Ok(None) => self.current_lock_error(&user.id, now).await,
            Err(e) => AuthError::Database(e),
        }
    }

    async fn current_lock_error(&self, user_id: &str, now: DateTime<Utc>) -> AuthError {
        let user: Result<Option<User>, sqlx::Error> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await;

        match user {
            Ok(Some(user)) => match remaining_lock(&user, now) {
                Some(retry_after_secs) => AuthError::AccountLocked { retry_after_secs },
                None => AuthError::InvalidCredentials,
            },
            Ok(None) => AuthError::InvalidCredentials,
            Err(e) => AuthError::Database(e),
        }
    }

    /// Self-registration. Returns the new account id.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<String, AuthError> {
        let user = self
            .create_account(NewAccount::registration(username, email, password))
            .await?;
        Ok(user.id)
    }

    /// Insert a new account with zeroed lockout counters
    pub async fn create_account(&self, account: NewAccount) -> Result<User, AuthError> {
        let email = normalize_email(&account.email);
        let username = account.username.trim().to_string();

        let existing: Option<(String,)> =
            sqlx::query_as("SELECT id FROM users WHERE email = ? OR username = ?")
                .bind(&email)
                .bind(&username)
                .fetch_optional(&self.db)
                .await?;
        if existing.is_some() {
            return Err(duplicate_account());
        }

        let password_hash = hash_password_async(account.password).await?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = format_timestamp(Utc::now());

        let inserted = sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, role, active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&username)
        .bind(&email)
        .bind(&password_hash)
        .bind(account.role)
        .bind(account.active)
        .bind(&now)
        .bind(&now)
        .execute(&self.db)
        .await;

        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Err(duplicate_account()),
            Err(e) => return Err(e.into()),
        }

        info!(user_id = %id, role = %account.role, "Account created");

        Ok(User {
            id,
            username,
            email,
            password_hash,
            role: account.role,
            active: account.active,
            discord_username: None,
            failed_login_attempts: 0,
            locked_until: None,
            last_login: None,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub fn verify_token(&self, token: &str) -> Result<Identity, AuthError> {
        self.tokens.verify_identity(token)
    }

    /// The live account behind an identity; deactivated or deleted accounts
    /// no longer count as authenticated
    pub async fn current_user(&self, identity: &Identity) -> Result<User, AuthError> {
        sqlx::query_as("SELECT * FROM users WHERE id = ? AND active = 1")
            .bind(&identity.user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(AuthError::Unauthenticated)
    }

    /// Change one's own password; the current password must match
    pub async fn change_password(
        &self,
        user_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(AuthError::NotFound)?;

        if !verify_password_async(current_password.to_string(), user.password_hash).await? {
            return Err(AuthError::InvalidCredentials);
        }

        self.reset_password(user_id, new_password).await
    }

    /// Set a new password without checking the old one (admin reset)
    pub async fn reset_password(&self, user_id: &str, new_password: &str) -> Result<(), AuthError> {
        let password_hash = hash_password_async(new_password.to_string()).await?;

        let result = sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(&password_hash)
            .bind(format_timestamp(Utc::now()))
            .bind(user_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound);
        }

        info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    /// Toggle the active flag. Any status change also clears lockout state.
    pub async fn set_active(&self, user_id: &str, active: bool) -> Result<(), AuthError> {
        let result = sqlx::query(
            "UPDATE users SET active = ?, failed_login_attempts = 0, locked_until = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(active)
        .bind(format_timestamp(Utc::now()))
        .bind(user_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound);
        }

        info!(user_id = %user_id, active, "Account status changed");
        Ok(())
    }
}

/// Emails are compared case-insensitively
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn duplicate_account() -> AuthError {
    AuthError::Conflict("Email ou username já existe".to_string())
}

/// Seconds left on the account's lock at `now`, if it is locked
fn remaining_lock(user: &User, now: DateTime<Utc>) -> Option<i64> {
    let until = user.locked_until.as_deref().and_then(parse_timestamp)?;
    if until > now {
        Some((until - now).num_seconds().max(1))
    } else {
        None
    }
}
