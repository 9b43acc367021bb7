//! Signed session tokens (HS256 JWT).
//!
//! Tokens are not stored server-side. A token carries the account id,
//! username, email and role; the role is trusted until the token expires.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::AuthError;
use crate::config::AuthConfig;
use crate::db::{Role, User};

/// JWT payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Account id
    pub sub: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated caller, as established from a valid token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            username: claims.username,
            email: claims.email,
            role: claims.role,
        }
    }
}

pub struct TokenService {
    secret: String,
    session_ttl: Duration,
    remember_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: impl Into<String>, session_ttl: Duration, remember_ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            session_ttl,
            remember_ttl,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.jwt_secret.clone(),
            Duration::hours(config.session_hours),
            Duration::days(config.remember_days),
        )
    }

    /// Token lifetime for a login with or without "remember me"
    pub fn lifetime(&self, remember: bool) -> Duration {
        if remember {
            self.remember_ttl
        } else {
            self.session_ttl
        }
    }

    /// Issue a token for `user`, valid from `now`
    pub fn issue(&self, user: &User, remember: bool, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = Claims {
            sub: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.lifetime(remember)).timestamp(),
        };
        self.encode_claims(&claims)
    }

    pub(crate) fn encode_claims(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AuthError::Token(e.to_string()))
    }

    /// Validate signature and expiry. Every failure is `Unauthenticated`.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(error = %e, "Rejected session token");
            AuthError::Unauthenticated
        })
    }

    pub fn verify_identity(&self, token: &str) -> Result<Identity, AuthError> {
        self.verify(token).map(Identity::from)
    }
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("secret", &"<redacted>")
            .field("session_ttl", &self.session_ttl)
            .field("remember_ttl", &self.remember_ttl)
            .finish()
    }
}
