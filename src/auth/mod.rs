//! Authentication and authorization.
//!
//! Password hashing, signed session tokens, the credential-checking service
//! with brute-force lockout, the admin user directory and the role
//! hierarchy policy.

pub mod accounts;
pub mod password;
pub mod policy;
pub mod service;
pub mod token;

pub use accounts::{AccountChanges, UserDirectory};
pub use password::{hash_password, verify_password};
pub use policy::{has_role, require_exact, require_role};
pub use service::{normalize_email, AuthOutcome, AuthService, LockoutPolicy, NewAccount};
pub use token::{Claims, Identity, TokenService};

use crate::db::Role;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Unknown email, inactive account or wrong password
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account locked, try again in {retry_after_secs} seconds")]
    AccountLocked { retry_after_secs: i64 },

    #[error("{0}")]
    Conflict(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Requires role {required}, current role is {held}")]
    Forbidden { held: Role, required: Role },

    #[error("User not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Token encoding failed: {0}")]
    Token(String),
}
