//! Account models, roles and auth DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Account roles, ordered by privilege
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum Role {
    /// Registered community member
    User,
    /// Leader of an organization
    ChefeOrganizacao,
    /// Reviews applications
    Moderator,
    /// Manages users and organizations
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::User,
        Role::ChefeOrganizacao,
        Role::Moderator,
        Role::Admin,
    ];

    /// Privilege level (higher = more permissions)
    pub fn level(&self) -> u8 {
        match self {
            Role::User => 1,
            Role::ChefeOrganizacao => 2,
            Role::Moderator => 3,
            Role::Admin => 4,
        }
    }

    /// Check if this role has at least the privileges of `required`
    pub fn has_at_least(&self, required: Role) -> bool {
        self.level() >= required.level()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::ChefeOrganizacao => "chefe_organizacao",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }

    /// Display name shown to players
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "Utilizador",
            Role::ChefeOrganizacao => "Chefe de Organização",
            Role::Moderator => "Moderador",
            Role::Admin => "Administrador",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "chefe_organizacao" => Ok(Role::ChefeOrganizacao),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub active: bool,
    pub discord_username: Option<String>,
    pub failed_login_attempts: i64,
    pub locked_until: Option<String>,
    pub last_login: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Public projection of a user; never carries the password hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub discord_username: Option<String>,
    #[serde(default)]
    pub last_login: Option<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            discord_username: user.discord_username,
            last_login: user.last_login,
        }
    }
}

/// Row for the admin user listing, with the organization the user leads
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserView {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
    pub discord_username: Option<String>,
    pub failed_login_attempts: i64,
    pub locked_until: Option<String>,
    pub last_login: Option<String>,
    pub created_at: String,
    pub organization_id: Option<String>,
    pub organization_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub user: UserResponse,
}

/// Self-service profile update
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub discord_username: Option<String>,
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

/// Admin request to create an account with any role
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: String,
    /// Organization to put under this user's lead (chefe_organizacao only)
    pub organization_id: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Admin request to edit an account; absent fields are left untouched
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub active: Option<bool>,
    /// Password reset; blank values are ignored
    pub password: Option<String>,
    pub organization_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserStatusRequest {
    pub active: bool,
}

/// Query parameters for the admin user listing
#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub search: Option<String>,
    pub role: Option<String>,
}
