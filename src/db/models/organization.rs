//! Organization models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub color_hex: String,
    pub icon: String,
    pub accepts_applications: bool,
    pub active: bool,
    pub chief_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Organization {
    /// Whether the public may currently submit applications
    pub fn is_open_for_applications(&self) -> bool {
        self.active && self.accepts_applications
    }
}

/// Organization row joined with the chief's username
#[derive(Debug, Clone, FromRow)]
pub struct OrganizationRow {
    #[sqlx(flatten)]
    pub organization: Organization,
    pub chief_username: Option<String>,
}

/// Organization with its ordered requirement and benefit lists inlined
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationResponse {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub color_hex: String,
    pub icon: String,
    pub requirements: Vec<String>,
    pub benefits: Vec<String>,
    pub accepts_applications: bool,
    pub active: bool,
    pub chief_id: Option<String>,
    #[serde(default)]
    pub chief_username: Option<String>,
    pub created_at: String,
}

impl OrganizationResponse {
    pub fn from_row(row: OrganizationRow, requirements: Vec<String>, benefits: Vec<String>) -> Self {
        let org = row.organization;
        Self {
            id: org.id,
            name: org.name,
            slug: org.slug,
            description: org.description,
            color_hex: org.color_hex,
            icon: org.icon,
            requirements,
            benefits,
            accepts_applications: org.accepts_applications,
            active: org.active,
            chief_id: org.chief_id,
            chief_username: row.chief_username,
            created_at: org.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganizationRequest {
    pub name: String,
    pub description: String,
    pub color_hex: String,
    #[serde(default)]
    pub icon: Option<String>,
    pub requirements: Vec<String>,
    pub benefits: Vec<String>,
    #[serde(default = "default_true")]
    pub accepts_applications: bool,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub chief_id: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Partial update; the slug is never changed after creation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrganizationRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color_hex: Option<String>,
    pub icon: Option<String>,
    pub requirements: Option<Vec<String>>,
    pub benefits: Option<Vec<String>>,
    pub accepts_applications: Option<bool>,
    pub active: Option<bool>,
    pub chief_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrganizationStatusRequest {
    pub active: Option<bool>,
    pub accepts_applications: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganizationResponse {
    pub success: bool,
    pub organization: OrganizationResponse,
}
