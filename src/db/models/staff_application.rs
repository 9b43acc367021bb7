//! Staff recruitment application models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum StaffApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl std::str::FromStr for StaffApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(StaffApplicationStatus::Pending),
            "approved" => Ok(StaffApplicationStatus::Approved),
            "rejected" => Ok(StaffApplicationStatus::Rejected),
            _ => Err(format!("Unknown staff application status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StaffApplication {
    pub id: String,
    pub name: String,
    pub email: String,
    pub age: i64,
    pub discord_username: String,
    pub experience: String,
    pub motivation: String,
    pub hours_per_week: i64,
    pub status: StaffApplicationStatus,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitStaffApplicationRequest {
    pub name: String,
    pub email: String,
    pub age: i64,
    #[serde(alias = "discord", alias = "discordUsername")]
    pub discord_username: String,
    pub experience: String,
    #[serde(alias = "why", alias = "whyJoin", alias = "why_join")]
    pub motivation: String,
    #[serde(alias = "hours", alias = "hoursPerWeek")]
    pub hours_per_week: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStaffStatusRequest {
    pub status: String,
}
