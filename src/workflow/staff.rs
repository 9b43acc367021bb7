//! Staff recruitment applications.

use chrono::Utc;
use tracing::info;

use super::WorkflowError;
use crate::auth::normalize_email;
use crate::db::{format_timestamp, DbPool, StaffApplication, StaffApplicationStatus, SubmitStaffApplicationRequest};

#[derive(Clone)]
pub struct StaffApplications {
    db: DbPool,
}

impl StaffApplications {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn submit(&self, req: SubmitStaffApplicationRequest) -> Result<String, WorkflowError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = format_timestamp(Utc::now());

        sqlx::query(
            "INSERT INTO staff_applications \
             (id, name, email, age, discord_username, experience, motivation, hours_per_week, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(req.name.trim())
        .bind(normalize_email(&req.email))
        .bind(req.age)
        .bind(req.discord_username.trim())
        .bind(req.experience.trim())
        .bind(req.motivation.trim())
        .bind(req.hours_per_week)
        .bind(&now)
        .bind(&now)
        .execute(&self.db)
        .await?;

        info!(application_id = %id, "Staff application submitted");
        Ok(id)
    }

    pub async fn list(&self) -> Result<Vec<StaffApplication>, WorkflowError> {
        let rows = sqlx::query_as(
            "SELECT id, name, email, age, discord_username, experience, motivation, hours_per_week, \
                 status, reviewed_by, reviewed_at, created_at \
             FROM staff_applications ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    pub async fn set_status(
        &self,
        application_id: &str,
        status: StaffApplicationStatus,
        reviewer_id: &str,
    ) -> Result<(), WorkflowError> {
        let now = format_timestamp(Utc::now());
        let result = sqlx::query(
            "UPDATE staff_applications SET status = ?, reviewed_by = ?, reviewed_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(status)
        .bind(reviewer_id)
        .bind(&now)
        .bind(&now)
        .bind(application_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(WorkflowError::ApplicationNotFound);
        }

        info!(application_id = %application_id, ?status, "Staff application reviewed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;

    fn request(name: &str) -> SubmitStaffApplicationRequest {
        SubmitStaffApplicationRequest {
            name: name.to_string(),
            email: "Staff@Example.com".to_string(),
            age: 24,
            discord_username: "staff#0001".to_string(),
            experience: "Dois anos como moderador num servidor de roleplay com 200 jogadores.".to_string(),
            motivation: "Quero ajudar a manter a comunidade saudável e acolhedora para todos.".to_string(),
            hours_per_week: 15,
        }
    }

    #[tokio::test]
    async fn test_submit_list_and_review() {
        let db = connect_in_memory().await.unwrap();
        sqlx::query("INSERT INTO users (id, username, email, password_hash, role) VALUES ('m1', 'mod', 'mod@x.pt', 'h', 'moderator')")
            .execute(&db)
            .await
            .unwrap();
        let staff = StaffApplications::new(db);

        let first = staff.submit(request("Ana")).await.unwrap();
        let second = staff.submit(request("Bruno")).await.unwrap();

        let listed = staff.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second);
        assert_eq!(listed[1].email, "staff@example.com");
        assert_eq!(listed[1].status, StaffApplicationStatus::Pending);

        staff.set_status(&first, StaffApplicationStatus::Approved, "m1").await.unwrap();
        let listed = staff.list().await.unwrap();
        let reviewed = listed.iter().find(|a| a.id == first).unwrap();
        assert_eq!(reviewed.status, StaffApplicationStatus::Approved);
        assert_eq!(reviewed.reviewed_by.as_deref(), Some("m1"));
        assert!(reviewed.reviewed_at.is_some());
    }

    #[tokio::test]
    async fn test_review_unknown_is_not_found() {
        let db = connect_in_memory().await.unwrap();
        let staff = StaffApplications::new(db);
        let result = staff.set_status("nope", StaffApplicationStatus::Rejected, "m1").await;
        assert!(matches!(result, Err(WorkflowError::ApplicationNotFound)));
    }
}
