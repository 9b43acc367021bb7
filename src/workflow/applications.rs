//! Organization application lifecycle: submit, review, query.

use chrono::{DateTime, Utc};
use tracing::info;

use super::organizations::find_organization;
use super::WorkflowError;
use crate::auth::normalize_email;
use crate::db::{
    format_timestamp, is_unique_violation, like_pattern, ApplicationQuery, ApplicationStats, ApplicationStatus,
    ApplicationView, DbPool, SubmitApplicationRequest,
};

const SELECT_APPLICATION: &str = "SELECT a.id, a.organization_id, \
         o.name AS organization_name, o.color_hex AS organization_color, \
         a.character_name, a.player_name, a.email, a.discord_username, \
         a.character_age, a.hours_played, a.prior_experience, a.motivation, \
         a.availability, a.additional_info, a.status, a.admin_notes, \
         a.reviewed_by, u.username AS reviewed_by_username, a.reviewed_at, a.created_at \
     FROM organization_applications a \
     JOIN organizations o ON o.id = a.organization_id \
     LEFT JOIN users u ON u.id = a.reviewed_by";

#[derive(Clone)]
pub struct ApplicationWorkflow {
    db: DbPool,
}

impl ApplicationWorkflow {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Public submission against an organization, addressed by id or slug.
    ///
    /// Only one open (`pendente` or `em_analise`) application may exist per
    /// organization and email; the partial unique index settles races.
    pub async fn submit(
        &self,
        organization: &str,
        req: SubmitApplicationRequest,
    ) -> Result<String, WorkflowError> {
        let org = find_organization(&self.db, organization)
            .await?
            .filter(|org| org.active)
            .ok_or(WorkflowError::OrganizationNotFound)?;

        if !org.is_open_for_applications() {
            return Err(WorkflowError::NotAccepting);
        }

        let email = normalize_email(&req.email);

        let open: Option<(String,)> = sqlx::query_as(
            "SELECT id FROM organization_applications \
             WHERE organization_id = ? AND lower(email) = ? AND status IN ('pendente', 'em_analise')",
        )
        .bind(&org.id)
        .bind(&email)
        .fetch_optional(&self.db)
        .await?;
        if open.is_some() {
            return Err(duplicate_open_application());
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = format_timestamp(Utc::now());

        let inserted = sqlx::query(
            "INSERT INTO organization_applications \
             (id, organization_id, character_name, player_name, email, discord_username, character_age, \
              hours_played, prior_experience, motivation, availability, additional_info, status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'pendente', ?, ?)",
        )
        .bind(&id)
        .bind(&org.id)
        .bind(req.character_name.trim())
        .bind(req.player_name.trim())
        .bind(&email)
        .bind(req.discord_username.trim())
        .bind(req.character_age)
        .bind(req.hours_played)
        .bind(optional_text(req.prior_experience.as_deref()))
        .bind(req.motivation.trim())
        .bind(optional_text(req.availability.as_deref()))
        .bind(optional_text(req.additional_info.as_deref()))
        .bind(&now)
        .bind(&now)
        .execute(&self.db)
        .await;

        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Err(duplicate_open_application()),
            Err(e) => return Err(e.into()),
        }

        info!(application_id = %id, organization = %org.slug, "Application submitted");
        Ok(id)
    }

    pub async fn set_status(
        &self,
        application_id: &str,
        status: ApplicationStatus,
        notes: Option<String>,
        reviewer_id: &str,
    ) -> Result<ApplicationView, WorkflowError> {
        self.set_status_at(application_id, status, notes, reviewer_id, Utc::now())
            .await
    }

    /// Move an application to `status`. Reviewer and decision time are
    /// always written together; notes are only overwritten when given.
    pub async fn set_status_at(
        &self,
        application_id: &str,
        status: ApplicationStatus,
        notes: Option<String>,
        reviewer_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ApplicationView, WorkflowError> {
        let now = format_timestamp(now);

        let result = sqlx::query(
            "UPDATE organization_applications SET status = ?, admin_notes = COALESCE(?, admin_notes), \
                 reviewed_by = ?, reviewed_at = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(status)
        .bind(notes.as_deref())
        .bind(reviewer_id)
        .bind(&now)
        .bind(&now)
        .bind(application_id)
        .execute(&self.db)
        .await;

        let result = match result {
            Ok(result) => result,
            // Reopening while a newer open application exists for the same email
            Err(e) if is_unique_violation(&e) => return Err(duplicate_open_application()),
            Err(e) => return Err(e.into()),
        };

        if result.rows_affected() == 0 {
            return Err(WorkflowError::ApplicationNotFound);
        }

        info!(
            application_id = %application_id,
            status = %status,
            reviewer_id = %reviewer_id,
            "Application status changed"
        );
        self.get(application_id).await
    }

    pub async fn get(&self, application_id: &str) -> Result<ApplicationView, WorkflowError> {
        let sql = format!("{} WHERE a.id = ?", SELECT_APPLICATION);
        sqlx::query_as(&sql)
            .bind(application_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(WorkflowError::ApplicationNotFound)
    }

    /// Filtered listing, newest first
    pub async fn list(&self, query: &ApplicationQuery) -> Result<Vec<ApplicationView>, WorkflowError> {
        let mut conditions = Vec::new();
        let mut bindings: Vec<String> = Vec::new();

        if let Some(organization) = query.organization.as_deref().filter(|s| !s.is_empty()) {
            conditions.push("(o.id = ? OR o.slug = ?)".to_string());
            bindings.push(organization.to_string());
            bindings.push(organization.to_string());
        }

        if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
            let status: ApplicationStatus = status
                .parse()
                .map_err(|e: String| WorkflowError::invalid("status", e))?;
            conditions.push("a.status = ?".to_string());
            bindings.push(status.as_str().to_string());
        }

        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            conditions.push(
                "(lower(a.character_name) LIKE ? ESCAPE '\\' OR lower(a.player_name) LIKE ? ESCAPE '\\' \
                  OR lower(a.email) LIKE ? ESCAPE '\\' OR lower(o.name) LIKE ? ESCAPE '\\')"
                    .to_string(),
            );
            let pattern = like_pattern(search);
            for _ in 0..4 {
                bindings.push(pattern.clone());
            }
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "{} {} ORDER BY a.created_at DESC, a.rowid DESC",
            SELECT_APPLICATION, where_clause
        );
        let mut query_builder = sqlx::query_as::<_, ApplicationView>(&sql);
        for binding in &bindings {
            query_builder = query_builder.bind(binding);
        }

        Ok(query_builder.fetch_all(&self.db).await?)
    }

    /// Count of applications in each state
    pub async fn stats(&self) -> Result<ApplicationStats, WorkflowError> {
        let rows: Vec<(ApplicationStatus, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM organization_applications GROUP BY status",
        )
        .fetch_all(&self.db)
        .await?;

        let mut stats = ApplicationStats::default();
        for (status, count) in rows {
            stats.total += count;
            match status {
                ApplicationStatus::Pendente => stats.pendente = count,
                ApplicationStatus::EmAnalise => stats.em_analise = count,
                ApplicationStatus::Aprovada => stats.aprovada = count,
                ApplicationStatus::Rejeitada => stats.rejeitada = count,
            }
        }
        Ok(stats)
    }
}

fn optional_text(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn duplicate_open_application() -> WorkflowError {
    WorkflowError::Conflict("Já existe uma candidatura pendente com este email".to_string())
}
