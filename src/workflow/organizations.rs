//! Organization catalogue: public listing and admin management.

use chrono::Utc;
use sqlx::{Sqlite, Transaction};
use std::collections::HashMap;
use tracing::info;

use super::WorkflowError;
use crate::db::{
    format_timestamp, is_unique_violation, CreateOrganizationRequest, DbPool, Organization,
    OrganizationResponse, OrganizationRow, UpdateOrganizationRequest,
    UpdateOrganizationStatusRequest,
};

const SELECT_ORGANIZATION: &str = "SELECT o.*, u.username AS chief_username \
     FROM organizations o LEFT JOIN users u ON u.id = o.chief_id";

/// Derive a URL slug from a display name, folding Portuguese diacritics
pub fn generate_slug(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            'ñ' => 'n',
            c if c.is_ascii_alphanumeric() => c,
            _ => '-',
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Organization row by id or slug, active or not
pub(crate) async fn find_organization(db: &DbPool, id_or_slug: &str) -> Result<Option<Organization>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM organizations WHERE id = ? OR slug = ? LIMIT 1")
        .bind(id_or_slug)
        .bind(id_or_slug)
        .fetch_optional(db)
        .await
}

#[derive(Clone)]
pub struct OrganizationStore {
    db: DbPool,
}

impl OrganizationStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Active organizations with their requirement and benefit lists
    pub async fn list_active(&self) -> Result<Vec<OrganizationResponse>, WorkflowError> {
        let sql = format!("{} WHERE o.active = 1 ORDER BY o.name", SELECT_ORGANIZATION);
        let rows: Vec<OrganizationRow> = sqlx::query_as(&sql).fetch_all(&self.db).await?;
        self.attach_lists(rows).await
    }

    /// Every organization, including inactive ones
    pub async fn list_all(&self) -> Result<Vec<OrganizationResponse>, WorkflowError> {
        let sql = format!("{} ORDER BY o.created_at DESC, o.name", SELECT_ORGANIZATION);
        let rows: Vec<OrganizationRow> = sqlx::query_as(&sql).fetch_all(&self.db).await?;
        self.attach_lists(rows).await
    }

    /// Public lookup; inactive organizations are not found
    pub async fn get_active_by_slug(&self, slug: &str) -> Result<OrganizationResponse, WorkflowError> {
        let sql = format!("{} WHERE o.slug = ? AND o.active = 1", SELECT_ORGANIZATION);
        let row: OrganizationRow = sqlx::query_as(&sql)
            .bind(slug)
            .fetch_optional(&self.db)
            .await?
            .ok_or(WorkflowError::OrganizationNotFound)?;
        self.with_lists(row).await
    }

    pub async fn get(&self, id: &str) -> Result<OrganizationResponse, WorkflowError> {
        let sql = format!("{} WHERE o.id = ?", SELECT_ORGANIZATION);
        let row: OrganizationRow = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(WorkflowError::OrganizationNotFound)?;
        self.with_lists(row).await
    }

    /// Resolve an organization by id or slug
    pub async fn find(&self, id_or_slug: &str) -> Result<Option<Organization>, WorkflowError> {
        Ok(find_organization(&self.db, id_or_slug).await?)
    }

    pub async fn create(&self, req: CreateOrganizationRequest) -> Result<OrganizationResponse, WorkflowError> {
        let slug = generate_slug(&req.name);
        if slug.is_empty() {
            return Err(WorkflowError::invalid("name", "Nome não gera um identificador válido"));
        }

        let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM organizations WHERE slug = ?")
            .bind(&slug)
            .fetch_optional(&self.db)
            .await?;
        if existing.is_some() {
            return Err(duplicate_slug(&slug));
        }

        if let Some(chief_id) = non_empty(req.chief_id.as_deref()) {
            self.ensure_user_exists(chief_id).await?;
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = format_timestamp(Utc::now());
        let mut tx = self.db.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO organizations \
             (id, name, slug, description, color_hex, icon, accepts_applications, active, chief_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(req.name.trim())
        .bind(&slug)
        .bind(req.description.trim())
        .bind(&req.color_hex)
        .bind(req.icon.as_deref().unwrap_or("building"))
        .bind(req.accepts_applications)
        .bind(req.active)
        .bind(non_empty(req.chief_id.as_deref()))
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Err(duplicate_slug(&slug)),
            Err(e) => return Err(e.into()),
        }

        replace_lists(&mut tx, &id, Some(req.requirements.as_slice()), Some(req.benefits.as_slice())).await?;
        tx.commit().await?;

        info!(organization_id = %id, slug = %slug, "Organization created");
        self.get(&id).await
    }

    /// Partial update. Provided lists replace the stored ones wholesale; the
    /// slug never changes.
    pub async fn update(
        &self,
        id: &str,
        req: UpdateOrganizationRequest,
    ) -> Result<OrganizationResponse, WorkflowError> {
        // Some("") clears the chief
        let chief = match req.chief_id.as_deref() {
            None => None,
            Some(value) => Some(non_empty(Some(value))),
        };
        if let Some(Some(chief_id)) = chief {
            self.ensure_user_exists(chief_id).await?;
        }

        let mut tx = self.db.begin().await?;

        let result = sqlx::query(
            "UPDATE organizations SET \
                 name = COALESCE(?, name), \
                 description = COALESCE(?, description), \
                 color_hex = COALESCE(?, color_hex), \
                 icon = COALESCE(?, icon), \
                 accepts_applications = COALESCE(?, accepts_applications), \
                 active = COALESCE(?, active), \
                 chief_id = CASE WHEN ? THEN ? ELSE chief_id END, \
                 updated_at = ? \
             WHERE id = ?",
        )
        .bind(req.name.as_deref().map(str::trim))
        .bind(req.description.as_deref().map(str::trim))
        .bind(req.color_hex.as_deref())
        .bind(req.icon.as_deref())
        .bind(req.accepts_applications)
        .bind(req.active)
        .bind(chief.is_some())
        .bind(chief.flatten())
        .bind(format_timestamp(Utc::now()))
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(WorkflowError::OrganizationNotFound);
        }

        replace_lists(&mut tx, id, req.requirements.as_deref(), req.benefits.as_deref()).await?;
        tx.commit().await?;

        info!(organization_id = %id, "Organization updated");
        self.get(id).await
    }

    /// Toggle the active and accepting flags. Deactivation is the soft delete.
    pub async fn set_status(
        &self,
        id: &str,
        req: UpdateOrganizationStatusRequest,
    ) -> Result<OrganizationResponse, WorkflowError> {
        let result = sqlx::query(
            "UPDATE organizations SET active = COALESCE(?, active), \
                 accepts_applications = COALESCE(?, accepts_applications), updated_at = ? \
             WHERE id = ?",
        )
        .bind(req.active)
        .bind(req.accepts_applications)
        .bind(format_timestamp(Utc::now()))
        .bind(id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(WorkflowError::OrganizationNotFound);
        }

        info!(
            organization_id = %id,
            active = ?req.active,
            accepts_applications = ?req.accepts_applications,
            "Organization status changed"
        );
        self.get(id).await
    }

    /// Hard delete; requirements, benefits and applications cascade
    pub async fn delete(&self, id: &str) -> Result<(), WorkflowError> {
        let result = sqlx::query("DELETE FROM organizations WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(WorkflowError::OrganizationNotFound);
        }

        info!(organization_id = %id, "Organization deleted");
        Ok(())
    }

    /// Make `user_id` the chief of `organization_id` (or of nothing), releasing
    /// any organization the user led before
    pub async fn assign_chief(&self, user_id: &str, organization_id: Option<&str>) -> Result<(), WorkflowError> {
        let mut tx = self.db.begin().await?;
        let now = format_timestamp(Utc::now());

        sqlx::query("UPDATE organizations SET chief_id = NULL, updated_at = ? WHERE chief_id = ?")
            .bind(&now)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        if let Some(org_id) = organization_id {
            let result = sqlx::query("UPDATE organizations SET chief_id = ?, updated_at = ? WHERE id = ?")
                .bind(user_id)
                .bind(&now)
                .bind(org_id)
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() == 0 {
                return Err(WorkflowError::OrganizationNotFound);
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn ensure_user_exists(&self, user_id: &str) -> Result<(), WorkflowError> {
        let user: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;
        match user {
            Some(_) => Ok(()),
            None => Err(WorkflowError::invalid("chiefId", "Utilizador não encontrado")),
        }
    }

    async fn with_lists(&self, row: OrganizationRow) -> Result<OrganizationResponse, WorkflowError> {
        let mut all = self.attach_lists(vec![row]).await?;
        all.pop().ok_or(WorkflowError::OrganizationNotFound)
    }

    async fn attach_lists(&self, rows: Vec<OrganizationRow>) -> Result<Vec<OrganizationResponse>, WorkflowError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let requirements = self
            .load_list("SELECT organization_id, requirement_text FROM organization_requirements ORDER BY organization_id, position, id")
            .await?;
        let benefits = self
            .load_list("SELECT organization_id, benefit_text FROM organization_benefits ORDER BY organization_id, position, id")
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let id = &row.organization.id;
                let reqs = requirements.get(id).cloned().unwrap_or_default();
                let bens = benefits.get(id).cloned().unwrap_or_default();
                OrganizationResponse::from_row(row, reqs, bens)
            })
            .collect())
    }

    async fn load_list(&self, sql: &str) -> Result<HashMap<String, Vec<String>>, WorkflowError> {
        let rows: Vec<(String, String)> = sqlx::query_as(sql).fetch_all(&self.db).await?;
        let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
        for (org_id, text) in rows {
            grouped.entry(org_id).or_default().push(text);
        }
        Ok(grouped)
    }
}

async fn replace_lists(
    tx: &mut Transaction<'_, Sqlite>,
    organization_id: &str,
    requirements: Option<&[String]>,
    benefits: Option<&[String]>,
) -> Result<(), sqlx::Error> {
    if let Some(items) = requirements {
        sqlx::query("DELETE FROM organization_requirements WHERE organization_id = ?")
            .bind(organization_id)
            .execute(&mut **tx)
            .await?;
        for (position, text) in cleaned(items).enumerate() {
            sqlx::query(
                "INSERT INTO organization_requirements (organization_id, requirement_text, position) VALUES (?, ?, ?)",
            )
            .bind(organization_id)
            .bind(text)
            .bind(position as i64)
            .execute(&mut **tx)
            .await?;
        }
    }

    if let Some(items) = benefits {
        sqlx::query("DELETE FROM organization_benefits WHERE organization_id = ?")
            .bind(organization_id)
            .execute(&mut **tx)
            .await?;
        for (position, text) in cleaned(items).enumerate() {
            sqlx::query(
                "INSERT INTO organization_benefits (organization_id, benefit_text, position) VALUES (?, ?, ?)",
            )
            .bind(organization_id)
            .bind(text)
            .bind(position as i64)
            .execute(&mut **tx)
            .await?;
        }
    }

    Ok(())
}

fn cleaned(items: &[String]) -> impl Iterator<Item = &str> {
    items.iter().map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn duplicate_slug(slug: &str) -> WorkflowError {
    WorkflowError::Conflict(format!("Já existe uma organização com o identificador '{}'", slug))
}
