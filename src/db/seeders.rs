//! Database seeders for built-in data
//!
//! The first start of a fresh database gets an administrator account and the
//! two founding organizations. Both seeders are no-ops once data exists.

use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{info, warn};

use super::models::format_timestamp;
use crate::auth::password::hash_password_async;
use crate::config::AuthConfig;

/// Organization definition used to populate an empty database
#[derive(Debug, Clone)]
pub struct SeedOrganization {
    pub name: &'static str,
    pub slug: &'static str,
    pub description: &'static str,
    pub color_hex: &'static str,
    pub icon: &'static str,
    pub requirements: &'static [&'static str],
    pub benefits: &'static [&'static str],
}

pub fn default_organizations() -> Vec<SeedOrganization> {
    vec![
        SeedOrganization {
            name: "Polícia de Los Santos",
            slug: "policia-ls",
            description: "Força policial responsável por manter a ordem e segurança em Los Santos.",
            color_hex: "#0066cc",
            icon: "shield",
            requirements: &[
                "Mínimo 50 horas no servidor",
                "Registo criminal limpo",
                "Excelentes competências de comunicação",
            ],
            benefits: &[
                "Salário competitivo e benefícios",
                "Acesso a veículos e equipamento policial",
                "Oportunidades de progressão na carreira",
            ],
        },
        SeedOrganization {
            name: "Serviços Médicos de Emergência",
            slug: "sme",
            description: "Equipa médica responsável por salvar vidas e prestar cuidados de emergência.",
            color_hex: "#dc3545",
            icon: "heart-pulse",
            requirements: &[
                "Mínimo 30 horas no servidor",
                "Conhecimentos básicos de roleplay médico",
                "Boas competências de comunicação",
            ],
            benefits: &[
                "Salário estável e pacote de benefícios",
                "Acesso a veículos e equipamento médico",
                "Formação médica especializada",
            ],
        },
    ]
}

/// Create the configured administrator when no admin account exists
pub async fn seed_admin_user(pool: &SqlitePool, config: &AuthConfig) -> Result<bool> {
    let existing: Option<(String,)> =
        sqlx::query_as("SELECT id FROM users WHERE role = 'admin' LIMIT 1")
            .fetch_optional(pool)
            .await?;
    if existing.is_some() {
        return Ok(false);
    }

    if config.admin_password == "admin123" {
        warn!("Seeding admin account with the default password; change it after first login");
    }

    let id = uuid::Uuid::new_v4().to_string();
    let password_hash = hash_password_async(config.admin_password.clone()).await?;
    let now = format_timestamp(Utc::now());

    sqlx::query(
        "INSERT INTO users (id, username, email, password_hash, role, created_at, updated_at) \
         VALUES (?, ?, ?, ?, 'admin', ?, ?)",
    )
    .bind(&id)
    .bind(&config.admin_username)
    .bind(config.admin_email.trim().to_lowercase())
    .bind(&password_hash)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    info!(user_id = %id, email = %config.admin_email, "Seeded administrator account");
    Ok(true)
}

/// Insert the founding organizations into an empty organizations table
pub async fn seed_organizations(pool: &SqlitePool) -> Result<usize> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM organizations")
        .fetch_one(pool)
        .await?;
    if count.0 > 0 {
        return Ok(0);
    }

    let organizations = default_organizations();
    let mut tx = pool.begin().await?;
    let now = format_timestamp(Utc::now());

    for org in &organizations {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO organizations (id, name, slug, description, color_hex, icon, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(org.name)
        .bind(org.slug)
        .bind(org.description)
        .bind(org.color_hex)
        .bind(org.icon)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        for (position, text) in org.requirements.iter().enumerate() {
            sqlx::query(
                "INSERT INTO organization_requirements (organization_id, requirement_text, position) VALUES (?, ?, ?)",
            )
            .bind(&id)
            .bind(*text)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        for (position, text) in org.benefits.iter().enumerate() {
            sqlx::query(
                "INSERT INTO organization_benefits (organization_id, benefit_text, position) VALUES (?, ?, ?)",
            )
            .bind(&id)
            .bind(*text)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;

    info!("Seeded {} default organizations", organizations.len());
    Ok(organizations.len())
}
