//! Account records outside the login path: profile edits and the admin
//! user directory.

use chrono::Utc;
use tracing::info;

use super::service::normalize_email;
use super::AuthError;
use crate::db::{
    format_timestamp, is_foreign_key_violation, is_unique_violation, like_pattern, AdminUserView, DbPool, Role, User, UserListQuery};

/// Fields an admin may change on an account; `None` leaves a field as is.
/// The active flag goes through `AuthService::set_active` so lockout state
/// is reset with it.
#[derive(Debug, Clone, Default)]
pub struct AccountChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
}

#[derive(Clone)]
pub struct UserDirectory {
    db: DbPool,
}

impl UserDirectory {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Admin listing with optional free-text search and role filter
    pub async fn list(&self, query: &UserListQuery) -> Result<Vec<AdminUserView>, AuthError> {
        let mut conditions = Vec::new();
        let mut bindings: Vec<String> = Vec::new();

        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            conditions.push(
                "(lower(u.username) LIKE ? ESCAPE '\\' OR lower(u.email) LIKE ? ESCAPE '\\')".to_string(),
            );
            let pattern = like_pattern(search);
            bindings.push(pattern.clone());
            bindings.push(pattern);
        }

        if let Some(role) = query.role.as_deref().filter(|s| !s.is_empty()) {
            let Ok(role) = role.parse::<Role>() else {
                return Ok(Vec::new());
            };
            conditions.push("u.role = ?".to_string());
            bindings.push(role.as_str().to_string());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "SELECT u.id, u.username, u.email, u.role, u.active, u.discord_username, \
                 u.failed_login_attempts, u.locked_until, u.last_login, u.created_at, \
                 (SELECT o.id FROM organizations o WHERE o.chief_id = u.id ORDER BY o.name LIMIT 1) AS organization_id, \
                 (SELECT o.name FROM organizations o WHERE o.chief_id = u.id ORDER BY o.name LIMIT 1) AS organization_name \
             FROM users u {} ORDER BY u.created_at DESC, u.rowid DESC",
            where_clause
        );

        let mut query_builder = sqlx::query_as::<_, AdminUserView>(&sql);
        for binding in &bindings {
            query_builder = query_builder.bind(binding);
        }
        Ok(query_builder.fetch_all(&self.db).await?)
    }

    pub async fn get(&self, user_id: &str) -> Result<User, AuthError> {
        sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(AuthError::NotFound)
    }

    /// Self-service profile edit: username and chat handle
    pub async fn update_profile(
        &self,
        user_id: &str,
        username: Option<&str>,
        discord_username: Option<&str>,
    ) -> Result<User, AuthError> {
        // Blank chat handle clears it
        let discord = discord_username.map(|d| d.trim()).map(|d| if d.is_empty() { None } else { Some(d) });

        let result = sqlx::query(
            "UPDATE users SET username = COALESCE(?, username), \
                 discord_username = CASE WHEN ? THEN ? ELSE discord_username END, \
                 updated_at = ? \
             WHERE id = ?",
        )
        .bind(username.map(str::trim))
        .bind(discord.is_some())
        .bind(discord.flatten())
        .bind(format_timestamp(Utc::now()))
        .bind(user_id)
        .execute(&self.db)
        .await;

        match result {
            Ok(r) if r.rows_affected() == 0 => return Err(AuthError::NotFound),
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Err(taken()),
            Err(e) => return Err(e.into()),
        }

        info!(user_id = %user_id, "Profile updated");
        self.get(user_id).await
    }

    /// Admin edit of identity and role
    pub async fn update(&self, user_id: &str, changes: AccountChanges) -> Result<User, AuthError> {
        let email = changes.email.as_deref().map(normalize_email);

        let result = sqlx::query(
            "UPDATE users SET username = COALESCE(?, username), email = COALESCE(?, email), \
                 role = COALESCE(?, role), updated_at = ? \
             WHERE id = ?",
        )
        .bind(changes.username.as_deref().map(str::trim))
        .bind(email)
        .bind(changes.role)
        .bind(format_timestamp(Utc::now()))
        .bind(user_id)
        .execute(&self.db)
        .await;

        match result {
            Ok(r) if r.rows_affected() == 0 => return Err(AuthError::NotFound),
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Err(taken()),
            Err(e) => return Err(e.into()),
        }

        info!(user_id = %user_id, role = ?changes.role, "Account updated");
        self.get(user_id).await
    }

    /// Permanent removal. A led organization loses its chief; an account
    /// that reviewed applications cannot be removed and should be
    /// deactivated instead.
    pub async fn delete(&self, user_id: &str) -> Result<(), AuthError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&self.db)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    AuthError::Conflict(
                        "Utilizador avaliou candidaturas e não pode ser eliminado; desative a conta".to_string(),
                    )
                } else {
                    e.into()
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound);
        }

        info!(user_id = %user_id, "Account deleted");
        Ok(())
    }
}

fn taken() -> AuthError {
    AuthError::Conflict("Email ou username já existe".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthService, LockoutPolicy, NewAccount, TokenService};
    use crate::db::{connect_in_memory, seed_organizations, ApplicationStatus, SubmitApplicationRequest};
    use crate::workflow::ApplicationWorkflow;
    use std::sync::Arc;

    async fn setup() -> (UserDirectory, AuthService) {
        let db = connect_in_memory().await.unwrap();
        let auth = AuthService::new(
            db.clone(),
            Arc::new(TokenService::new("s", chrono::Duration::hours(1), chrono::Duration::hours(1))),
            LockoutPolicy::default(),
        );
        (UserDirectory::new(db), auth)
    }

    async fn account(auth: &AuthService, name: &str, role: Role) -> User {
        auth.create_account(NewAccount {
            username: name.to_string(),
            email: format!("{}@example.com", name),
            password: "password-123".to_string(),
            role,
            active: true,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_filters_by_role_and_search() {
        let (dir, auth) = setup().await;
        account(&auth, "ana", Role::User).await;
        account(&auth, "bruno", Role::Moderator).await;
        account(&auth, "carla", Role::Moderator).await;

        let all = dir.list(&UserListQuery::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let mods = dir
            .list(&UserListQuery { role: Some("moderator".to_string()), search: None })
            .await
            .unwrap();
        assert_eq!(mods.len(), 2);

        let found = dir
            .list(&UserListQuery { role: None, search: Some("CARL".to_string()) })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].username, "carla");
    }

    #[tokio::test]
    async fn test_list_shows_led_organization() {
        let (dir, auth) = setup().await;
        let chief = account(&auth, "chefe", Role::ChefeOrganizacao).await;
        crate::db::seed_organizations(&dir.db).await.unwrap();
        sqlx::query("UPDATE organizations SET chief_id = ? WHERE slug = 'sme'")
            .bind(&chief.id)
            .execute(&dir.db)
            .await
            .unwrap();

        let listed = dir.list(&UserListQuery::default()).await.unwrap();
        assert_eq!(listed[0].organization_name.as_deref(), Some("Serviços Médicos de Emergência"));
    }

    #[tokio::test]
    async fn test_update_changes_role_and_detects_conflicts() {
        let (dir, auth) = setup().await;
        let ana = account(&auth, "ana", Role::User).await;
        account(&auth, "bruno", Role::User).await;

        let updated = dir
            .update(&ana.id, AccountChanges { role: Some(Role::Moderator), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(updated.role, Role::Moderator);
        assert_eq!(updated.username, "ana");

        let clash = dir
            .update(&ana.id, AccountChanges { email: Some("Bruno@Example.com".to_string()), ..Default::default() })
            .await;
        assert!(matches!(clash, Err(AuthError::Conflict(_))));

        let missing = dir.update("ghost", AccountChanges::default()).await;
        assert!(matches!(missing, Err(AuthError::NotFound)));
    }

    #[tokio::test]
    async fn test_profile_update_and_clear_handle() {
        let (dir, auth) = setup().await;
        let ana = account(&auth, "ana", Role::User).await;

        let user = dir.update_profile(&ana.id, None, Some("ana#0001")).await.unwrap();
        assert_eq!(user.discord_username.as_deref(), Some("ana#0001"));

        let user = dir.update_profile(&ana.id, Some("ana_rp"), None).await.unwrap();
        assert_eq!(user.username, "ana_rp");
        assert_eq!(user.discord_username.as_deref(), Some("ana#0001"));

        let user = dir.update_profile(&ana.id, None, Some("  ")).await.unwrap();
        assert!(user.discord_username.is_none());
    }

    #[tokio::test]
    async fn test_delete_keeps_reviewers_and_releases_chiefs() {
        let (dir, auth) = setup().await;
        let reviewer = account(&auth, "mod", Role::Moderator).await;
        let chief = account(&auth, "chefe", Role::ChefeOrganizacao).await;
        seed_organizations(&dir.db).await.unwrap();
        sqlx::query("UPDATE organizations SET chief_id = ? WHERE slug = 'sme'")
            .bind(&chief.id)
            .execute(&dir.db)
            .await
            .unwrap();

        let workflow = ApplicationWorkflow::new(dir.db.clone());
        let id = workflow
            .submit(
                "sme",
                SubmitApplicationRequest {
                    character_name: "Rita Socorro".to_string(),
                    player_name: "Rita".to_string(),
                    email: "rita@example.com".to_string(),
                    discord_username: "rita#7".to_string(),
                    character_age: 31,
                    hours_played: 200,
                    motivation: "x".repeat(60),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        workflow
            .set_status(&id, ApplicationStatus::Aprovada, Some("ok".to_string()), &reviewer.id)
            .await
            .unwrap();

        assert!(matches!(dir.delete(&reviewer.id).await, Err(AuthError::Conflict(_))));
        let view = workflow.get(&id).await.unwrap();
        assert_eq!(view.reviewed_by.as_deref(), Some(reviewer.id.as_str()));
        assert!(view.reviewed_at.is_some());

        dir.delete(&chief.id).await.unwrap();
        let (chief_id,): (Option<String>,) = sqlx::query_as("SELECT chief_id FROM organizations WHERE slug = 'sme'")
            .fetch_one(&dir.db)
            .await
            .unwrap();
        assert!(chief_id.is_none());
        assert!(matches!(dir.delete(&chief.id).await, Err(AuthError::NotFound)));
    }

    #[tokio::test]
    async fn test_search_treats_wildcards_literally() {
        let (dir, auth) = setup().await;
        account(&auth, "ana", Role::User).await;
        account(&auth, "rui_m", Role::User).await;

        let query = UserListQuery {
            search: Some("_".to_string()),
            ..Default::default()
        };
        let found = dir.list(&query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].username, "rui_m");

        let query = UserListQuery {
            search: Some("%".to_string()),
            ..Default::default()
        };
        assert!(dir.list(&query).await.unwrap().is_empty());
    }
}
