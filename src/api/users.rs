//! Admin user management. Mounted behind `require_admin`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use super::error::{ApiError, JsonBody, ValidationErrorBuilder};
use super::validation::{validate_email, validate_password, validate_username, REGISTER_PASSWORD_MIN};
use super::Ack;
use crate::auth::{AccountChanges, Identity, NewAccount};
use crate::db::{
    AdminUserView, CreateUserRequest, Role, UpdateUserRequest, UpdateUserStatusRequest, UserListQuery, UserResponse,
};
use crate::workflow::WorkflowError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct UserMutationResponse {
    pub success: bool,
    pub user: UserResponse,
}

fn parse_role(role: &str) -> Result<Role, ApiError> {
    role.parse()
        .map_err(|_| ApiError::validation_field("role", "Papel inválido"))
}

/// `Some("")` clears the binding
fn organization_binding(value: Option<&str>) -> Option<Option<&str>> {
    value.map(|v| Some(v.trim()).filter(|v| !v.is_empty()))
}

/// Resolve a requested binding (id or slug) to an organization id before
/// anything is written, so an unknown organization leaves no partial change
async fn resolve_binding(state: &AppState, value: Option<&str>) -> Result<Option<Option<String>>, ApiError> {
    match organization_binding(value) {
        Some(Some(key)) => {
            let organization = state
                .organizations
                .find(key)
                .await?
                .ok_or(WorkflowError::OrganizationNotFound)?;
            Ok(Some(Some(organization.id)))
        }
        Some(None) => Ok(Some(None)),
        None => Ok(None),
    }
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Vec<AdminUserView>>, ApiError> {
    Ok(Json(state.users.list(&query).await?))
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserMutationResponse>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_username(&req.username) {
        errors.add("username", e);
    }
    if let Err(e) = validate_email(&req.email) {
        errors.add("email", e);
    }
    if let Err(e) = validate_password(&req.password, REGISTER_PASSWORD_MIN) {
        errors.add("password", e);
    }
    errors.finish()?;
    let role = parse_role(&req.role)?;
    let binding = if role == Role::ChefeOrganizacao {
        resolve_binding(&state, req.organization_id.as_deref()).await?
    } else {
        None
    };

    let user = state
        .auth
        .create_account(NewAccount {
            username: req.username,
            email: req.email,
            password: req.password,
            role,
            active: req.active,
        })
        .await?;

    if let Some(Some(org_id)) = binding {
        state.organizations.assign_chief(&user.id, Some(&org_id)).await?;
    }

    tracing::info!(user_id = %user.id, role = %role, "Account created by admin");

    Ok((
        StatusCode::CREATED,
        Json(UserMutationResponse {
            success: true,
            user: user.into(),
        }),
    ))
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateUserRequest>,
) -> Result<Json<UserMutationResponse>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Some(username) = &req.username {
        if let Err(e) = validate_username(username) {
            errors.add("username", e);
        }
    }
    if let Some(email) = &req.email {
        if let Err(e) = validate_email(email) {
            errors.add("email", e);
        }
    }
    let password = req.password.as_deref().filter(|p| !p.trim().is_empty());
    if let Some(password) = password {
        if let Err(e) = validate_password(password, REGISTER_PASSWORD_MIN) {
            errors.add("password", e);
        }
    }
    errors.finish()?;
    let role = req.role.as_deref().map(parse_role).transpose()?;

    if id == identity.user_id && (req.active == Some(false) || role.is_some_and(|r| r != Role::Admin)) {
        return Err(ApiError::bad_request("Não pode remover o seu próprio acesso de administrador"));
    }

    let binding = match role {
        Some(Role::ChefeOrganizacao) | None => resolve_binding(&state, req.organization_id.as_deref()).await?,
        // Only organization chiefs lead an organization
        Some(_) => Some(None),
    };

    state
        .users
        .update(
            &id,
            AccountChanges {
                username: req.username,
                email: req.email,
                role,
            },
        )
        .await?;

    if let Some(active) = req.active {
        state.auth.set_active(&id, active).await?;
    }
    if let Some(password) = password {
        state.auth.reset_password(&id, password).await?;
    }

    if let Some(binding) = binding {
        state.organizations.assign_chief(&id, binding.as_deref()).await?;
    }

    let user = state.users.get(&id).await?;
    Ok(Json(UserMutationResponse {
        success: true,
        user: user.into(),
    }))
}

/// Activate or deactivate; either way the lockout state is cleared
pub async fn update_user_status(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateUserStatusRequest>,
) -> Result<Json<Ack>, ApiError> {
    if id == identity.user_id && !req.active {
        return Err(ApiError::bad_request("Não pode desativar a sua própria conta"));
    }

    state.auth.set_active(&id, req.active).await?;

    let message = if req.active {
        "Utilizador ativado com sucesso"
    } else {
        "Utilizador desativado com sucesso"
    };
    Ok(Json(Ack::new(message)))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<Ack>, ApiError> {
    if id == identity.user_id {
        return Err(ApiError::bad_request("Não pode eliminar a sua própria conta"));
    }

    state.users.delete(&id).await?;
    Ok(Json(Ack::new("Utilizador eliminado com sucesso")))
}

#[cfg(test)]
mod tests {
    use crate::api::create_router;
    use crate::api::testing::{send, test_state, token_for};
    use crate::db::{seed_organizations, Role};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    async fn admin_app() -> (axum::Router, std::sync::Arc<crate::AppState>, String) {
        let state = test_state().await;
        seed_organizations(&state.db).await.unwrap();
        let token = token_for(&state, "admin", Role::Admin).await;
        (create_router(state.clone()), state, token)
    }

    async fn org_id(state: &crate::AppState, slug: &str) -> String {
        let (id,): (String,) = sqlx::query_as("SELECT id FROM organizations WHERE slug = ?")
            .bind(slug)
            .fetch_one(&state.db)
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn test_create_chief_binds_organization() {
        let (app, state, admin) = admin_app().await;
        let sme = org_id(&state, "sme").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/admin/users",
            Some(&admin),
            Some(json!({
                "username": "chefe_sme",
                "email": "chefe@sme.pt",
                "password": "password-123",
                "role": "chefe_organizacao",
                "organizationId": sme,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["user"]["role"], "chefe_organizacao");

        let (status, body) = send(&app, Method::GET, "/api/admin/users?role=chefe_organizacao", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["organizationName"], "Serviços Médicos de Emergência");
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_role_and_duplicates() {
        let (app, _state, admin) = admin_app().await;

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/admin/users",
            Some(&admin),
            Some(json!({"username": "x_user", "email": "x@example.com", "password": "password-123", "role": "god"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/admin/users",
            Some(&admin),
            Some(json!({"username": "admin", "email": "other@example.com", "password": "password-123", "role": "user"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    async fn user_count(state: &crate::AppState, username: &str) -> i64 {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&state.db)
            .await
            .unwrap();
        n
    }

    #[tokio::test]
    async fn test_unknown_organization_creates_no_account() {
        let (app, state, admin) = admin_app().await;
        let chief = json!({
            "username": "chefe_x",
            "email": "chefe@x.pt",
            "password": "password-123",
            "role": "chefe_organizacao",
            "organizationId": "nao-existe",
        });

        let (status, _) = send(&app, Method::POST, "/api/admin/users", Some(&admin), Some(chief.clone())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(user_count(&state, "chefe_x").await, 0);

        // Slugs resolve too, so the same account can be created on retry
        let mut retry = chief;
        retry["organizationId"] = json!("sme");
        let (status, _) = send(&app, Method::POST, "/api/admin/users", Some(&admin), Some(retry)).await;
        assert_eq!(status, StatusCode::CREATED);
        let (chief_id,): (Option<String>,) = sqlx::query_as("SELECT chief_id FROM organizations WHERE slug = 'sme'")
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert!(chief_id.is_some());
    }

    #[tokio::test]
    async fn test_update_with_unknown_organization_changes_nothing() {
        let (app, state, admin) = admin_app().await;
        token_for(&state, "lider", Role::ChefeOrganizacao).await;
        let (lider,): (String,) = sqlx::query_as("SELECT id FROM users WHERE username = 'lider'")
            .fetch_one(&state.db)
            .await
            .unwrap();

        let (status, _) = send(
            &app,
            Method::PUT,
            &format!("/api/admin/users/{}", lider),
            Some(&admin),
            Some(json!({"username": "novo_nome", "active": false, "organizationId": "nao-existe"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(user_count(&state, "lider").await, 1);
        assert_eq!(user_count(&state, "novo_nome").await, 0);

        let (active,): (bool,) = sqlx::query_as("SELECT active FROM users WHERE id = ?")
            .bind(&lider)
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert!(active);
    }

    #[tokio::test]
    async fn test_update_role_releases_chief_binding() {
        let (app, state, admin) = admin_app().await;
        let sme = org_id(&state, "sme").await;
        token_for(&state, "lider", Role::ChefeOrganizacao).await;
        let (lider,): (String,) = sqlx::query_as("SELECT id FROM users WHERE username = 'lider'")
            .fetch_one(&state.db)
            .await
            .unwrap();
        let uri = format!("/api/admin/users/{}", lider);

        let (status, _) = send(&app, Method::PUT, &uri, Some(&admin), Some(json!({"organizationId": sme}))).await;
        assert_eq!(status, StatusCode::OK);
        let (chief,): (Option<String>,) = sqlx::query_as("SELECT chief_id FROM organizations WHERE slug = 'sme'")
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(chief.as_deref(), Some(lider.as_str()));

        let (status, body) = send(&app, Method::PUT, &uri, Some(&admin), Some(json!({"role": "moderator"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["role"], "moderator");
        let (chief,): (Option<String>,) = sqlx::query_as("SELECT chief_id FROM organizations WHERE slug = 'sme'")
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert!(chief.is_none());
    }

    #[tokio::test]
    async fn test_password_reset_and_status_toggle() {
        let (app, state, admin) = admin_app().await;
        token_for(&state, "alvo", Role::User).await;
        let (alvo,): (String,) = sqlx::query_as("SELECT id FROM users WHERE username = 'alvo'")
            .fetch_one(&state.db)
            .await
            .unwrap();

        let (status, _) = send(
            &app,
            Method::PUT,
            &format!("/api/admin/users/{}", alvo),
            Some(&admin),
            Some(json!({"password": "reposta-123"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            &app,
            Method::PATCH,
            &format!("/api/admin/users/{}/status", alvo),
            Some(&admin),
            Some(json!({"active": false})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let login = json!({"email": "alvo@example.com", "password": "reposta-123"});
        let (status, _) = send(&app, Method::POST, "/api/auth/login", None, Some(login.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        send(
            &app,
            Method::PATCH,
            &format!("/api/admin/users/{}/status", alvo),
            Some(&admin),
            Some(json!({"active": true})),
        )
        .await;
        let (status, _) = send(&app, Method::POST, "/api/auth/login", None, Some(login)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_cannot_remove_self() {
        let (app, state, admin) = admin_app().await;
        let (me,): (String,) = sqlx::query_as("SELECT id FROM users WHERE username = 'admin'")
            .fetch_one(&state.db)
            .await
            .unwrap();

        let (status, _) = send(&app, Method::DELETE, &format!("/api/admin/users/{}", me), Some(&admin), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            Method::PATCH,
            &format!("/api/admin/users/{}/status", me),
            Some(&admin),
            Some(json!({"active": false})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, Method::DELETE, "/api/admin/users/ninguem", Some(&admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
