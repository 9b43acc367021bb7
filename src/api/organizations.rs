//! Organization directory (public) and its admin management.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::error::{ApiError, JsonBody};
use super::validation::{validate_application, validate_create_organization, validate_update_organization};
use super::Ack;
use crate::db::{
    CreateOrganizationRequest, CreateOrganizationResponse, OrganizationResponse, SubmitApplicationRequest,
    SubmitApplicationResponse, UpdateOrganizationRequest, UpdateOrganizationStatusRequest,
};
use crate::AppState;

/// Active organizations with their requirements and benefits
pub async fn list_organizations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<OrganizationResponse>>, ApiError> {
    Ok(Json(state.organizations.list_active().await?))
}

pub async fn get_organization(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<OrganizationResponse>, ApiError> {
    Ok(Json(state.organizations.get_active_by_slug(&slug).await?))
}

/// Public candidature; `:id` may be the organization id or its slug
pub async fn apply(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<SubmitApplicationRequest>,
) -> Result<(StatusCode, Json<SubmitApplicationResponse>), ApiError> {
    validate_application(&req)?;

    let application_id = state.workflow.submit(&id, req).await?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitApplicationResponse {
            success: true,
            message: "Candidatura submetida com sucesso".to_string(),
            application_id,
        }),
    ))
}

// -------------------------------------------------------------------------
// Admin
// -------------------------------------------------------------------------

/// Every organization, including inactive ones
pub async fn admin_list_organizations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<OrganizationResponse>>, ApiError> {
    Ok(Json(state.organizations.list_all().await?))
}

pub async fn admin_get_organization(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<OrganizationResponse>, ApiError> {
    Ok(Json(state.organizations.get(&id).await?))
}

pub async fn create_organization(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<CreateOrganizationRequest>,
) -> Result<(StatusCode, Json<CreateOrganizationResponse>), ApiError> {
    validate_create_organization(&req)?;

    let organization = state.organizations.create(req).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateOrganizationResponse {
            success: true,
            organization,
        }),
    ))
}

pub async fn update_organization(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateOrganizationRequest>,
) -> Result<Json<CreateOrganizationResponse>, ApiError> {
    validate_update_organization(&req)?;

    let organization = state.organizations.update(&id, req).await?;

    Ok(Json(CreateOrganizationResponse {
        success: true,
        organization,
    }))
}

pub async fn update_organization_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateOrganizationStatusRequest>,
) -> Result<Json<CreateOrganizationResponse>, ApiError> {
    if req.active.is_none() && req.accepts_applications.is_none() {
        return Err(ApiError::bad_request("Nenhum estado indicado"));
    }

    let organization = state.organizations.set_status(&id, req).await?;

    Ok(Json(CreateOrganizationResponse {
        success: true,
        organization,
    }))
}

pub async fn delete_organization(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Ack>, ApiError> {
    state.organizations.delete(&id).await?;
    Ok(Json(Ack::new("Organização eliminada com sucesso")))
}

#[cfg(test)]
mod tests {
    use crate::api::create_router;
    use crate::api::testing::{send, test_state, token_for};
    use crate::db::{seed_organizations, Role};
    use axum::http::{Method, StatusCode};
    use serde_json::{json, Value};

    fn candidature(email: &str) -> Value {
        json!({
            "character_name": "John Doe",
            "player_name": "João Silva",
            "email": email,
            "discord_username": "joao#1234",
            "character_age": 28,
            "hours_played": 120,
            "motivation": "Quero servir a comunidade como paramédico e ajudar nas emergências.",
        })
    }

    #[tokio::test]
    async fn test_public_listing_and_lookup_by_slug() {
        let state = test_state().await;
        seed_organizations(&state.db).await.unwrap();
        let app = create_router(state);

        let (status, body) = send(&app, Method::GET, "/api/organizations", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);
        assert!(body[0]["requirements"].as_array().unwrap().len() > 0);

        let (status, body) = send(&app, Method::GET, "/api/organizations/sme", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["slug"], "sme");

        let (status, body) = send(&app, Method::GET, "/api/organizations/nao-existe", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_candidature_scenario() {
        let state = test_state().await;
        seed_organizations(&state.db).await.unwrap();
        let app = create_router(state.clone());
        let admin = token_for(&state, "chefe", Role::Admin).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/organizations/sme/apply",
            None,
            Some(candidature("jogador@example.com")),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let first = body["applicationId"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/organizations/sme/apply",
            None,
            Some(candidature("Jogador@Example.com")),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["message"], "Já existe uma candidatura pendente com este email");

        let (status, body) = send(
            &app,
            Method::PATCH,
            &format!("/api/applications/{}/status", first),
            Some(&admin),
            Some(json!({"status": "aprovada", "notes": "ok"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["application"]["status"], "aprovada");
        assert_eq!(body["application"]["reviewedByUsername"], "chefe");
        assert!(body["application"]["reviewedAt"].is_string());

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/organizations/sme/apply",
            None,
            Some(candidature("jogador@example.com")),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_candidature_validation() {
        let state = test_state().await;
        seed_organizations(&state.db).await.unwrap();
        let app = create_router(state);

        let mut payload = candidature("jogador@example.com");
        payload["character_age"] = json!(17);
        payload["motivation"] = json!("curta");

        let (status, body) = send(&app, Method::POST, "/api/organizations/sme/apply", None, Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["details"]["character_age"].is_array());
        assert!(body["error"]["details"]["motivation"].is_array());

        let mut payload = candidature("jogador@example.com");
        payload["character_age"] = json!("dezoito");
        let (status, body) = send(&app, Method::POST, "/api/organizations/sme/apply", None, Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "validation_error");
        assert!(body["error"]["details"]["character_age"].is_array());
    }

    #[tokio::test]
    async fn test_closed_organization_rejects_candidatures() {
        let state = test_state().await;
        seed_organizations(&state.db).await.unwrap();
        sqlx::query("UPDATE organizations SET accepts_applications = 0 WHERE slug = 'sme'")
            .execute(&state.db)
            .await
            .unwrap();
        let app = create_router(state.clone());

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/organizations/sme/apply",
            None,
            Some(candidature("jogador@example.com")),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["message"], "Esta organização não aceita candidaturas de momento");

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM organization_applications")
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_admin_routes_require_exact_admin() {
        let state = test_state().await;
        let app = create_router(state.clone());
        let moderator = token_for(&state, "moderador", Role::Moderator).await;

        let (status, _) = send(&app, Method::GET, "/api/admin/organizations", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(&app, Method::GET, "/api/admin/organizations", Some(&moderator), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body["error"]["message"].as_str().unwrap().contains("Administrador"));
    }

    #[tokio::test]
    async fn test_admin_organization_lifecycle() {
        let state = test_state().await;
        let app = create_router(state.clone());
        let admin = token_for(&state, "admin", Role::Admin).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/admin/organizations",
            Some(&admin),
            Some(json!({
                "name": "Mecânicos de Los Santos",
                "description": "Oficina de reparação e reboque da cidade.",
                "colorHex": "#ffaa00",
                "requirements": ["Carta de condução", ""],
                "benefits": ["Salário fixo"],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["organization"]["slug"], "mecanicos-de-los-santos");
        assert_eq!(body["organization"]["requirements"], json!(["Carta de condução"]));
        let id = body["organization"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/admin/organizations",
            Some(&admin),
            Some(json!({
                "name": "Mecânicos de Los Santos",
                "description": "Outra oficina com o mesmo nome.",
                "colorHex": "#ffaa00",
                "requirements": ["x"],
                "benefits": ["y"],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT, "{}", body);

        let (status, body) = send(
            &app,
            Method::PATCH,
            &format!("/api/admin/organizations/{}/status", id),
            Some(&admin),
            Some(json!({"active": false})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["organization"]["active"], false);

        let (_, body) = send(&app, Method::GET, "/api/organizations", None, None).await;
        assert_eq!(body.as_array().unwrap().len(), 0);

        let (status, _) = send(
            &app,
            Method::DELETE,
            &format!("/api/admin/organizations/{}", id),
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            &app,
            Method::PUT,
            &format!("/api/admin/organizations/{}", id),
            Some(&admin),
            Some(json!({"name": "Novo nome"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_admin_create_reports_invalid_fields() {
        let state = test_state().await;
        let app = create_router(state.clone());
        let admin = token_for(&state, "admin", Role::Admin).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/admin/organizations",
            Some(&admin),
            Some(json!({
                "name": "AB",
                "description": "curta",
                "colorHex": "red",
                "requirements": [],
                "benefits": ["  "],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let details = body["error"]["details"].as_object().unwrap();
        for field in ["name", "description", "colorHex", "requirements", "benefits"] {
            assert!(details.contains_key(field), "missing {}", field);
        }
    }
}
