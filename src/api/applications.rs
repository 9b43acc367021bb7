//! Application review endpoints; moderators and above.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, JsonBody};
use crate::auth::{require_role, Identity};
use crate::db::{ApplicationQuery, ApplicationStats, ApplicationStatus, ApplicationView, Role, UpdateApplicationStatusRequest};
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApplicationStatusResponse {
    pub success: bool,
    pub application: ApplicationView,
}

pub async fn list_applications(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<ApplicationQuery>,
) -> Result<Json<Vec<ApplicationView>>, ApiError> {
    require_role(&identity, Role::Moderator)?;
    Ok(Json(state.workflow.list(&query).await?))
}

pub async fn get_application(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<ApplicationView>, ApiError> {
    require_role(&identity, Role::Moderator)?;
    Ok(Json(state.workflow.get(&id).await?))
}

/// Counts per review state for the dashboard
pub async fn application_stats(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<ApplicationStats>, ApiError> {
    require_role(&identity, Role::Moderator)?;
    Ok(Json(state.workflow.stats().await?))
}

pub async fn update_application_status(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateApplicationStatusRequest>,
) -> Result<Json<ApplicationStatusResponse>, ApiError> {
    require_role(&identity, Role::Moderator)?;

    let status: ApplicationStatus = req
        .status
        .parse()
        .map_err(|_| ApiError::validation_field("status", "Estado inválido"))?;

    let application = state
        .workflow
        .set_status(&id, status, req.notes, &identity.user_id)
        .await?;

    Ok(Json(ApplicationStatusResponse {
        success: true,
        application,
    }))
}
