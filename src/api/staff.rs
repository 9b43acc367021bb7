use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use super::error::{ApiError, JsonBody};
use super::validation::validate_staff_application;
use super::Ack;
use crate::auth::{require_role, Identity};
use crate::db::{Role, StaffApplication, StaffApplicationStatus, SubmitStaffApplicationRequest, UpdateStaffStatusRequest};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffSubmitResponse {
    pub success: bool,
    pub message: String,
    pub application_id: String,
}

/// Public staff recruitment form
pub async fn submit_staff_application(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<SubmitStaffApplicationRequest>,
) -> Result<(StatusCode, Json<StaffSubmitResponse>), ApiError> {
    validate_staff_application(&req)?;

    let application_id = state.staff.submit(req).await?;

    Ok((
        StatusCode::CREATED,
        Json(StaffSubmitResponse {
            success: true,
            message: "Candidatura enviada com sucesso".to_string(),
            application_id,
        }),
    ))
}

pub async fn list_staff_applications(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<Vec<StaffApplication>>, ApiError> {
    require_role(&identity, Role::Moderator)?;
    Ok(Json(state.staff.list().await?))
}

pub async fn update_staff_application_status(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateStaffStatusRequest>,
) -> Result<Json<Ack>, ApiError> {
    require_role(&identity, Role::Moderator)?;

    let status: StaffApplicationStatus = req
        .status
        .parse()
        .map_err(|_| ApiError::validation_field("status", "Estado inválido"))?;

    state.staff.set_status(&id, status, &identity.user_id).await?;
    Ok(Json(Ack::new("Estado atualizado com sucesso")))
}
