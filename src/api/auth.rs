use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use std::sync::Arc;

use super::error::{ApiError, JsonBody};
use super::validation::{
    validate_login_request, validate_password, validate_register_request, validate_username,
    REGISTER_PASSWORD_MIN,
};
use crate::auth::{require_exact, Identity};
use crate::db::{
    LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, Role, UpdateProfileRequest,
    UserResponse, VerifyResponse,
};
use crate::AppState;

/// Bearer token from the Authorization header
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn identity_from_headers(state: &AppState, headers: &HeaderMap) -> Result<Identity, ApiError> {
    let token = extract_token(headers).ok_or_else(|| ApiError::unauthorized("Token de acesso requerido"))?;
    Ok(state.auth.verify_token(token)?)
}

/// Extractor for the authenticated caller. A missing, malformed or expired
/// token is rejected with 401.
#[async_trait]
impl FromRequestParts<Arc<AppState>> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        // Already established by require_admin
        if let Some(identity) = parts.extensions.get::<Identity>() {
            return Ok(identity.clone());
        }
        identity_from_headers(state, &parts.headers)
    }
}

/// Gate for admin-only route groups: the role must be exactly `admin`
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = identity_from_headers(&state, request.headers())?;
    require_exact(&identity, Role::Admin)?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Login endpoint
pub async fn login(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    validate_login_request(&request)?;

    let outcome = state
        .auth
        .authenticate(&request.email, &request.password, request.remember)
        .await?;

    Ok(Json(LoginResponse {
        success: true,
        token: outcome.token,
        user: outcome.user,
    }))
}

/// Self-registration; always creates a `user` account
pub async fn register(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    validate_register_request(&request)?;

    let user_id = state
        .auth
        .register(&request.username, &request.email, &request.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            message: "Conta criada com sucesso".to_string(),
            user_id,
        }),
    ))
}

/// Token check used by clients on startup
pub async fn verify(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<VerifyResponse>, ApiError> {
    let user = state.auth.current_user(&identity).await?;
    Ok(Json(VerifyResponse {
        valid: true,
        user: user.into(),
    }))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.auth.current_user(&identity).await?;
    Ok(Json(user.into()))
}

/// Edit one's own profile. A password change needs the current password.
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    JsonBody(request): JsonBody<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    state.auth.current_user(&identity).await?;

    if let Some(username) = &request.username {
        validate_username(username).map_err(|e| ApiError::validation_field("username", e))?;
    }

    if let Some(new_password) = request.new_password.as_deref().filter(|p| !p.is_empty()) {
        validate_password(new_password, REGISTER_PASSWORD_MIN)
            .map_err(|e| ApiError::validation_field("newPassword", e))?;
        let current = request
            .current_password
            .as_deref()
            .ok_or_else(|| ApiError::validation_field("currentPassword", "Password atual é obrigatória"))?;

        state
            .auth
            .change_password(&identity.user_id, current, new_password)
            .await
            .map_err(|e| match e {
                crate::auth::AuthError::InvalidCredentials => {
                    ApiError::validation_field("currentPassword", "Password atual incorreta")
                }
                other => other.into(),
            })?;
    }

    let user = state
        .users
        .update_profile(
            &identity.user_id,
            request.username.as_deref(),
            request.discord_username.as_deref(),
        )
        .await?;

    Ok(Json(user.into()))
}
