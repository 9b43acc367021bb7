mod applications;
pub mod auth;
pub mod error;
mod organizations;
pub mod rate_limit;
mod staff;
mod users;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Bare success acknowledgement
#[derive(Debug, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
    pub message: String,
}

impl Ack {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    // Login has its own, much smaller budget
    let login_route = Router::new()
        .route("/login", post(auth::login))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_login,
        ));

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/verify", get(auth::verify))
        .route("/me", get(auth::me).patch(auth::update_me))
        .merge(login_route);

    let organization_routes = Router::new()
        .route("/", get(organizations::list_organizations))
        .route("/:slug", get(organizations::get_organization))
        .route("/:slug/apply", post(organizations::apply));

    // Role checks happen per handler (moderator and above)
    let application_routes = Router::new()
        .route("/", get(applications::list_applications))
        .route("/stats", get(applications::application_stats))
        .route("/:id", get(applications::get_application))
        .route("/:id/status", patch(applications::update_application_status));

    let staff_routes = Router::new()
        .route(
            "/",
            get(staff::list_staff_applications).post(staff::submit_staff_application),
        )
        .route("/:id/status", patch(staff::update_staff_application_status));

    let admin_routes = Router::new()
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/:id", patch(users::update_user).put(users::update_user).delete(users::delete_user))
        .route("/users/:id/status", patch(users::update_user_status))
        // Organizations
        .route(
            "/organizations",
            get(organizations::admin_list_organizations).post(organizations::create_organization),
        )
        .route(
            "/organizations/:id",
            get(organizations::admin_get_organization)
                .put(organizations::update_organization)
                .patch(organizations::update_organization)
                .delete(organizations::delete_organization),
        )
        .route("/organizations/:id/status", patch(organizations::update_organization_status))
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_admin));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/organizations", organization_routes)
        .nest("/applications", application_routes)
        .nest("/staff-applications", staff_routes)
        .nest("/admin", admin_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_api,
        ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(cors_layer(&state.config.server.frontend_url))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(frontend_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
        .allow_credentials(true);

    match frontend_url.trim_end_matches('/').parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            tracing::warn!(frontend_url, "Invalid frontend URL, CORS disabled");
            layer
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        timestamp: crate::db::format_timestamp(chrono::Utc::now()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{send, state_with, test_config, test_state};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health() {
        let app = create_router(test_state().await);
        let (status, body) = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "OK");
    }

    #[tokio::test]
    async fn test_login_rate_limit_returns_429() {
        let mut config = test_config();
        config.rate_limit.enabled = true;
        let app = create_router(state_with(config).await);
        let attempt = json!({"email": "ninguem@example.com", "password": "qualquer"});

        for _ in 0..5 {
            let (status, _) = send(&app, Method::POST, "/api/auth/login", None, Some(attempt.clone())).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }

        let (status, body) = send(&app, Method::POST, "/api/auth/login", None, Some(attempt)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            body["error"]["message"],
            "Muitas tentativas de login. Tente novamente em 15 minutos."
        );

        // Other endpoints keep their own budget
        let (status, _) = send(&app, Method::GET, "/api/organizations", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_rate_limit_headers_present() {
        let mut config = test_config();
        config.rate_limit.enabled = true;
        let app = create_router(state_with(config).await);

        let response = app
            .oneshot(Request::builder().uri("/api/organizations").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.headers()["X-RateLimit-Limit"], "300");
        assert_eq!(response.headers()["X-RateLimit-Remaining"], "299");
    }

    #[tokio::test]
    async fn test_rotating_forwarded_for_does_not_reset_login_budget() {
        let mut config = test_config();
        config.rate_limit.enabled = true;
        let app = create_router(state_with(config).await);
        let attempt = json!({"email": "ninguem@example.com", "password": "qualquer"}).to_string();

        let mut statuses = Vec::new();
        for n in 1..=6 {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method(Method::POST)
                        .uri("/api/auth/login")
                        .header("Content-Type", "application/json")
                        .header("X-Forwarded-For", format!("198.51.100.{}", n))
                        .body(Body::from(attempt.clone()))
                        .unwrap(),
                )
                .await
                .unwrap();
            statuses.push(response.status());
        }

        assert!(statuses[..5].iter().all(|s| *s == StatusCode::UNAUTHORIZED));
        assert_eq!(statuses[5], StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_cors_allows_frontend_origin() {
        let app = create_router(test_state().await);
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/organizations")
                    .header("Origin", "http://localhost:5173")
                    .header("Access-Control-Request-Method", "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "http://localhost:5173"
        );
    }
}
