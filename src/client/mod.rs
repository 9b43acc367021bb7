//! Typed client for the portal API.
//!
//! Any 401 on an authenticated request ends the session: the stored token
//! and user are cleared and the call fails with `ClientError::SessionExpired`,
//! which callers treat as "go to the login page". A timeout on an
//! authenticated request clears the session the same way but still reports
//! `ClientError::Timeout`.

pub mod directory;
pub mod session;
pub mod store;

pub use directory::{Fetched, OrganizationDirectory, Source};
pub use session::{AuthSession, SessionState};
pub use store::{JsonFileStore, MemoryStore, SessionStore};

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::api::error::ErrorResponse;
use crate::db::{
    ApplicationQuery, ApplicationView, LoginRequest, LoginResponse, OrganizationResponse, RegisterRequest,
    RegisterResponse, SubmitApplicationRequest, SubmitApplicationResponse, UpdateApplicationStatusRequest,
    VerifyResponse,
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server rejected the stored token; the session has been cleared
    #[error("Sessão expirada, inicie sessão novamente")]
    SessionExpired,

    #[error("Request timed out")]
    Timeout,

    /// Error envelope returned by the API, message verbatim
    #[error("{message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Request failed: {0}")]
    Transport(reqwest::Error),

    #[error("Session store error: {0}")]
    Store(String),
}

impl ClientError {
    /// Callers should send the user back to the login page
    pub fn requires_login(&self) -> bool {
        matches!(self, ClientError::SessionExpired | ClientError::Timeout)
    }

    /// The server could not be reached or failed on its side
    pub fn is_unavailable(&self) -> bool {
        match self {
            ClientError::Timeout | ClientError::Transport(_) => true,
            ClientError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else {
            ClientError::Transport(err)
        }
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<dyn SessionStore>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, store: Arc<dyn SessionStore>) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, store, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        store: Arc<dyn SessionStore>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("enigma-portal/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            store,
        })
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    fn request(&self, method: Method, path: &str) -> (RequestBuilder, bool) {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match self.store.token() {
            Some(token) => (builder.bearer_auth(token), true),
            None => (builder, false),
        }
    }

    async fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder, authenticated: bool) -> Result<T, ClientError> {
        match self.dispatch(builder, authenticated).await {
            Err(ClientError::Timeout) if authenticated => {
                tracing::info!("Request timed out, clearing stored credentials");
                self.store.clear_session()?;
                Err(ClientError::Timeout)
            }
            result => result,
        }
    }

    async fn dispatch<T: DeserializeOwned>(&self, builder: RequestBuilder, authenticated: bool) -> Result<T, ClientError> {
        let response = builder.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED && authenticated {
            tracing::info!("Session rejected by server, clearing stored credentials");
            self.store.clear_session()?;
            return Err(ClientError::SessionExpired);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(envelope) => ClientError::Api {
                    status: status.as_u16(),
                    code: envelope.error.code,
                    message: envelope.error.message,
                },
                Err(_) => ClientError::Api {
                    status: status.as_u16(),
                    code: "unknown".to_string(),
                    message: format!("HTTP {}", status),
                },
            });
        }

        Ok(response.json().await?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let (builder, authenticated) = self.request(Method::GET, path);
        self.execute(builder, authenticated).await
    }

    async fn send<B: Serialize, T: DeserializeOwned>(&self, method: Method, path: &str, body: &B) -> Result<T, ClientError> {
        let (builder, authenticated) = self.request(method, path);
        self.execute(builder.json(body), authenticated).await
    }

    pub async fn login(&self, email: &str, password: &str, remember: bool) -> Result<LoginResponse, ClientError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
            remember,
        };
        // Credentials are checked on their own; never send a stale token along
        let builder = self.http.post(format!("{}/api/auth/login", self.base_url)).json(&body);
        self.execute(builder, false).await
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<RegisterResponse, ClientError> {
        let body = RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        let builder = self.http.post(format!("{}/api/auth/register", self.base_url)).json(&body);
        self.execute(builder, false).await
    }

    pub async fn verify(&self) -> Result<VerifyResponse, ClientError> {
        self.get("/api/auth/verify").await
    }

    pub async fn organizations(&self) -> Result<Vec<OrganizationResponse>, ClientError> {
        self.get("/api/organizations").await
    }

    pub async fn organization(&self, slug: &str) -> Result<OrganizationResponse, ClientError> {
        self.get(&format!("/api/organizations/{}", slug)).await
    }

    pub async fn apply(
        &self,
        organization: &str,
        application: &SubmitApplicationRequest,
    ) -> Result<SubmitApplicationResponse, ClientError> {
        self.send(Method::POST, &format!("/api/organizations/{}/apply", organization), application)
            .await
    }

    pub async fn applications(&self, query: &ApplicationQuery) -> Result<Vec<ApplicationView>, ClientError> {
        let (builder, authenticated) = self.request(Method::GET, "/api/applications");
        self.execute(builder.query(query), authenticated).await
    }

    pub async fn set_application_status(
        &self,
        application_id: &str,
        status: &str,
        notes: Option<&str>,
    ) -> Result<ApplicationView, ClientError> {
        #[derive(serde::Deserialize)]
        struct StatusResponse {
            application: ApplicationView,
        }

        let body = UpdateApplicationStatusRequest {
            status: status.to_string(),
            notes: notes.map(str::to_string),
        };
        let response: StatusResponse = self
            .send(Method::PATCH, &format!("/api/applications/{}/status", application_id), &body)
            .await?;
        Ok(response.application)
    }
}
