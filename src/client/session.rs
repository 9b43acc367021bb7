//! Client-side login state with an explicit hydrate/teardown lifecycle.

use tracing::{debug, warn};

use super::{ApiClient, ClientError};
use crate::auth::has_role;
use crate::db::{Role, UserResponse};
use crate::guard::Viewer;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Not hydrated yet
    Loading,
    Anonymous,
    Authenticated(UserResponse),
    /// Stored session that the server could not confirm because it refused
    /// or dropped the connection. The cached user is kept until a later call
    /// succeeds or is rejected.
    Unverified(UserResponse),
}

pub struct AuthSession {
    client: ApiClient,
    state: SessionState,
}

impl AuthSession {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            state: SessionState::Loading,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Restore the stored session and confirm it with the server
    pub async fn hydrate(&mut self) -> Result<&SessionState, ClientError> {
        let store = self.client.store().clone();

        let (Some(token), Some(cached)) = (store.token(), store.user()) else {
            store.clear_session()?;
            self.state = SessionState::Anonymous;
            return Ok(&self.state);
        };

        self.state = match self.client.verify().await {
            Ok(response) if response.valid => {
                store.save_session(&token, &response.user)?;
                SessionState::Authenticated(response.user)
            }
            Ok(_) | Err(ClientError::SessionExpired | ClientError::Timeout) => {
                debug!("Stored session is no longer valid");
                store.clear_session()?;
                SessionState::Anonymous
            }
            Err(e) if e.is_unavailable() => {
                warn!(error = %e, "Could not verify stored session, keeping cached user");
                SessionState::Unverified(cached)
            }
            Err(e) => {
                debug!(error = %e, "Session verification rejected");
                store.clear_session()?;
                SessionState::Anonymous
            }
        };

        Ok(&self.state)
    }

    pub async fn login(&mut self, email: &str, password: &str, remember: bool) -> Result<UserResponse, ClientError> {
        let response = self.client.login(email, password, remember).await?;
        self.client.store().save_session(&response.token, &response.user)?;
        self.state = SessionState::Authenticated(response.user.clone());
        Ok(response.user)
    }

    /// Create an account. Does not sign in; returns the new account id.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<String, ClientError> {
        let response = self.client.register(username, email, password).await?;
        Ok(response.user_id)
    }

    /// Teardown: forget the stored session
    pub fn logout(&mut self) -> Result<(), ClientError> {
        self.client.store().clear_session()?;
        self.state = SessionState::Anonymous;
        Ok(())
    }

    /// Drop to anonymous when a call reports the session is gone
    pub fn observe(&mut self, error: &ClientError) {
        if error.requires_login() {
            self.state = SessionState::Anonymous;
        }
    }

    pub fn user(&self) -> Option<&UserResponse> {
        match &self.state {
            SessionState::Authenticated(user) | SessionState::Unverified(user) => Some(user),
            SessionState::Loading | SessionState::Anonymous => None,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.user().is_some()
    }

    pub fn has_role(&self, required: Role) -> bool {
        self.user().is_some_and(|user| has_role(user.role, required))
    }

    pub fn is_admin(&self) -> bool {
        self.user().is_some_and(|user| user.role == Role::Admin)
    }

    pub fn is_moderator(&self) -> bool {
        self.has_role(Role::Moderator)
    }

    /// Input for the route guard
    pub fn viewer(&self) -> Viewer {
        match &self.state {
            SessionState::Loading => Viewer::Loading,
            SessionState::Anonymous => Viewer::Anonymous,
            SessionState::Authenticated(user) | SessionState::Unverified(user) => Viewer::SignedIn(user.role),
        }
    }
}
