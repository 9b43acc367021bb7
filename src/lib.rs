pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod guard;
pub mod workflow;

pub use db::DbPool;

use config::Config;
use std::sync::Arc;

use crate::api::rate_limit::RateLimiter;
use crate::auth::{AuthService, LockoutPolicy, TokenService, UserDirectory};
use crate::workflow::{ApplicationWorkflow, OrganizationStore, StaffApplications};

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub tokens: Arc<TokenService>,
    pub auth: AuthService,
    pub users: UserDirectory,
    pub organizations: OrganizationStore,
    pub workflow: ApplicationWorkflow,
    pub staff: StaffApplications,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let tokens = Arc::new(TokenService::from_config(&config.auth));
        let auth = AuthService::new(
            db.clone(),
            tokens.clone(),
            LockoutPolicy::from_config(&config.auth),
        );
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));

        Self {
            users: UserDirectory::new(db.clone()),
            organizations: OrganizationStore::new(db.clone()),
            workflow: ApplicationWorkflow::new(db.clone()),
            staff: StaffApplications::new(db.clone()),
            tokens,
            auth,
            rate_limiter,
            config,
            db,
        }
    }
}
