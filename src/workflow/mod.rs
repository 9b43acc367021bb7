//! Organizations and the recruitment workflow.
//!
//! Public submissions land as `pendente`; privileged reviewers move them
//! between states. Any state is reachable from any other, and every move
//! records who made it and when.

pub mod applications;
pub mod organizations;
pub mod staff;

pub use applications::ApplicationWorkflow;
pub use organizations::{generate_slug, OrganizationStore};
pub use staff::StaffApplications;

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Organization not found")]
    OrganizationNotFound,

    #[error("Organization is not accepting applications")]
    NotAccepting,

    #[error("Application not found")]
    ApplicationNotFound,

    #[error("{0}")]
    Conflict(String),

    /// Input that passed request validation but is still unusable
    #[error("{field}: {message}")]
    Invalid { field: String, message: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl WorkflowError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        WorkflowError::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}
