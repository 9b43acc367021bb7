//! Page access decisions for the front end.
//!
//! Advisory only: the API enforces every rule again on its own.

use serde::Serialize;

use crate::auth::has_role;
use crate::db::Role;

pub const LOGIN_PATH: &str = "/entrar";
pub const HOME_PATH: &str = "/";

/// Who is looking at the page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    /// Stored session not yet checked against the server
    Loading,
    Anonymous,
    SignedIn(Role),
}

/// What a page asks of its viewer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRequirement {
    /// `false` marks login-only pages such as the sign-in form
    pub require_auth: bool,
    pub require_role: Option<Role>,
    /// Where signed-in viewers of a login-only page are sent
    pub redirect_to: String,
}

impl Default for RouteRequirement {
    fn default() -> Self {
        Self {
            require_auth: true,
            require_role: None,
            redirect_to: HOME_PATH.to_string(),
        }
    }
}

impl RouteRequirement {
    pub fn authenticated() -> Self {
        Self::default()
    }

    pub fn role(role: Role) -> Self {
        Self {
            require_role: Some(role),
            ..Self::default()
        }
    }

    pub fn guest_only(redirect_to: impl Into<String>) -> Self {
        Self {
            require_auth: false,
            require_role: None,
            redirect_to: redirect_to.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationAction {
    /// Back to the previous page
    Back,
    Home,
}

/// The in-place "access restricted" screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestrictedView {
    pub title: &'static str,
    pub message: String,
    pub held: Option<Role>,
    pub held_label: &'static str,
    pub required: Role,
    pub required_label: &'static str,
    pub actions: Vec<NavigationAction>,
}

impl RestrictedView {
    fn new(held: Option<Role>, required: Role) -> Self {
        let hint = match required {
            Role::Admin => " É necessário ser administrador.",
            Role::Moderator => " É necessário ser moderador ou superior.",
            Role::ChefeOrganizacao => " É necessário ser chefe de organização ou superior.",
            Role::User => "",
        };

        Self {
            title: "Acesso Restrito",
            message: format!("Não tem permissões suficientes para aceder a esta página.{}", hint),
            held,
            held_label: held.unwrap_or(Role::User).label(),
            required,
            required_label: required.label(),
            actions: vec![NavigationAction::Back, NavigationAction::Home],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Show a spinner until the session is verified
    Loading,
    Render,
    /// `from` is the page to come back to after signing in
    Redirect { to: String, from: String },
    Restricted(RestrictedView),
}

/// Decide what `path` shows to `viewer`
pub fn evaluate(viewer: Viewer, requirement: &RouteRequirement, path: &str) -> GuardOutcome {
    let held = match viewer {
        Viewer::Loading => return GuardOutcome::Loading,
        Viewer::Anonymous => None,
        Viewer::SignedIn(role) => Some(role),
    };

    match (requirement.require_auth, held) {
        (false, Some(_)) => {
            return GuardOutcome::Redirect {
                to: requirement.redirect_to.clone(),
                from: path.to_string(),
            }
        }
        (true, None) => {
            return GuardOutcome::Redirect {
                to: LOGIN_PATH.to_string(),
                from: path.to_string(),
            }
        }
        _ => {}
    }

    match requirement.require_role {
        Some(required) if !held.is_some_and(|role| has_role(role, required)) => {
            GuardOutcome::Restricted(RestrictedView::new(held, required))
        }
        _ => GuardOutcome::Render,
    }
}
