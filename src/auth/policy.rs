//! Role hierarchy checks.
//!
//! `user < chefe_organizacao < moderator < admin`. There is no per-resource
//! ownership check: a role grants its privilege level everywhere.

use super::{AuthError, Identity};
use crate::db::Role;

/// True iff `held` is at least as privileged as `required`
pub fn has_role(held: Role, required: Role) -> bool {
    held.has_at_least(required)
}

/// Require at least `required` in the hierarchy
pub fn require_role(identity: &Identity, required: Role) -> Result<(), AuthError> {
    if has_role(identity.role, required) {
        Ok(())
    } else {
        Err(AuthError::Forbidden {
            held: identity.role,
            required,
        })
    }
}

/// Require exactly `role` (admin-only surfaces)
pub fn require_exact(identity: &Identity, role: Role) -> Result<(), AuthError> {
    if identity.role == role {
        Ok(())
    } else {
        Err(AuthError::Forbidden {
            held: identity.role,
            required: role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(role: Role) -> Identity {
        Identity {
            user_id: "id".to_string(),
            username: "name".to_string(),
            email: "name@example.com".to_string(),
            role,
        }
    }

    #[test]
    fn test_has_role_is_reflexive() {
        for role in Role::ALL {
            assert!(has_role(role, role), "{} should satisfy itself", role);
        }
    }

    #[test]
    fn test_admin_satisfies_everything() {
        for role in Role::ALL {
            assert!(has_role(Role::Admin, role));
        }
    }

    #[test]
    fn test_user_does_not_satisfy_moderator() {
        assert!(!has_role(Role::User, Role::Moderator));
        assert!(!has_role(Role::ChefeOrganizacao, Role::Moderator));
        assert!(has_role(Role::Moderator, Role::ChefeOrganizacao));
    }

    #[test]
    fn test_has_role_is_monotonic() {
        for held in Role::ALL {
            for required in Role::ALL {
                assert_eq!(has_role(held, required), held.level() >= required.level());
            }
        }
    }

    #[test]
    fn test_require_role_reports_both_roles() {
        let err = require_role(&identity(Role::Moderator), Role::Admin).unwrap_err();
        match err {
            AuthError::Forbidden { held, required } => {
                assert_eq!(held, Role::Moderator);
                assert_eq!(required, Role::Admin);
            }
            other => panic!("expected Forbidden, got {:?}", other),
        }
        assert!(require_role(&identity(Role::Admin), Role::Moderator).is_ok());
    }

    #[test]
    fn test_require_exact_rejects_higher_and_lower() {
        assert!(require_exact(&identity(Role::Admin), Role::Admin).is_ok());
        assert!(require_exact(&identity(Role::Moderator), Role::Admin).is_err());
        assert!(require_exact(&identity(Role::Admin), Role::Moderator).is_err());
    }
}
