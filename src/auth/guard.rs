//! Single reusable authorization guard.
//!
//! Every boundary entry point that writes or reads scoped data goes through
//! [`authorize`], which loads the caller's property scope once and returns an
//! [`AuthorizedCaller`] capability. Role and property-membership decisions are
//! made on that object, never re-implemented per call site.

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::AuthContext;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    PropertyManager,
    Staff,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Self::Admin),
            "property_manager" => Some(Self::PropertyManager),
            "staff" => Some(Self::Staff),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::PropertyManager => "property_manager",
            Self::Staff => "staff",
        }
    }
}

/// Which properties a caller may touch.
#[derive(Debug, Clone)]
pub enum PropertyScope {
    /// Admins see every property in the organization.
    All,
    /// Managers and staff see the properties they are members of.
    Assigned(Vec<Uuid>),
}

/// What an entry point requires of the caller.
#[derive(Debug, Clone, Copy)]
pub enum Access {
    /// Any authenticated user.
    Authenticated,
    /// Admins only (template editing, property creation).
    Admin,
    /// Manage data for one property: admin, or an assigned property manager.
    /// Staff are denied regardless of membership.
    ManageProperty(Uuid),
    /// Submit surveys for one property: admin, or any assigned member.
    SubmitForProperty(Uuid),
}

/// Capability object returned by the guard. Checks are pure so the decision
/// logic is testable without a database.
#[derive(Debug, Clone)]
pub struct AuthorizedCaller {
    pub user_id: Uuid,
    pub role: Role,
    scope: PropertyScope,
}

impl AuthorizedCaller {
    pub fn new(user_id: Uuid, role: Role, scope: PropertyScope) -> Self {
        Self {
            user_id,
            role,
            scope,
        }
    }

    pub fn is_assigned_to(&self, property_id: Uuid) -> bool {
        match &self.scope {
            PropertyScope::All => true,
            PropertyScope::Assigned(ids) => ids.contains(&property_id),
        }
    }

    /// Property ids usable in list queries; None means unrestricted.
    pub fn visible_properties(&self) -> Option<&[Uuid]> {
        match &self.scope {
            PropertyScope::All => None,
            PropertyScope::Assigned(ids) => Some(ids),
        }
    }

    pub fn check(&self, access: Access) -> ApiResult<()> {
        let allowed = match access {
            Access::Authenticated => true,
            Access::Admin => self.role == Role::Admin,
            Access::ManageProperty(property_id) => match self.role {
                Role::Admin => true,
                Role::PropertyManager => self.is_assigned_to(property_id),
                Role::Staff => false,
            },
            Access::SubmitForProperty(property_id) => match self.role {
                Role::Admin => true,
                Role::PropertyManager | Role::Staff => self.is_assigned_to(property_id),
            },
        };

        if allowed {
            Ok(())
        } else {
            Err(ApiError::forbidden(match access {
                Access::Authenticated => "Authentication required".to_string(),
                Access::Admin => "Admin role required".to_string(),
                Access::ManageProperty(id) => {
                    format!("Not permitted to manage property {}", id)
                }
                Access::SubmitForProperty(id) => {
                    format!("Not permitted to submit for property {}", id)
                }
            }))
        }
    }
}

/// Load the caller's property scope and check the requirement in one step.
pub async fn authorize(
    db: &PgPool,
    ctx: &AuthContext,
    access: Access,
) -> ApiResult<AuthorizedCaller> {
    let scope = match ctx.role {
        Role::Admin => PropertyScope::All,
        Role::PropertyManager | Role::Staff => {
            let ids: Vec<Uuid> = sqlx::query_scalar(
                "SELECT property_id FROM property_members WHERE user_id = $1",
            )
            .bind(ctx.user_id)
            .fetch_all(db)
            .await?;
            PropertyScope::Assigned(ids)
        }
    };

    let caller = AuthorizedCaller::new(ctx.user_id, ctx.role, scope);
    caller.check(access)?;
    Ok(caller)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(role: Role, assigned: Vec<Uuid>) -> AuthorizedCaller {
        let scope = match role {
            Role::Admin => PropertyScope::All,
            _ => PropertyScope::Assigned(assigned),
        };
        AuthorizedCaller::new(Uuid::new_v4(), role, scope)
    }

    #[test]
    fn admin_passes_every_check() {
        let property = Uuid::new_v4();
        let admin = caller(Role::Admin, vec![]);

        assert!(admin.check(Access::Admin).is_ok());
        assert!(admin.check(Access::ManageProperty(property)).is_ok());
        assert!(admin.check(Access::SubmitForProperty(property)).is_ok());
    }

    #[test]
    fn manager_limited_to_assigned_properties() {
        let assigned = Uuid::new_v4();
        let other = Uuid::new_v4();
        let manager = caller(Role::PropertyManager, vec![assigned]);

        assert!(manager.check(Access::ManageProperty(assigned)).is_ok());
        assert!(manager.check(Access::ManageProperty(other)).is_err());
        assert!(manager.check(Access::Admin).is_err());
    }

    #[test]
    fn staff_never_manage_even_when_assigned() {
        let assigned = Uuid::new_v4();
        let staff = caller(Role::Staff, vec![assigned]);

        assert!(staff.check(Access::ManageProperty(assigned)).is_err());
        assert!(staff.check(Access::SubmitForProperty(assigned)).is_ok());
        assert!(staff
            .check(Access::SubmitForProperty(Uuid::new_v4()))
            .is_err());
    }

    #[test]
    fn unknown_role_string_is_rejected() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("property_manager"), Some(Role::PropertyManager));
        assert_eq!(Role::parse("staff"), Some(Role::Staff));
        assert_eq!(Role::parse("superuser"), None);
    }
}
