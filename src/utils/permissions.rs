use crate::middleware::auth::AuthUser;
use crate::models::user::Role;
use crate::utils::error::{AppError, AppResult};

/// Outcome of an access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(String),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> AppResult<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(AppError::Forbidden(reason)),
        }
    }
}

/// Explicit set of roles a route admits. Roles are not ordered: admitting
/// `Developer` says nothing about `Admin` unless both are listed.
#[derive(Debug, Clone, Copy)]
pub struct RoleSet(&'static [Role]);

impl RoleSet {
    pub const ADMIN_ONLY: RoleSet = RoleSet(&[Role::Admin]);
    pub const DEVELOPER_OR_ADMIN: RoleSet = RoleSet(&[Role::Developer, Role::Admin]);

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    fn describe(&self) -> String {
        self.0
            .iter()
            .map(Role::as_str)
            .collect::<Vec<_>>()
            .join(" or ")
    }
}

pub fn authorize(user: &AuthUser, allowed: RoleSet) -> Decision {
    if allowed.contains(user.role) {
        Decision::Allow
    } else {
        Decision::Deny(format!(
            "Role '{}' may not access this route (requires {})",
            user.role,
            allowed.describe()
        ))
    }
}

/// The resource owner may act on it; admins may act on anything.
pub fn authorize_owner_or_admin(user: &AuthUser, owner_id: i64) -> Decision {
    if user.id == owner_id || user.role == Role::Admin {
        Decision::Allow
    } else {
        Decision::Deny("Only the owner or an admin may do this".to_string())
    }
}

pub fn require_role(user: &AuthUser, allowed: RoleSet) -> AppResult<()> {
    authorize(user, allowed).into_result()
}

pub fn require_owner_or_admin(user: &AuthUser, owner_id: i64) -> AppResult<()> {
    authorize_owner_or_admin(user, owner_id).into_result()
}
