use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Access level of an account. Variants are ordered from most to least privileged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Editor,
    #[default]
    Reader,
}

impl Role {
    pub const ALL: [Self; 4] = [Self::SuperAdmin, Self::Admin, Self::Editor, Self::Reader];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "super-admin",
            Self::Admin => "admin",
            Self::Editor => "editor",
            Self::Reader => "reader",
        }
    }

    const fn rank(self) -> u8 {
        match self {
            Self::SuperAdmin => 3,
            Self::Admin => 2,
            Self::Editor => 1,
            Self::Reader => 0,
        }
    }

    /// Whether this role grants at least the privileges of `min`.
    #[must_use]
    pub const fn at_least(self, min: Self) -> bool {
        self.rank() >= min.rank()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: '{0}'")]
pub struct ParseRoleError(pub String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| ParseRoleError(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RoleChangeError {
    #[error("Only admins can change roles")]
    NotAnAdmin,
    #[error("Only a super-admin can grant the super-admin role")]
    CannotGrantSuperAdmin,
    #[error("Only a super-admin can change another super-admin")]
    CannotModifySuperAdmin,
}

/// Check whether `actor` may move an account from `current` to `requested`.
///
/// # Errors
///
/// Returns the rule that forbids the change.
pub const fn check_role_change(
    actor: Role,
    current: Role,
    requested: Role,
) -> Result<(), RoleChangeError> {
    if !actor.at_least(Role::Admin) {
        return Err(RoleChangeError::NotAnAdmin);
    }
    if matches!(actor, Role::SuperAdmin) {
        return Ok(());
    }
    if matches!(requested, Role::SuperAdmin) {
        return Err(RoleChangeError::CannotGrantSuperAdmin);
    }
    if matches!(current, Role::SuperAdmin) {
        return Err(RoleChangeError::CannotModifySuperAdmin);
    }
    Ok(())
}
