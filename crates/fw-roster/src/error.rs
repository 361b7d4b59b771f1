use crate::member::{MemberId, MemberStatus, MembershipType};

/// Errors reported by the engine.
///
/// All variants are local to a single call; none of them invalidate the
/// snapshot the caller is working with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RosterError {
    #[error("invalid date format: '{0}' (expected YYYY-MM-DD)")]
    InvalidDateFormat(String),

    #[error("cannot merge member {0} into itself")]
    InvalidMergeTarget(MemberId),

    #[error("status '{status}' is not allowed for membership type '{membership_type}'")]
    StatusNotAllowed {
        membership_type: MembershipType,
        status: MemberStatus,
    },

    #[error("full name cannot be empty")]
    EmptyName,
}
