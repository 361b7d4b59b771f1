//! Field-level reconciliation of two duplicate records.

use serde::Serialize;

use crate::error::RosterError;
use crate::member::{Member, MemberId};

const NOTES_DELIMITER: &str = " | ";

/// Intended mutations for one merge: overwrite the primary with
/// `merged_record`, then delete `delete_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergePlan {
    pub merged_record: Member,
    pub delete_id: MemberId,
}

fn present(value: Option<&String>) -> Option<&String> {
    value.filter(|v| !v.trim().is_empty())
}

fn prefer(primary: Option<&String>, secondary: Option<&String>) -> Option<String> {
    present(primary).or_else(|| present(secondary)).cloned()
}

fn join_notes(primary: Option<&String>, secondary: Option<&String>) -> Option<String> {
    match (present(primary), present(secondary)) {
        (Some(p), Some(s)) => Some(format!("{p}{NOTES_DELIMITER}{s}")),
        (Some(only), None) | (None, Some(only)) => Some(only.clone()),
        (None, None) => None,
    }
}

/// Plan merging `secondary` into `primary`.
///
/// Contact fields (email, phone, birth date) and the account link keep the
/// primary's value when it is non-empty and otherwise take the secondary's.
/// Name, membership type and status always come from the primary. Notes are
/// concatenated.
///
/// # Errors
///
/// Returns [`RosterError::InvalidMergeTarget`] when both records share an id.
pub fn plan_merge(primary: &Member, secondary: &Member) -> Result<MergePlan, RosterError> {
    if primary.id == secondary.id {
        return Err(RosterError::InvalidMergeTarget(primary.id.clone()));
    }

    let merged_record = Member {
        id: primary.id.clone(),
        full_name: primary.full_name.clone(),
        email: prefer(primary.email.as_ref(), secondary.email.as_ref()),
        phone_number: prefer(primary.phone_number.as_ref(), secondary.phone_number.as_ref()),
        birth_date: prefer(primary.birth_date.as_ref(), secondary.birth_date.as_ref()),
        membership_type: primary.membership_type,
        status: primary.status,
        linked_account_id: prefer(
            primary.linked_account_id.as_ref(),
            secondary.linked_account_id.as_ref(),
        ),
        notes: join_notes(primary.notes.as_ref(), secondary.notes.as_ref()),
    };

    Ok(MergePlan {
        merged_record,
        delete_id: secondary.id.clone(),
    })
}
