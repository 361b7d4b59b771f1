//! Member record and its closed classifications.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RosterError;

/// Opaque member identifier assigned by the persistence layer.
///
/// Ordered lexicographically, which is the tie-break order used by the
/// proximity calculator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(String);

impl MemberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for MemberId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for MemberId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Returned by `FromStr` for [`MembershipType`] and [`MemberStatus`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MembershipType {
    Pastor,
    Leader,
    ManOfHouse,
    WomanOfHouse,
    Congregant,
}

const HOUSE_STATUSES: &[MemberStatus] = &[
    MemberStatus::InProcess,
    MemberStatus::Graduated,
    MemberStatus::Withdrawn,
];

const GENERAL_STATUSES: &[MemberStatus] = &[MemberStatus::Active, MemberStatus::Inactive];

impl MembershipType {
    pub const ALL: [Self; 5] = [
        Self::Pastor,
        Self::Leader,
        Self::ManOfHouse,
        Self::WomanOfHouse,
        Self::Congregant,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pastor => "pastor",
            Self::Leader => "leader",
            Self::ManOfHouse => "man-of-house",
            Self::WomanOfHouse => "woman-of-house",
            Self::Congregant => "congregant",
        }
    }

    /// House programs track progress through the program rather than activity.
    #[must_use]
    pub const fn is_house_role(self) -> bool {
        matches!(self, Self::ManOfHouse | Self::WomanOfHouse)
    }

    /// Statuses a member of this type may hold. The first entry is the default.
    #[must_use]
    pub const fn allowed_statuses(self) -> &'static [MemberStatus] {
        if self.is_house_role() {
            HOUSE_STATUSES
        } else {
            GENERAL_STATUSES
        }
    }

    #[must_use]
    pub const fn default_status(self) -> MemberStatus {
        if self.is_house_role() {
            MemberStatus::InProcess
        } else {
            MemberStatus::Active
        }
    }

    #[must_use]
    pub fn allows(self, status: MemberStatus) -> bool {
        self.allowed_statuses().contains(&status)
    }
}

impl fmt::Display for MembershipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "membership type",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemberStatus {
    Active,
    Inactive,
    Graduated,
    InProcess,
    Withdrawn,
}

impl MemberStatus {
    pub const ALL: [Self; 5] = [
        Self::Active,
        Self::Inactive,
        Self::Graduated,
        Self::InProcess,
        Self::Withdrawn,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Graduated => "graduated",
            Self::InProcess => "in-process",
            Self::Withdrawn => "withdrawn",
        }
    }

    /// Keep this status if `membership_type` allows it, otherwise fall back to
    /// the type's default.
    #[must_use]
    pub fn reconcile(self, membership_type: MembershipType) -> Self {
        if membership_type.allows(self) {
            self
        } else {
            membership_type.default_status()
        }
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "member status",
                value: s.to_string(),
            })
    }
}

/// One community member as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    /// `YYYY-MM-DD`; only month and day matter for recurrence.
    #[serde(default)]
    pub birth_date: Option<String>,
    pub membership_type: MembershipType,
    pub status: MemberStatus,
    #[serde(default)]
    pub linked_account_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Member {
    /// A congregant with no optional fields set.
    pub fn new(id: impl Into<MemberId>, full_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            full_name: full_name.into(),
            email: None,
            phone_number: None,
            birth_date: None,
            membership_type: MembershipType::Congregant,
            status: MembershipType::Congregant.default_status(),
            linked_account_id: None,
            notes: None,
        }
    }

    /// Change the membership type, resetting the status if it is no longer allowed.
    pub fn set_membership_type(&mut self, membership_type: MembershipType) {
        self.membership_type = membership_type;
        self.status = self.status.reconcile(membership_type);
    }

    /// # Errors
    ///
    /// Returns [`RosterError::EmptyName`] for a blank name and
    /// [`RosterError::StatusNotAllowed`] when the status does not fit the type.
    pub fn validate(&self) -> Result<(), RosterError> {
        if self.full_name.trim().is_empty() {
            return Err(RosterError::EmptyName);
        }
        if !self.membership_type.allows(self.status) {
            return Err(RosterError::StatusNotAllowed {
                membership_type: self.membership_type,
                status: self.status,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn house_roles_use_program_statuses() {
        for t in [MembershipType::ManOfHouse, MembershipType::WomanOfHouse] {
            assert_eq!(
                t.allowed_statuses(),
                &[
                    MemberStatus::InProcess,
                    MemberStatus::Graduated,
                    MemberStatus::Withdrawn
                ]
            );
        }
        for t in [
            MembershipType::Pastor,
            MembershipType::Leader,
            MembershipType::Congregant,
        ] {
            assert_eq!(
                t.allowed_statuses(),
                &[MemberStatus::Active, MemberStatus::Inactive]
            );
        }
    }

    #[test]
    fn default_status_is_first_allowed() {
        for t in MembershipType::ALL {
            assert_eq!(t.default_status(), t.allowed_statuses()[0]);
        }
    }

    #[test]
    fn changing_type_resets_invalid_status() {
        let mut member = Member::new("m1", "Ana");
        member.status = MemberStatus::Inactive;

        member.set_membership_type(MembershipType::ManOfHouse);
        assert_eq!(member.status, MemberStatus::InProcess);

        member.status = MemberStatus::Graduated;
        member.set_membership_type(MembershipType::WomanOfHouse);
        assert_eq!(member.status, MemberStatus::Graduated);

        member.set_membership_type(MembershipType::Leader);
        assert_eq!(member.status, MemberStatus::Active);
    }

    #[test]
    fn validate_rejects_mismatched_status() {
        let mut member = Member::new("m1", "Ana");
        member.status = MemberStatus::Graduated;
        assert_eq!(
            member.validate(),
            Err(RosterError::StatusNotAllowed {
                membership_type: MembershipType::Congregant,
                status: MemberStatus::Graduated,
            })
        );
    }

    #[test]
    fn validate_rejects_blank_name() {
        let member = Member::new("m1", "   ");
        assert_eq!(member.validate(), Err(RosterError::EmptyName));
    }

    #[test]
    fn enums_round_trip_through_strings() {
        for t in MembershipType::ALL {
            assert_eq!(t.as_str().parse::<MembershipType>(), Ok(t));
        }
        for s in MemberStatus::ALL {
            assert_eq!(s.as_str().parse::<MemberStatus>(), Ok(s));
        }
        assert!("lider".parse::<MembershipType>().is_err());
    }

    #[test]
    fn enums_serialize_kebab_case() {
        let json = serde_json::to_string(&MembershipType::WomanOfHouse).expect("serialize");
        assert_eq!(json, "\"woman-of-house\"");
        let json = serde_json::to_string(&MemberStatus::InProcess).expect("serialize");
        assert_eq!(json, "\"in-process\"");
    }

    #[test]
    fn member_id_is_transparent() {
        let id: MemberId = serde_json::from_str("\"abc\"").expect("deserialize");
        assert_eq!(id.as_str(), "abc");
    }
}
