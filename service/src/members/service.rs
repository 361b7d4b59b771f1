//! Member operations: validation, calendar views, reconciliation.
//!
//! Every engine call runs over a single `list_members()` snapshot. Mutations go
//! through the repo and are announced on a broadcast channel afterwards.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use fw_roster::{
    birthdays_in_month, find_duplicate_groups, next_occurrences_with, normalize, plan_merge,
    within_days, DuplicateGroup, Member, MemberId, MemberStatus, MembershipType, RosterError,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use utoipa::ToSchema;
use uuid::Uuid;

use super::repo::{MemberRepo, MemberRepoError};
use crate::config::CalendarConfig;
use crate::identity::repo::{Account, AccountRepo, AccountRepoError};

const EVENT_CAPACITY: usize = 64;

/// Change announced after a successful mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum MemberEvent {
    Created { id: MemberId },
    Updated { id: MemberId },
    Deleted { id: MemberId },
    Merged { primary_id: MemberId, removed_id: MemberId },
}

#[derive(Debug, thiserror::Error)]
pub enum MemberServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("Member not found")]
    NotFound,
    #[error("{0}")]
    Conflict(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<MemberRepoError> for MemberServiceError {
    fn from(e: MemberRepoError) -> Self {
        match e {
            MemberRepoError::NotFound => Self::NotFound,
            MemberRepoError::LinkedAccountTaken => {
                Self::Conflict("Account is already linked to another member".to_string())
            }
            MemberRepoError::UnknownAccount => {
                Self::Validation("Linked account does not exist".to_string())
            }
            MemberRepoError::InvalidRow(_) | MemberRepoError::Database(_) => {
                tracing::error!("member repo failure: {e}");
                Self::Internal("Internal server error".to_string())
            }
        }
    }
}

impl From<RosterError> for MemberServiceError {
    fn from(e: RosterError) -> Self {
        Self::Validation(e.to_string())
    }
}

fn account_error(e: AccountRepoError) -> MemberServiceError {
    match e {
        AccountRepoError::NotFound => MemberServiceError::Validation("Account not found".into()),
        other => {
            tracing::error!("account repo failure: {other}");
            MemberServiceError::Internal("Internal server error".to_string())
        }
    }
}

/// Editable member fields as submitted by a client.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct MemberInput {
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub birth_date: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "congregant")]
    pub membership_type: Option<MembershipType>,
    /// Omit to keep the current status, or use the type's default when it no longer fits.
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "active")]
    pub status: Option<MemberStatus>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberFilter {
    /// Case-insensitive substring of the full name.
    pub search: Option<String>,
    #[serde(rename = "type")]
    pub membership_type: Option<MembershipType>,
}

/// Profile data a user submits when finishing sign-up.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ProfileInput {
    pub birth_date: String,
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "congregant")]
    pub membership_type: Option<MembershipType>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct UpcomingBirthday {
    #[schema(value_type = String)]
    pub member_id: MemberId,
    pub full_name: String,
    pub days_until_next_occurrence: i64,
    pub next_occurrence_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct MemberStats {
    pub total_members: usize,
    pub birthdays_this_month: usize,
    pub upcoming_birthdays: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct EmailSyncReport {
    pub updated: usize,
    pub already_set: usize,
    pub unlinked: usize,
    pub failed: usize,
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn clean_birth_date(value: Option<String>) -> Result<Option<String>, MemberServiceError> {
    let value = clean(value);
    if let Some(date) = &value {
        normalize(date)?;
    }
    Ok(value)
}

fn resolve_status(
    membership_type: MembershipType,
    requested: Option<MemberStatus>,
    current: Option<MemberStatus>,
) -> Result<MemberStatus, MemberServiceError> {
    match requested {
        Some(status) if membership_type.allows(status) => Ok(status),
        Some(status) => Err(RosterError::StatusNotAllowed {
            membership_type,
            status,
        }
        .into()),
        None => Ok(current.map_or_else(
            || membership_type.default_status(),
            |s| s.reconcile(membership_type),
        )),
    }
}

pub struct MemberService {
    members: Arc<dyn MemberRepo>,
    accounts: Arc<dyn AccountRepo>,
    calendar: CalendarConfig,
    events: broadcast::Sender<MemberEvent>,
}

impl MemberService {
    #[must_use]
    pub fn new(
        members: Arc<dyn MemberRepo>,
        accounts: Arc<dyn AccountRepo>,
        calendar: CalendarConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            members,
            accounts,
            calendar,
            events,
        }
    }

    /// Receive a [`MemberEvent`] for every subsequent successful mutation.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<MemberEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub const fn calendar(&self) -> &CalendarConfig {
        &self.calendar
    }

    fn emit(&self, event: MemberEvent) {
        tracing::debug!(?event, "member event");
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    /// # Errors
    /// Returns an internal error when the snapshot cannot be read.
    pub async fn snapshot(&self) -> Result<Vec<Member>, MemberServiceError> {
        Ok(self.members.list_members().await?)
    }

    /// # Errors
    /// Returns an internal error when the snapshot cannot be read.
    pub async fn list(&self, filter: &MemberFilter) -> Result<Vec<Member>, MemberServiceError> {
        let needle = filter
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        Ok(self
            .snapshot()
            .await?
            .into_iter()
            .filter(|m| {
                needle
                    .as_deref()
                    .is_none_or(|n| m.full_name.to_lowercase().contains(n))
            })
            .filter(|m| {
                filter
                    .membership_type
                    .is_none_or(|t| m.membership_type == t)
            })
            .collect())
    }

    /// # Errors
    /// Returns `NotFound` for an unknown id.
    pub async fn get(&self, id: &MemberId) -> Result<Member, MemberServiceError> {
        Ok(self.members.get_member(id).await?)
    }

    /// # Errors
    /// Returns `Validation` for a blank name, malformed birth date or a status
    /// the membership type does not allow.
    pub async fn create(&self, input: MemberInput) -> Result<Member, MemberServiceError> {
        let membership_type = input.membership_type.unwrap_or(MembershipType::Congregant);
        let member = Member {
            id: MemberId::new(Uuid::new_v4().to_string()),
            full_name: input.full_name.trim().to_string(),
            email: clean(input.email),
            phone_number: clean(input.phone_number),
            birth_date: clean_birth_date(input.birth_date)?,
            membership_type,
            status: resolve_status(membership_type, input.status, None)?,
            linked_account_id: None,
            notes: clean(input.notes),
        };
        member.validate()?;

        let created = self.members.create_member(&member).await?;
        tracing::info!(member_id = %created.id, "member created");
        self.emit(MemberEvent::Created {
            id: created.id.clone(),
        });
        Ok(created)
    }

    /// Replace the editable fields of a member. The account link is preserved.
    ///
    /// # Errors
    /// Same as [`Self::create`], plus `NotFound`.
    pub async fn update(
        &self,
        id: &MemberId,
        input: MemberInput,
    ) -> Result<Member, MemberServiceError> {
        let current = self.members.get_member(id).await?;
        let membership_type = input.membership_type.unwrap_or(current.membership_type);
        let member = Member {
            id: current.id.clone(),
            full_name: input.full_name.trim().to_string(),
            email: clean(input.email),
            phone_number: clean(input.phone_number),
            birth_date: clean_birth_date(input.birth_date)?,
            membership_type,
            status: resolve_status(membership_type, input.status, Some(current.status))?,
            linked_account_id: current.linked_account_id,
            notes: clean(input.notes),
        };
        member.validate()?;

        let updated = self.members.update_member(&member).await?;
        tracing::info!(member_id = %updated.id, "member updated");
        self.emit(MemberEvent::Updated {
            id: updated.id.clone(),
        });
        Ok(updated)
    }

    /// # Errors
    /// Returns `NotFound` for an unknown id.
    pub async fn delete(&self, id: &MemberId) -> Result<(), MemberServiceError> {
        self.members.delete_member(id).await?;
        tracing::info!(member_id = %id, "member deleted");
        self.emit(MemberEvent::Deleted { id: id.clone() });
        Ok(())
    }

    /// Birthdays within `within` days of `reference`, soonest first, at most `limit`.
    ///
    /// Both bounds default to the calendar configuration.
    ///
    /// # Errors
    /// Returns `Validation` for a negative window or zero limit.
    pub async fn upcoming_birthdays(
        &self,
        reference: NaiveDate,
        within: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<UpcomingBirthday>, MemberServiceError> {
        let within = within.unwrap_or(self.calendar.upcoming_window_days);
        let limit = limit.unwrap_or(self.calendar.upcoming_limit);
        if within < 0 {
            return Err(MemberServiceError::Validation(
                "within cannot be negative".into(),
            ));
        }
        if limit == 0 {
            return Err(MemberServiceError::Validation(
                "limit must be at least 1".into(),
            ));
        }

        let members = self.snapshot().await?;
        let results = next_occurrences_with(&members, reference, self.calendar.leap_day_policy);
        let upcoming = within_days(&results, within);

        Ok(upcoming
            .into_iter()
            .take(limit)
            .filter_map(|r| {
                let member = members.iter().find(|m| m.id == r.member_id)?;
                Some(UpcomingBirthday {
                    full_name: member.full_name.clone(),
                    member_id: r.member_id,
                    days_until_next_occurrence: r.days_until_next_occurrence,
                    next_occurrence_date: r.next_occurrence_date,
                })
            })
            .collect())
    }

    /// Dashboard counters relative to `reference`.
    ///
    /// # Errors
    /// Returns an internal error when the snapshot cannot be read.
    pub async fn stats(&self, reference: NaiveDate) -> Result<MemberStats, MemberServiceError> {
        let members = self.snapshot().await?;
        let results = next_occurrences_with(&members, reference, self.calendar.leap_day_policy);
        Ok(MemberStats {
            total_members: members.len(),
            birthdays_this_month: birthdays_in_month(&members, reference.month()),
            upcoming_birthdays: within_days(&results, self.calendar.upcoming_window_days).len(),
        })
    }

    /// # Errors
    /// Returns an internal error when the snapshot cannot be read.
    pub async fn duplicates(&self) -> Result<Vec<DuplicateGroup>, MemberServiceError> {
        let members = self.snapshot().await?;
        let groups = find_duplicate_groups(&members);
        tracing::info!(groups = groups.len(), members = members.len(), "duplicate scan");
        Ok(groups)
    }

    /// Merge `secondary_id` into `primary_id`.
    ///
    /// The primary is updated first; the secondary is deleted only after that
    /// succeeds. When the primary takes over the secondary's account link,
    /// releasing it and updating the primary happen in one transaction. A
    /// failed delete leaves both records in place with the primary
    /// already updated, which a later merge resolves idempotently.
    ///
    /// # Errors
    /// Returns `Validation` when both ids are equal and `NotFound` when either
    /// record is missing.
    pub async fn merge(
        &self,
        primary_id: &MemberId,
        secondary_id: &MemberId,
    ) -> Result<Member, MemberServiceError> {
        if primary_id == secondary_id {
            return Err(RosterError::InvalidMergeTarget(primary_id.clone()).into());
        }
        let primary = self.members.get_member(primary_id).await?;
        let secondary = self.members.get_member(secondary_id).await?;
        let plan = plan_merge(&primary, &secondary)?;

        let takes_link = secondary.linked_account_id.is_some()
            && plan.merged_record.linked_account_id == secondary.linked_account_id;
        let merged = if takes_link {
            self.members
                .update_member_taking_link(&plan.merged_record, &plan.delete_id)
                .await?
        } else {
            self.members.update_member(&plan.merged_record).await?
        };
        tracing::info!(primary_id = %merged.id, secondary_id = %plan.delete_id, "merge: primary updated");

        if let Err(e) = self.members.delete_member(&plan.delete_id).await {
            tracing::error!(
                primary_id = %merged.id,
                secondary_id = %plan.delete_id,
                "merge: primary updated but secondary delete failed: {e}"
            );
            return Err(e.into());
        }
        tracing::info!(primary_id = %merged.id, secondary_id = %plan.delete_id, "merge: secondary deleted");

        self.emit(MemberEvent::Merged {
            primary_id: merged.id.clone(),
            removed_id: plan.delete_id,
        });
        Ok(merged)
    }

    /// Fill empty member emails from their linked accounts.
    ///
    /// A member whose update fails is counted in `failed` and skipped.
    ///
    /// # Errors
    /// Returns an internal error when the snapshot or an account lookup fails.
    pub async fn sync_emails(&self, dry_run: bool) -> Result<EmailSyncReport, MemberServiceError> {
        let mut report = EmailSyncReport::default();

        for member in self.snapshot().await? {
            if clean(member.email.clone()).is_some() {
                report.already_set += 1;
                continue;
            }
            let Some(account_id) = member.linked_account_id.as_deref() else {
                report.unlinked += 1;
                continue;
            };
            let email = match self.accounts.get_account(account_id).await {
                Ok(account) => clean(Some(account.email)),
                Err(AccountRepoError::NotFound) => None,
                Err(e) => return Err(account_error(e)),
            };
            let Some(email) = email else {
                report.unlinked += 1;
                continue;
            };

            if !dry_run {
                let mut updated = member.clone();
                updated.email = Some(email);
                if let Err(e) = self.members.update_member(&updated).await {
                    tracing::warn!(member_id = %member.id, "member email sync failed: {e}");
                    report.failed += 1;
                    continue;
                }
                self.emit(MemberEvent::Updated {
                    id: updated.id.clone(),
                });
            }
            tracing::info!(member_id = %member.id, dry_run, "member email synced");
            report.updated += 1;
        }

        Ok(report)
    }

    /// Store profile data on the account and create or update its linked member.
    ///
    /// # Errors
    /// Returns `Validation` for a malformed birth date.
    pub async fn complete_profile(
        &self,
        account: &Account,
        input: ProfileInput,
    ) -> Result<Member, MemberServiceError> {
        let birth_date = input.birth_date.trim().to_string();
        normalize(&birth_date)?;
        let phone = clean(input.phone_number);

        self.accounts
            .update_profile(&account.id, &birth_date, phone.as_deref())
            .await
            .map_err(account_error)?;

        if let Some(mut member) = self.members.find_by_linked_account(&account.id).await? {
            member.birth_date = Some(birth_date);
            if phone.is_some() {
                member.phone_number = phone;
            }
            if let Some(t) = input.membership_type {
                member.set_membership_type(t);
            }
            if clean(member.email.clone()).is_none() {
                member.email = clean(Some(account.email.clone()));
            }
            let updated = self.members.update_member(&member).await?;
            tracing::info!(member_id = %updated.id, account_id = %account.id, "linked member updated from profile");
            self.emit(MemberEvent::Updated {
                id: updated.id.clone(),
            });
            return Ok(updated);
        }

        let membership_type = input.membership_type.unwrap_or(MembershipType::Congregant);
        let full_name = account
            .display_name
            .clone()
            .and_then(|n| clean(Some(n)))
            .unwrap_or_else(|| account.email.clone());
        let member = Member {
            id: MemberId::new(Uuid::new_v4().to_string()),
            full_name,
            email: clean(Some(account.email.clone())),
            notes: Some(format!(
                "Self-registered. Phone: {}",
                phone.as_deref().unwrap_or("-")
            )),
            phone_number: phone,
            birth_date: Some(birth_date),
            membership_type,
            status: membership_type.default_status(),
            linked_account_id: Some(account.id.clone()),
        };
        member.validate()?;

        let created = self.members.create_member(&member).await?;
        tracing::info!(member_id = %created.id, account_id = %account.id, "member self-registered");
        self.emit(MemberEvent::Created {
            id: created.id.clone(),
        });
        Ok(created)
    }
}
