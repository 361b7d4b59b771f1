//! Member reconciliation and calendar engine for Fellowship
//!
//! Pure functions over an in-memory snapshot of member records:
//!
//! - [`date`] parses `YYYY-MM-DD` strings into month/day pairs
//! - [`proximity`] computes the next birthday occurrence for each member
//! - [`duplicates`] clusters records that look like the same person
//! - [`merge`] plans the reconciliation of two duplicate records
//!
//! Nothing here performs I/O. The service crate supplies snapshots and applies
//! the resulting mutation intents.

pub mod date;
pub mod duplicates;
pub mod merge;
pub mod proximity;

mod error;
mod member;

pub use date::{normalize, parse_calendar_date, MonthDay};
pub use duplicates::{find_duplicate_groups, DuplicateGroup};
pub use error::RosterError;
pub use member::{Member, MemberId, MemberStatus, MembershipType, ParseEnumError};
pub use merge::{plan_merge, MergePlan};
pub use proximity::{
    birthdays_in_month, next_occurrences, next_occurrences_with, within_days, LeapDayPolicy,
    ProximityResult,
};
