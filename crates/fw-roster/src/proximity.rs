//! Next-birthday computation relative to a reference date.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::date::{normalize, MonthDay};
use crate::member::{Member, MemberId};

/// Where a February 29 birthday lands in a year without one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeapDayPolicy {
    #[default]
    #[serde(rename = "clamp-to-feb28")]
    ClampToFeb28,
    #[serde(rename = "roll-to-march1")]
    RollToMarch1,
}

/// Derived view of one member's next birthday. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProximityResult {
    pub member_id: MemberId,
    pub days_until_next_occurrence: i64,
    pub next_occurrence_date: NaiveDate,
}

fn occurrence_in(year: i32, md: MonthDay, policy: LeapDayPolicy) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, md.month, md.day).or_else(|| {
        if !md.is_leap_day() {
            return None;
        }
        match policy {
            LeapDayPolicy::ClampToFeb28 => NaiveDate::from_ymd_opt(year, 2, 28),
            LeapDayPolicy::RollToMarch1 => NaiveDate::from_ymd_opt(year, 3, 1),
        }
    })
}

fn next_occurrence(md: MonthDay, reference: NaiveDate, policy: LeapDayPolicy) -> Option<NaiveDate> {
    let this_year = occurrence_in(reference.year(), md, policy)?;
    if this_year < reference {
        occurrence_in(reference.year() + 1, md, policy)
    } else {
        Some(this_year)
    }
}

/// Next birthday for every member with a usable birth date, using the default
/// [`LeapDayPolicy`].
#[must_use]
pub fn next_occurrences(members: &[Member], reference: NaiveDate) -> Vec<ProximityResult> {
    next_occurrences_with(members, reference, LeapDayPolicy::default())
}

/// Next birthday for every member with a usable birth date.
///
/// Members without a birth date, or with one that fails to normalize, are
/// left out. Results are sorted by days until the occurrence, then by member id.
#[must_use]
pub fn next_occurrences_with(
    members: &[Member],
    reference: NaiveDate,
    policy: LeapDayPolicy,
) -> Vec<ProximityResult> {
    let mut results: Vec<ProximityResult> = members
        .iter()
        .filter_map(|member| {
            let md = normalize(member.birth_date.as_deref()?).ok()?;
            let next = next_occurrence(md, reference, policy)?;
            Some(ProximityResult {
                member_id: member.id.clone(),
                days_until_next_occurrence: (next - reference).num_days(),
                next_occurrence_date: next,
            })
        })
        .collect();

    results.sort_by(|a, b| {
        a.days_until_next_occurrence
            .cmp(&b.days_until_next_occurrence)
            .then_with(|| a.member_id.cmp(&b.member_id))
    });
    results
}

/// Keep results occurring within `max_days` of the reference date (inclusive).
#[must_use]
pub fn within_days(results: &[ProximityResult], max_days: i64) -> Vec<ProximityResult> {
    results
        .iter()
        .filter(|r| r.days_until_next_occurrence <= max_days)
        .cloned()
        .collect()
}

/// Count members whose birthday falls in `month` (1-12).
#[must_use]
pub fn birthdays_in_month(members: &[Member], month: u32) -> usize {
    members
        .iter()
        .filter_map(|m| normalize(m.birth_date.as_deref()?).ok())
        .filter(|md| md.month == month)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn born(id: &str, birth_date: &str) -> Member {
        let mut member = Member::new(id, format!("Member {id}"));
        member.birth_date = Some(birth_date.to_string());
        member
    }

    #[test]
    fn birthday_today_is_zero_days_away() {
        let results = next_occurrences(&[born("1", "1990-03-10")], date(2024, 3, 10));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].days_until_next_occurrence, 0);
        assert_eq!(results[0].next_occurrence_date, date(2024, 3, 10));
    }

    #[test]
    fn passed_birthday_rolls_to_next_year() {
        let results = next_occurrences(&[born("1", "1990-03-01")], date(2024, 3, 10));
        assert_eq!(results[0].next_occurrence_date, date(2025, 3, 1));
        assert_eq!(results[0].days_until_next_occurrence, 356);
    }

    #[test]
    fn year_end_wraparound() {
        let results = next_occurrences(&[born("1", "1985-01-01")], date(2024, 12, 31));
        assert_eq!(results[0].next_occurrence_date, date(2025, 1, 1));
        assert_eq!(results[0].days_until_next_occurrence, 1);
    }

    #[test]
    fn members_without_usable_dates_are_skipped() {
        let mut no_date = Member::new("1", "No Date");
        no_date.birth_date = None;
        let members = [
            no_date,
            born("2", ""),
            born("3", "not-a-date"),
            born("4", "1990-13-01"),
            born("5", "1990-06-15"),
        ];

        let results = next_occurrences(&members, date(2024, 6, 1));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].member_id, MemberId::from("5"));
    }

    #[test]
    fn sorted_by_days_then_id() {
        let members = [
            born("c", "1990-07-01"),
            born("b", "1980-06-20"),
            born("a", "1970-06-20"),
            born("d", "2000-06-02"),
        ];

        let ids: Vec<String> = next_occurrences(&members, date(2024, 6, 1))
            .into_iter()
            .map(|r| r.member_id.to_string())
            .collect();
        assert_eq!(ids, ["d", "a", "b", "c"]);
    }

    #[test]
    fn leap_day_clamps_to_feb_28_by_default() {
        // 2025 and 2026 have no February 29.
        let results = next_occurrences(&[born("1", "2000-02-29")], date(2025, 1, 15));
        assert_eq!(results[0].next_occurrence_date, date(2025, 2, 28));
        assert_eq!(results[0].days_until_next_occurrence, 44);

        let results = next_occurrences(&[born("1", "2000-02-29")], date(2025, 3, 10));
        assert_eq!(results[0].next_occurrence_date, date(2026, 2, 28));
        assert_eq!(results[0].days_until_next_occurrence, 355);
    }

    #[test]
    fn leap_day_rolls_to_march_1_when_configured() {
        let policy = LeapDayPolicy::RollToMarch1;

        let results = next_occurrences_with(&[born("1", "2000-02-29")], date(2025, 1, 15), policy);
        assert_eq!(results[0].next_occurrence_date, date(2025, 3, 1));
        assert_eq!(results[0].days_until_next_occurrence, 45);

        let results = next_occurrences_with(&[born("1", "2000-02-29")], date(2025, 3, 10), policy);
        assert_eq!(results[0].next_occurrence_date, date(2026, 3, 1));
        assert_eq!(results[0].days_until_next_occurrence, 356);
    }

    #[test]
    fn leap_day_lands_on_feb_29_in_leap_years() {
        for policy in [LeapDayPolicy::ClampToFeb28, LeapDayPolicy::RollToMarch1] {
            let results =
                next_occurrences_with(&[born("1", "2000-02-29")], date(2023, 3, 10), policy);
            assert_eq!(results[0].next_occurrence_date, date(2024, 2, 29));
            assert_eq!(results[0].days_until_next_occurrence, 356);
        }
    }

    #[test]
    fn roll_policy_counts_march_1_on_reference_day_as_today() {
        let results = next_occurrences_with(
            &[born("1", "2000-02-29")],
            date(2025, 3, 1),
            LeapDayPolicy::RollToMarch1,
        );
        assert_eq!(results[0].days_until_next_occurrence, 0);
    }

    #[test]
    fn window_filter_is_inclusive() {
        let members = [
            born("1", "1990-06-01"),
            born("2", "1990-07-01"),
            born("3", "1990-07-02"),
        ];
        let all = next_occurrences(&members, date(2024, 6, 1));
        let window = within_days(&all, 30);
        let ids: Vec<&str> = window.iter().map(|r| r.member_id.as_str()).collect();
        assert_eq!(ids, ["1", "2"]);
    }

    #[test]
    fn counts_birthdays_in_month() {
        let members = [
            born("1", "1990-06-01"),
            born("2", "1985-06-30"),
            born("3", "1990-07-02"),
            born("4", "garbage"),
        ];
        assert_eq!(birthdays_in_month(&members, 6), 2);
        assert_eq!(birthdays_in_month(&members, 7), 1);
        assert_eq!(birthdays_in_month(&members, 1), 0);
    }

    #[test]
    fn leap_day_policy_deserializes_from_config_strings() {
        let p: LeapDayPolicy = serde_json::from_str("\"roll-to-march1\"").expect("parse");
        assert_eq!(p, LeapDayPolicy::RollToMarch1);
        let p: LeapDayPolicy = serde_json::from_str("\"clamp-to-feb28\"").expect("parse");
        assert_eq!(p, LeapDayPolicy::ClampToFeb28);
    }
}
