//! Staleness and expiry classification.
//!
//! Every function here is a pure function of its inputs and a reference date:
//! groups are flagged empty, accounts are flagged inactive against a
//! threshold chosen by [`ActivityPolicy`], and credentials get a signed
//! days-until-expiry metric. Time-of-day is discarded before any arithmetic.
use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use serde::Serialize;

use crate::directory::{
    AccountCategory, ActivityEntry, CredentialEntry, CredentialFact, DirectoryObject, GroupEntry,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Status {
    Empty,
    Inactive,
    NeverSignedIn,
    Expiring,
    Expired,
}

impl Status {
    pub fn label(self) -> &'static str {
        match self {
            Status::Empty => "Empty",
            Status::Inactive => "Inactive",
            Status::NeverSignedIn => "Never signed in",
            Status::Expiring => "Expiring",
            Status::Expired => "Expired",
        }
    }
}

/// Derived status of one entity. Borrowed from the snapshot it was computed
/// from and dropped once rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult<'a> {
    pub object: &'a DirectoryObject,
    pub status: Status,
    /// Days since last activity, or days until expiry (negative when
    /// expired). `None` for "never signed in" and for empty groups.
    pub days: Option<i64>,
    pub threshold: Option<i64>,
    pub category: Option<AccountCategory>,
    pub credential: Option<&'a CredentialFact>,
}

impl<'a> ClassificationResult<'a> {
    fn new(object: &'a DirectoryObject, status: Status) -> Self {
        Self {
            object,
            status,
            days: None,
            threshold: None,
            category: None,
            credential: None,
        }
    }
}

/// Selects the inactivity threshold for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityPolicy {
    /// Guests and standard accounts get separate windows.
    ByCategory { guest_days: i64, standard_days: i64 },
    /// One window for every account, regardless of category.
    Fixed { days: i64 },
}

impl ActivityPolicy {
    pub const USERS: ActivityPolicy = ActivityPolicy::ByCategory {
        guest_days: 30,
        standard_days: 90,
    };
    pub const ENTERPRISE_APPS: ActivityPolicy = ActivityPolicy::Fixed { days: 30 };

    pub fn threshold_for(&self, category: AccountCategory) -> i64 {
        match *self {
            ActivityPolicy::ByCategory {
                guest_days,
                standard_days,
            } => match category {
                AccountCategory::Guest => guest_days,
                AccountCategory::Standard => standard_days,
            },
            ActivityPolicy::Fixed { days } => days,
        }
    }
}

/// Whole calendar days from `earlier`'s UTC date to `today`.
pub fn days_since(earlier: DateTime<Utc>, today: NaiveDate) -> i64 {
    (today - earlier.date_naive()).num_days()
}

/// Whole calendar days from `today` to `later`'s UTC date; negative when
/// `later` is already past.
pub fn days_until(later: DateTime<Utc>, today: NaiveDate) -> i64 {
    (later.date_naive() - today).num_days()
}

/// Midnight UTC `days` before `today`, the start of a sign-in lookback window.
/// `None` when the window reaches outside the representable date range.
pub fn window_start(today: NaiveDate, days: i64) -> Option<DateTime<Utc>> {
    let window = TimeDelta::try_days(days)?;
    today
        .and_time(NaiveTime::MIN)
        .and_utc()
        .checked_sub_signed(window)
}

pub fn classify_group(entry: &GroupEntry) -> Option<ClassificationResult<'_>> {
    if entry.membership.member_count < 1 {
        Some(ClassificationResult::new(&entry.object, Status::Empty))
    } else {
        None
    }
}

/// Flags an account whose last activity is older than its threshold, or that
/// has no recorded activity at all.
pub fn classify_activity(
    entry: &ActivityEntry,
    policy: ActivityPolicy,
    today: NaiveDate,
) -> Option<ClassificationResult<'_>> {
    let category = entry.activity.category;
    let threshold = policy.threshold_for(category);
    let (status, days) = match entry.activity.last_activity {
        None => (Status::NeverSignedIn, None),
        Some(ts) => {
            let days = days_since(ts, today);
            if days <= threshold {
                return None;
            }
            (Status::Inactive, Some(days))
        }
    };
    let mut r = ClassificationResult::new(&entry.object, status);
    r.days = days;
    r.threshold = Some(threshold);
    r.category = Some(category);
    Some(r)
}

pub fn days_until_expiry(credential: &CredentialFact, today: NaiveDate) -> Option<i64> {
    credential.expires_at.map(|ts| days_until(ts, today))
}

/// One result per credential carrying an expiration. Credentials without
/// expiry data are skipped.
pub fn classify_credentials(
    entry: &CredentialEntry,
    today: NaiveDate,
) -> Vec<ClassificationResult<'_>> {
    entry
        .credentials
        .iter()
        .filter_map(|c| {
            let days = days_until_expiry(c, today)?;
            let status = if days < 0 {
                Status::Expired
            } else {
                Status::Expiring
            };
            let mut r = ClassificationResult::new(&entry.object, status);
            r.days = Some(days);
            r.credential = Some(c);
            Some(r)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{ActivityFact, CredentialKind, MembershipFact, ObjectKind};
    use chrono::{Duration, TimeZone};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn at(days_ago: i64) -> DateTime<Utc> {
        let noon = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        noon - Duration::days(days_ago)
    }

    fn user(category: AccountCategory, last: Option<DateTime<Utc>>) -> ActivityEntry {
        ActivityEntry {
            object: DirectoryObject::new("u1", "User One", ObjectKind::User),
            activity: ActivityFact {
                last_activity: last,
                category,
            },
        }
    }

    #[test]
    fn group_empty_iff_no_members() {
        for count in 0..4 {
            let g = GroupEntry {
                object: DirectoryObject::new("g", "G", ObjectKind::Group),
                membership: MembershipFact {
                    member_count: count,
                },
            };
            assert_eq!(classify_group(&g).is_some(), count < 1);
        }
    }

    #[test]
    fn null_member_list_classifies_empty() {
        let g = GroupEntry {
            object: DirectoryObject::new("g", "G", ObjectKind::Group),
            membership: MembershipFact::from_members::<String>(None),
        };
        assert_eq!(classify_group(&g).unwrap().status, Status::Empty);
    }

    #[test]
    fn guest_and_standard_thresholds() {
        let guest = user(AccountCategory::Guest, Some(at(45)));
        let r = classify_activity(&guest, ActivityPolicy::USERS, today()).unwrap();
        assert_eq!(r.status, Status::Inactive);
        assert_eq!(r.days, Some(45));
        assert_eq!(r.threshold, Some(30));

        let standard = user(AccountCategory::Standard, Some(at(45)));
        assert!(classify_activity(&standard, ActivityPolicy::USERS, today()).is_none());
    }

    #[test]
    fn threshold_is_exclusive() {
        let at_limit = user(AccountCategory::Standard, Some(at(90)));
        assert!(classify_activity(&at_limit, ActivityPolicy::USERS, today()).is_none());
        let over = user(AccountCategory::Standard, Some(at(91)));
        assert!(classify_activity(&over, ActivityPolicy::USERS, today()).is_some());
    }

    #[test]
    fn never_signed_in_always_flagged() {
        for category in [AccountCategory::Guest, AccountCategory::Standard] {
            let u = user(category, None);
            let r = classify_activity(&u, ActivityPolicy::USERS, today()).unwrap();
            assert_eq!(r.status, Status::NeverSignedIn);
            assert_eq!(r.days, None);
        }
    }

    #[test]
    fn fixed_policy_ignores_category() {
        let guest = user(AccountCategory::Guest, Some(at(20)));
        assert!(classify_activity(&guest, ActivityPolicy::ENTERPRISE_APPS, today()).is_none());
        let standard = user(AccountCategory::Standard, Some(at(31)));
        let r = classify_activity(&standard, ActivityPolicy::ENTERPRISE_APPS, today()).unwrap();
        assert_eq!(r.threshold, Some(30));
    }

    #[test]
    fn time_of_day_is_discarded() {
        let late = Utc.with_ymd_and_hms(2024, 6, 14, 23, 59, 0).unwrap();
        let early = Utc.with_ymd_and_hms(2024, 6, 16, 0, 1, 0).unwrap();
        assert_eq!(days_since(late, today()), 1);
        assert_eq!(days_until(early, today()), 1);
    }

    #[test]
    fn window_starts_at_midnight() {
        assert_eq!(
            window_start(today(), 30),
            Some(Utc.with_ymd_and_hms(2024, 5, 16, 0, 0, 0).unwrap())
        );
        assert_eq!(
            window_start(today(), 0),
            Some(Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn oversized_window_has_no_start() {
        assert_eq!(window_start(today(), 100_000_000), None);
        assert_eq!(window_start(today(), i64::MAX), None);
    }

    #[test]
    fn credentials_without_expiry_are_skipped() {
        let entry = CredentialEntry {
            object: DirectoryObject::new("a", "App", ObjectKind::Application),
            credentials: vec![
                CredentialFact {
                    key_id: "k1".into(),
                    label: None,
                    kind: CredentialKind::Secret,
                    expires_at: None,
                },
                CredentialFact {
                    key_id: "k2".into(),
                    label: Some("ci".into()),
                    kind: CredentialKind::Certificate,
                    expires_at: Some(at(3)),
                },
            ],
        };
        let results = classify_credentials(&entry, today());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].days, Some(-3));
        assert_eq!(results[0].status, Status::Expired);
        assert_eq!(results[0].credential.unwrap().key_id, "k2");
    }
}
