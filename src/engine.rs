//! Engine: turns a fetched directory snapshot into a finished report by
//! running the classifier over every entry, ranking the flagged results and
//! tallying the run summary.
//!
//! Typical usage:
//!
//! ```no_run
//! use entra_hygiene::engine::Engine;
//! # fn main() -> anyhow::Result<()> {
//! let engine = Engine::new(chrono::Utc::now().date_naive());
//! let groups = entra_hygiene::snapshot::load_groups("/path/to/groups.json")?;
//! let report = engine.empty_groups(&groups);
//! println!("{}", entra_hygiene::report::render_report(&report));
//! # Ok(())
//! # }
//! ```
use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;

use crate::classify::{
    ActivityPolicy, ClassificationResult, Status, classify_activity, classify_credentials,
    classify_group,
};
use crate::directory::{ActivityEntry, CredentialEntry, GroupEntry};
use crate::rank::{rank_expiring, rank_inactive};
use crate::severity::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    EmptyGroups,
    InactiveUsers,
    InactiveApps,
    ExpiringCredentials,
}

impl ReportKind {
    pub fn title(self) -> &'static str {
        match self {
            ReportKind::EmptyGroups => "Empty Groups",
            ReportKind::InactiveUsers => "Inactive Users",
            ReportKind::InactiveApps => "Inactive Enterprise Applications",
            ReportKind::ExpiringCredentials => "Expiring Application Credentials",
        }
    }

    /// Short name used in export file names.
    pub fn slug(self) -> &'static str {
        match self {
            ReportKind::EmptyGroups => "empty_groups",
            ReportKind::InactiveUsers => "inactive_users",
            ReportKind::InactiveApps => "inactive_apps",
            ReportKind::ExpiringCredentials => "expiring_credentials",
        }
    }

    /// What a flagged entity is called in summary lines.
    pub fn noun(self) -> &'static str {
        match self {
            ReportKind::EmptyGroups => "empty groups",
            ReportKind::InactiveUsers => "inactive users",
            ReportKind::InactiveApps => "inactive applications",
            ReportKind::ExpiringCredentials => "applications with expiring credentials",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// One flagged or ranked entity, detached from the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub display_name: String,
    pub identifier: String,
    pub object_id: String,
    pub status: Status,
    pub days: Option<i64>,
    pub threshold: Option<i64>,
    pub severity: Option<Severity>,
    pub category: String,
    pub credential: Option<String>,
}

impl ReportRow {
    fn from_result(r: &ClassificationResult<'_>, severity: Option<Severity>) -> Self {
        let category = match r.category {
            Some(c) => c.to_string(),
            None => r.object.category.clone(),
        };
        let credential = r.credential.map(|c| match &c.label {
            Some(label) if !label.is_empty() => format!("{} '{}'", c.kind, label),
            _ => format!("{} {}", c.kind, c.key_id),
        });
        Self {
            display_name: r.object.display_name.clone(),
            identifier: r.object.primary_identifier().to_string(),
            object_id: r.object.id.clone(),
            status: r.status,
            days: r.days,
            threshold: r.threshold,
            severity,
            category,
            credential,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub total_checked: usize,
    pub total_flagged: usize,
    pub by_category: BTreeMap<String, usize>,
}

impl Summary {
    fn tally<'r>(total_checked: usize, keys: impl Iterator<Item = &'r str>) -> Self {
        let mut by_category: BTreeMap<String, usize> = BTreeMap::new();
        let mut total_flagged = 0;
        for k in keys {
            *by_category.entry(k.to_string()).or_insert(0) += 1;
            total_flagged += 1;
        }
        Self {
            total_checked,
            total_flagged,
            by_category,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub kind: ReportKind,
    pub as_of: NaiveDate,
    pub rows: Vec<ReportRow>,
    pub summary: Summary,
}

impl Report {
    /// True when the classification ran and nothing was flagged.
    pub fn is_clean(&self) -> bool {
        self.summary.total_flagged == 0
    }
}

/// Runs classification and ranking against a fixed reference date.
#[derive(Debug, Clone, Copy)]
pub struct Engine {
    pub as_of: NaiveDate,
}

impl Engine {
    pub fn new(as_of: NaiveDate) -> Self {
        Self { as_of }
    }

    /// Groups with no members, in snapshot order.
    pub fn empty_groups(&self, groups: &[GroupEntry]) -> Report {
        let flagged: Vec<ClassificationResult<'_>> =
            groups.par_iter().filter_map(classify_group).collect();
        let rows: Vec<ReportRow> = flagged
            .iter()
            .map(|r| ReportRow::from_result(r, None))
            .collect();
        let summary = Summary::tally(groups.len(), rows.iter().map(|r| r.category.as_str()));
        Report {
            kind: ReportKind::EmptyGroups,
            as_of: self.as_of,
            rows,
            summary,
        }
    }

    /// Accounts past their inactivity threshold, grouped by category and most
    /// stale first. Inactive rows are always past their window, so they band
    /// as High.
    pub fn inactive(
        &self,
        kind: ReportKind,
        entries: &[ActivityEntry],
        policy: ActivityPolicy,
    ) -> Report {
        let today = self.as_of;
        let mut flagged: Vec<ClassificationResult<'_>> = entries
            .par_iter()
            .filter_map(|e| classify_activity(e, policy, today))
            .collect();
        rank_inactive(&mut flagged);
        let rows: Vec<ReportRow> = flagged
            .iter()
            .map(|r| {
                let remaining = match (r.threshold, r.days) {
                    (Some(t), Some(d)) => t - d,
                    _ => i64::MIN,
                };
                ReportRow::from_result(r, Some(Severity::from_days_remaining(remaining)))
            })
            .collect();
        let summary = Summary::tally(entries.len(), rows.iter().map(|r| r.category.as_str()));
        Report {
            kind,
            as_of: self.as_of,
            rows,
            summary,
        }
    }

    /// Earliest-expiring credential per entity, soonest first, bounded to
    /// `top_n` rows. The summary counts every entity with expiry data, broken
    /// down by severity band.
    pub fn expiring_credentials(&self, entries: &[CredentialEntry], top_n: usize) -> Report {
        let today = self.as_of;
        let per_credential: Vec<ClassificationResult<'_>> = entries
            .par_iter()
            .flat_map_iter(|e| classify_credentials(e, today))
            .collect();
        let ranked = rank_expiring(per_credential, usize::MAX);
        let bands: Vec<Severity> = ranked
            .iter()
            .map(|r| Severity::from_days_remaining(r.days.unwrap_or(i64::MIN)))
            .collect();
        let band_names: Vec<String> = bands.iter().map(ToString::to_string).collect();
        let summary = Summary::tally(entries.len(), band_names.iter().map(String::as_str));
        let rows: Vec<ReportRow> = ranked
            .iter()
            .zip(bands)
            .take(top_n)
            .map(|(r, band)| ReportRow::from_result(r, Some(band)))
            .collect();
        Report {
            kind: ReportKind::ExpiringCredentials,
            as_of: self.as_of,
            rows,
            summary,
        }
    }
}
