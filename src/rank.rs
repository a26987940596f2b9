//! Aggregation and ranking of classification results.
//!
//! Expiry reports collapse every entity to its earliest-expiring credential,
//! sort ascending and keep the top N. Inactivity reports sort by category,
//! then most stale first, and are never truncated. All sorts are stable so
//! encounter order breaks ties.
use std::cmp::Reverse;
use std::collections::HashMap;

use crate::classify::ClassificationResult;
use crate::directory::DirectoryObject;

/// Default bound for expiry reports.
pub const DEFAULT_TOP_N: usize = 10;

/// Keep one result per entity id: the one with the smallest days metric.
/// The first result encountered wins a tie. Entities keep the position of
/// their first appearance.
pub fn collapse_earliest<'a>(
    results: impl IntoIterator<Item = ClassificationResult<'a>>,
) -> Vec<ClassificationResult<'a>> {
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    let mut out: Vec<ClassificationResult<'a>> = Vec::new();
    for r in results {
        let Some(days) = r.days else { continue };
        let object: &'a DirectoryObject = r.object;
        match index.get(object.id.as_str()) {
            Some(&slot) => {
                if out[slot].days.is_none_or(|kept| days < kept) {
                    out[slot] = r;
                }
            }
            None => {
                index.insert(object.id.as_str(), out.len());
                out.push(r);
            }
        }
    }
    out
}

/// Collapse, sort soonest-first and truncate to `top_n`.
pub fn rank_expiring<'a>(
    results: impl IntoIterator<Item = ClassificationResult<'a>>,
    top_n: usize,
) -> Vec<ClassificationResult<'a>> {
    let mut items = collapse_earliest(results);
    items.sort_by_key(|r| r.days.unwrap_or(i64::MAX));
    items.truncate(top_n);
    items
}

/// Order by category, then most stale first. Accounts that never signed in
/// sort ahead of everything else in their category.
pub fn rank_inactive(results: &mut [ClassificationResult<'_>]) {
    results.sort_by_key(|r| (r.category, Reverse(r.days.unwrap_or(i64::MAX))));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Status;
    use crate::directory::{AccountCategory, DirectoryObject, ObjectKind};

    fn obj(id: &str, name: &str) -> DirectoryObject {
        DirectoryObject::new(id, name, ObjectKind::Application)
    }

    fn expiring(o: &DirectoryObject, days: i64) -> ClassificationResult<'_> {
        ClassificationResult {
            object: o,
            status: if days < 0 { Status::Expired } else { Status::Expiring },
            days: Some(days),
            threshold: None,
            category: None,
            credential: None,
        }
    }

    fn inactive(
        o: &DirectoryObject,
        category: AccountCategory,
        days: Option<i64>,
    ) -> ClassificationResult<'_> {
        ClassificationResult {
            object: o,
            status: if days.is_some() {
                Status::Inactive
            } else {
                Status::NeverSignedIn
            },
            days,
            threshold: None,
            category: Some(category),
            credential: None,
        }
    }

    #[test]
    fn earliest_credential_wins() {
        let x = obj("x", "X");
        let ranked = rank_expiring(vec![expiring(&x, 40), expiring(&x, 10)], DEFAULT_TOP_N);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].days, Some(10));
    }

    #[test]
    fn same_display_name_different_ids_stay_separate() {
        let a = obj("id-a", "Shared");
        let b = obj("id-b", "Shared");
        let ranked = rank_expiring(vec![expiring(&a, 5), expiring(&b, 7)], DEFAULT_TOP_N);
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn truncates_and_sorts_ascending() {
        let objs: Vec<DirectoryObject> = (0..15).map(|i| obj(&format!("id{i}"), "A")).collect();
        let input: Vec<_> = objs
            .iter()
            .enumerate()
            .map(|(i, o)| expiring(o, 100 - i as i64 * 7))
            .collect();
        let ranked = rank_expiring(input, DEFAULT_TOP_N);
        assert_eq!(ranked.len(), DEFAULT_TOP_N);
        assert!(ranked.windows(2).all(|w| w[0].days <= w[1].days));
        assert_eq!(ranked[0].days, Some(2));
    }

    #[test]
    fn output_never_longer_than_distinct_entities() {
        let a = obj("a", "A");
        let b = obj("b", "B");
        let ranked = rank_expiring(
            vec![expiring(&a, 1), expiring(&a, 2), expiring(&b, 3), expiring(&a, -1)],
            DEFAULT_TOP_N,
        );
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].object.id, "a");
        assert_eq!(ranked[0].days, Some(-1));
    }

    #[test]
    fn ties_keep_encounter_order() {
        let a = obj("a", "A");
        let b = obj("b", "B");
        let c = obj("c", "C");
        let ranked = rank_expiring(
            vec![expiring(&b, 5), expiring(&a, 5), expiring(&c, 5)],
            DEFAULT_TOP_N,
        );
        let ids: Vec<_> = ranked.iter().map(|r| r.object.id.as_str()).collect();
        assert_eq!(ids, ["b", "a", "c"]);
    }

    #[test]
    fn ranking_is_idempotent() {
        let objs: Vec<DirectoryObject> = (0..5).map(|i| obj(&format!("id{i}"), "A")).collect();
        let once = rank_expiring(
            objs.iter().zip([9, 3, 3, -2, 40]).map(|(o, d)| expiring(o, d)),
            3,
        );
        let twice = rank_expiring(once.clone(), 3);
        assert_eq!(once, twice);
    }

    #[test]
    fn inactive_orders_by_category_then_staleness() {
        let g1 = obj("g1", "G1");
        let g2 = obj("g2", "G2");
        let s1 = obj("s1", "S1");
        let s2 = obj("s2", "S2");
        let s3 = obj("s3", "S3");
        let mut items = vec![
            inactive(&s1, AccountCategory::Standard, Some(120)),
            inactive(&g1, AccountCategory::Guest, Some(40)),
            inactive(&s2, AccountCategory::Standard, None),
            inactive(&s3, AccountCategory::Standard, Some(400)),
            inactive(&g2, AccountCategory::Guest, Some(60)),
        ];
        rank_inactive(&mut items);
        let ids: Vec<_> = items.iter().map(|r| r.object.id.as_str()).collect();
        assert_eq!(ids, ["g2", "g1", "s2", "s3", "s1"]);
    }
}
