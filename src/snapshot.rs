//! Offline snapshots: saved Graph responses read from disk instead of fetched
//! live. A file holds either one `{"value": [...]}` page as Graph returns it
//! or a bare JSON array of the same objects.
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::directory::{ActivityEntry, GroupEntry};
use crate::graph::model::{App, Group, SignIn, User, parse_timestamp};

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("malformed snapshot: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Collection<T> {
    Page { value: Vec<T> },
    Bare(Vec<T>),
}

pub fn parse_collection<T: DeserializeOwned>(contents: &str) -> Result<Vec<T>, SnapshotError> {
    let items = match serde_json::from_str::<Collection<T>>(contents)? {
        Collection::Page { value } => value,
        Collection::Bare(items) => items,
    };
    Ok(items)
}

pub fn read_collection<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<Vec<T>> {
    let path = path.as_ref();
    let contents =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse_collection(&contents).with_context(|| format!("parse {}", path.display()))
}

pub fn load_groups<P: AsRef<Path>>(path: P) -> Result<Vec<GroupEntry>> {
    let groups: Vec<Group> = read_collection(path)?;
    Ok(groups.into_iter().map(Group::into_entry).collect())
}

pub fn load_users<P: AsRef<Path>>(path: P) -> Result<Vec<ActivityEntry>> {
    let users: Vec<User> = read_collection(path)?;
    Ok(users.into_iter().map(User::into_entry).collect())
}

pub fn load_apps<P: AsRef<Path>>(path: P) -> Result<Vec<App>> {
    read_collection(path)
}

/// Latest sign-in per appId at or after `since`. Events without an appId or
/// a parseable timestamp are ignored.
pub fn latest_sign_ins(events: &[SignIn], since: DateTime<Utc>) -> HashMap<String, DateTime<Utc>> {
    let mut latest: HashMap<String, DateTime<Utc>> = HashMap::new();
    for e in events {
        let (Some(app_id), Some(ts)) = (
            e.app_id.as_deref(),
            parse_timestamp(e.created_date_time.as_deref()),
        ) else {
            continue;
        };
        if ts < since {
            continue;
        }
        latest
            .entry(app_id.to_string())
            .and_modify(|seen| *seen = (*seen).max(ts))
            .or_insert(ts);
    }
    latest
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn accepts_page_and_bare_array() {
        let page: Vec<Group> =
            parse_collection(r#"{"value": [{"id": "g1"}], "@odata.nextLink": null}"#).unwrap();
        assert_eq!(page.len(), 1);
        let bare: Vec<Group> = parse_collection(r#"[{"id": "g1"}, {"id": "g2"}]"#).unwrap();
        assert_eq!(bare.len(), 2);
    }

    #[test]
    fn rejects_non_collections() {
        assert!(parse_collection::<Group>(r#"{"id": "g1"}"#).is_err());
        assert!(parse_collection::<Group>("not json").is_err());
    }

    #[test]
    fn missing_file_has_path_in_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        let err = load_groups(&missing).unwrap_err();
        assert!(format!("{err:#}").contains("nope.json"));
    }

    #[test]
    fn loads_users_from_disk() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("users.json");
        fs::write(
            &p,
            r#"{"value": [{"id": "u1", "userType": "Guest", "signInActivity": null}]}"#,
        )
        .unwrap();
        let users = load_users(&p).unwrap();
        assert_eq!(users.len(), 1);
        assert!(users[0].activity.last_activity.is_none());
    }

    #[test]
    fn latest_sign_in_respects_window() {
        let events: Vec<SignIn> = parse_collection(
            r#"[
                {"appId": "a", "createdDateTime": "2024-06-01T10:00:00Z"},
                {"appId": "a", "createdDateTime": "2024-06-10T10:00:00Z"},
                {"appId": "b", "createdDateTime": "2024-01-01T10:00:00Z"},
                {"appId": "c", "createdDateTime": "garbage"},
                {"createdDateTime": "2024-06-10T10:00:00Z"}
            ]"#,
        )
        .unwrap();
        let since = Utc.with_ymd_and_hms(2024, 5, 16, 0, 0, 0).unwrap();
        let latest = latest_sign_ins(&events, since);
        assert_eq!(latest.len(), 1);
        assert_eq!(
            latest["a"],
            Utc.with_ymd_and_hms(2024, 6, 10, 10, 0, 0).unwrap()
        );
    }
}
