//! Directory object data model: the immutable snapshot facts a report
//! classifies.
//!
//! A [`DirectoryObject`] carries identity and display fields; the facts
//! ([`MembershipFact`], [`CredentialFact`], [`ActivityFact`]) ride alongside it
//! in the per-report entry types. Nothing here is mutated after a fetch.
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ObjectKind {
    Group,
    ServicePrincipal,
    Application,
    User,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectKind::Group => "Group",
            ObjectKind::ServicePrincipal => "Service Principal",
            ObjectKind::Application => "Application",
            ObjectKind::User => "User",
        };
        f.write_str(s)
    }
}

/// Identity and display fields shared by every report row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryObject {
    pub id: String,
    pub display_name: String,
    pub kind: ObjectKind,
    /// userPrincipalName, appId or mail depending on the kind.
    pub secondary_id: Option<String>,
    /// Free-form label used for summary breakdowns (group type, user type, ...).
    pub category: String,
}

impl DirectoryObject {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            kind,
            secondary_id: None,
            category: kind.to_string(),
        }
    }

    pub fn with_secondary_id(mut self, secondary_id: impl Into<String>) -> Self {
        self.secondary_id = Some(secondary_id.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Identifier shown next to the display name: the secondary id when the
    /// directory provided one, otherwise the object id.
    pub fn primary_identifier(&self) -> &str {
        self.secondary_id.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MembershipFact {
    pub member_count: usize,
}

impl MembershipFact {
    /// A missing member list counts as zero members.
    pub fn from_members<T>(members: Option<&[T]>) -> Self {
        Self {
            member_count: members.map_or(0, <[T]>::len),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CredentialKind {
    Secret,
    Certificate,
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialKind::Secret => f.write_str("Secret"),
            CredentialKind::Certificate => f.write_str("Certificate"),
        }
    }
}

/// A password or key credential attached to an application or service
/// principal. `expires_at` is `None` when the directory returned no usable
/// expiration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialFact {
    pub key_id: String,
    pub label: Option<String>,
    pub kind: CredentialKind,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum AccountCategory {
    Guest,
    Standard,
}

impl AccountCategory {
    /// Graph reports `userType` as "Member" or "Guest"; anything other than
    /// "Guest" is treated as a standard account.
    pub fn from_user_type(user_type: Option<&str>) -> Self {
        match user_type {
            Some(t) if t.eq_ignore_ascii_case("guest") => AccountCategory::Guest,
            _ => AccountCategory::Standard,
        }
    }
}

impl fmt::Display for AccountCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountCategory::Guest => f.write_str("Guest"),
            AccountCategory::Standard => f.write_str("Standard"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityFact {
    /// `None` means the account has never signed in (or not within the
    /// lookback window the fetcher queried).
    pub last_activity: Option<DateTime<Utc>>,
    pub category: AccountCategory,
}

/// Group paired with its membership.
#[derive(Debug, Clone)]
pub struct GroupEntry {
    pub object: DirectoryObject,
    pub membership: MembershipFact,
}

/// User or service principal paired with its sign-in activity.
#[derive(Debug, Clone)]
pub struct ActivityEntry {
    pub object: DirectoryObject,
    pub activity: ActivityFact,
}

/// Application or service principal paired with all of its credentials.
#[derive(Debug, Clone)]
pub struct CredentialEntry {
    pub object: DirectoryObject,
    pub credentials: Vec<CredentialFact>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_member_list_counts_as_zero() {
        assert_eq!(MembershipFact::from_members::<String>(None).member_count, 0);
        assert_eq!(MembershipFact::from_members::<String>(Some(&[])).member_count, 0);
        let ids = vec!["a".to_string(), "b".to_string()];
        assert_eq!(MembershipFact::from_members(Some(ids.as_slice())).member_count, 2);
    }

    #[test]
    fn guest_detection_is_case_insensitive() {
        assert_eq!(AccountCategory::from_user_type(Some("Guest")), AccountCategory::Guest);
        assert_eq!(AccountCategory::from_user_type(Some("guest")), AccountCategory::Guest);
        assert_eq!(AccountCategory::from_user_type(Some("Member")), AccountCategory::Standard);
        assert_eq!(AccountCategory::from_user_type(None), AccountCategory::Standard);
    }

    #[test]
    fn primary_identifier_falls_back_to_id() {
        let o = DirectoryObject::new("0001", "Sales", ObjectKind::Group);
        assert_eq!(o.primary_identifier(), "0001");
        let o = o.with_secondary_id("sales@contoso.com");
        assert_eq!(o.primary_identifier(), "sales@contoso.com");
    }
}
