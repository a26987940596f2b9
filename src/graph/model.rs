//! Microsoft Graph payload shapes and their conversion into snapshot entries.
//!
//! Only the fields the reports select are modelled. Every timestamp is kept as
//! the raw string Graph sent and parsed leniently: a value that is missing or
//! not RFC 3339 becomes `None` instead of failing the whole page.
use chrono::{DateTime, Utc};
use log::debug;
use serde::Deserialize;

use crate::directory::{
    AccountCategory, ActivityEntry, ActivityFact, CredentialEntry, CredentialFact, CredentialKind,
    DirectoryObject, GroupEntry, MembershipFact, ObjectKind,
};

/// Paginated collection envelope.
#[derive(Debug, Deserialize)]
pub struct ODataResponse<T> {
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

/// `OData` error envelope.
#[derive(Debug, Deserialize)]
pub struct ODataError {
    pub error: ODataErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ODataErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub display_name: Option<String>,
    pub mail: Option<String>,
    pub group_types: Option<Vec<String>>,
    pub security_enabled: Option<bool>,
    pub members: Option<Vec<DirectoryRef>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInActivity {
    pub last_sign_in_date_time: Option<String>,
    pub last_non_interactive_sign_in_date_time: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub display_name: Option<String>,
    pub user_principal_name: Option<String>,
    pub user_type: Option<String>,
    pub sign_in_activity: Option<SignInActivity>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordCredential {
    pub key_id: Option<String>,
    pub display_name: Option<String>,
    pub end_date_time: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyCredential {
    pub key_id: Option<String>,
    pub display_name: Option<String>,
    pub end_date_time: Option<String>,
}

/// Fields shared by `/applications` and `/servicePrincipals`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    pub id: String,
    pub app_id: Option<String>,
    pub display_name: Option<String>,
    pub service_principal_type: Option<String>,
    pub password_credentials: Option<Vec<PasswordCredential>>,
    pub key_credentials: Option<Vec<KeyCredential>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignIn {
    pub app_id: Option<String>,
    pub created_date_time: Option<String>,
}

/// Parse a Graph timestamp. Returns `None` for anything that is not RFC 3339.
pub fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            debug!("ignoring unparseable timestamp {raw:?}: {e}");
            None
        }
    }
}

fn display_name(name: Option<String>, id: &str) -> String {
    match name {
        Some(n) if !n.trim().is_empty() => n,
        _ => id.to_string(),
    }
}

impl Group {
    pub fn category(&self) -> &'static str {
        let unified = self
            .group_types
            .as_deref()
            .unwrap_or_default()
            .iter()
            .any(|t| t.eq_ignore_ascii_case("Unified"));
        if unified {
            "Microsoft 365"
        } else if self.security_enabled.unwrap_or(false) {
            "Security"
        } else {
            "Distribution"
        }
    }

    pub fn into_entry(self) -> GroupEntry {
        let category = self.category();
        let membership = MembershipFact::from_members(self.members.as_deref());
        let mut object = DirectoryObject::new(
            self.id.clone(),
            display_name(self.display_name, &self.id),
            ObjectKind::Group,
        )
        .with_category(category);
        if let Some(mail) = self.mail.filter(|m| !m.is_empty()) {
            object = object.with_secondary_id(mail);
        }
        GroupEntry { object, membership }
    }
}

impl SignInActivity {
    /// The most recent of the interactive and non-interactive sign-ins.
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        let interactive = parse_timestamp(self.last_sign_in_date_time.as_deref());
        let background = parse_timestamp(self.last_non_interactive_sign_in_date_time.as_deref());
        interactive.max(background)
    }
}

impl User {
    pub fn into_entry(self) -> ActivityEntry {
        let category = AccountCategory::from_user_type(self.user_type.as_deref());
        let last_activity = self
            .sign_in_activity
            .as_ref()
            .and_then(SignInActivity::last_activity);
        let mut object = DirectoryObject::new(
            self.id.clone(),
            display_name(self.display_name, &self.id),
            ObjectKind::User,
        )
        .with_category(category.to_string());
        if let Some(upn) = self.user_principal_name {
            object = object.with_secondary_id(upn);
        }
        ActivityEntry {
            object,
            activity: ActivityFact {
                last_activity,
                category,
            },
        }
    }
}

impl App {
    /// Enterprise applications are service principals of type "Application";
    /// managed identities and legacy principals are left out.
    pub fn is_enterprise_app(&self) -> bool {
        self.service_principal_type
            .as_deref()
            .is_none_or(|t| t.eq_ignore_ascii_case("Application"))
    }

    pub fn object(&self, kind: ObjectKind) -> DirectoryObject {
        let mut object = DirectoryObject::new(
            self.id.clone(),
            display_name(self.display_name.clone(), &self.id),
            kind,
        );
        if let Some(app_id) = &self.app_id {
            object = object.with_secondary_id(app_id.clone());
        }
        object
    }

    /// Pair with the sign-in found for this app, if any. Apps carry no
    /// guest/standard distinction.
    pub fn into_activity_entry(self, last_activity: Option<DateTime<Utc>>) -> ActivityEntry {
        ActivityEntry {
            object: self.object(ObjectKind::ServicePrincipal),
            activity: ActivityFact {
                last_activity,
                category: AccountCategory::Standard,
            },
        }
    }

    pub fn into_credential_entry(self, kind: ObjectKind) -> CredentialEntry {
        let object = self.object(kind);
        let secrets = self.password_credentials.unwrap_or_default().into_iter().map(|p| {
            CredentialFact {
                key_id: p.key_id.unwrap_or_default(),
                label: p.display_name,
                kind: CredentialKind::Secret,
                expires_at: parse_timestamp(p.end_date_time.as_deref()),
            }
        });
        let certs = self.key_credentials.unwrap_or_default().into_iter().map(|k| CredentialFact {
            key_id: k.key_id.unwrap_or_default(),
            label: k.display_name,
            kind: CredentialKind::Certificate,
            expires_at: parse_timestamp(k.end_date_time.as_deref()),
        });
        CredentialEntry {
            object,
            credentials: secrets.chain(certs).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_group_with_and_without_members() {
        let json = r##"[
            {"id": "g1", "displayName": "Sales", "mail": "sales@contoso.com",
             "groupTypes": ["Unified"], "securityEnabled": false,
             "members": [{"@odata.type": "#microsoft.graph.user", "id": "u1"}]},
            {"id": "g2", "displayName": "Old ACL", "groupTypes": [], "securityEnabled": true,
             "members": []},
            {"id": "g3", "displayName": null, "members": null}
        ]"##;
        let groups: Vec<Group> = serde_json::from_str(json).unwrap();
        let entries: Vec<GroupEntry> = groups.into_iter().map(Group::into_entry).collect();
        assert_eq!(entries[0].membership.member_count, 1);
        assert_eq!(entries[0].object.category, "Microsoft 365");
        assert_eq!(entries[0].object.primary_identifier(), "sales@contoso.com");
        assert_eq!(entries[1].membership.member_count, 0);
        assert_eq!(entries[1].object.category, "Security");
        assert_eq!(entries[2].membership.member_count, 0);
        assert_eq!(entries[2].object.display_name, "g3");
        assert_eq!(entries[2].object.category, "Distribution");
    }

    #[test]
    fn user_activity_takes_latest_sign_in() {
        let json = r#"{
            "id": "u1", "displayName": "Ada", "userPrincipalName": "ada@contoso.com",
            "userType": "Guest",
            "signInActivity": {
                "lastSignInDateTime": "2024-01-10T08:00:00Z",
                "lastNonInteractiveSignInDateTime": "2024-03-01T23:15:00Z"
            }
        }"#;
        let user: User = serde_json::from_str(json).unwrap();
        let entry = user.into_entry();
        assert_eq!(entry.activity.category, AccountCategory::Guest);
        assert_eq!(
            entry.activity.last_activity,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 23, 15, 0).unwrap())
        );
    }

    #[test]
    fn user_without_sign_in_activity_has_no_last_activity() {
        let user: User = serde_json::from_str(r#"{"id": "u2", "userType": "Member"}"#).unwrap();
        let entry = user.into_entry();
        assert_eq!(entry.activity.last_activity, None);
        assert_eq!(entry.activity.category, AccountCategory::Standard);
    }

    #[test]
    fn bad_expiry_dates_become_none() {
        let json = r#"{
            "id": "a1", "appId": "app-1", "displayName": "Payroll",
            "passwordCredentials": [
                {"keyId": "k1", "displayName": "prod", "endDateTime": "2025-02-01T00:00:00Z"},
                {"keyId": "k2", "endDateTime": "not a date"}
            ],
            "keyCredentials": [{"keyId": "k3", "endDateTime": null}]
        }"#;
        let app: App = serde_json::from_str(json).unwrap();
        let entry = app.into_credential_entry(ObjectKind::Application);
        assert_eq!(entry.credentials.len(), 3);
        assert!(entry.credentials[0].expires_at.is_some());
        assert!(entry.credentials[1].expires_at.is_none());
        assert_eq!(entry.credentials[2].kind, CredentialKind::Certificate);
        assert!(entry.credentials[2].expires_at.is_none());
        assert_eq!(entry.object.primary_identifier(), "app-1");
    }

    #[test]
    fn managed_identities_are_not_enterprise_apps() {
        let app: App = serde_json::from_str(
            r#"{"id": "s1", "servicePrincipalType": "ManagedIdentity"}"#,
        )
        .unwrap();
        assert!(!app.is_enterprise_app());
        let app: App =
            serde_json::from_str(r#"{"id": "s2", "servicePrincipalType": "Application"}"#)
                .unwrap();
        assert!(app.is_enterprise_app());
    }

    #[test]
    fn timestamp_parsing_is_lenient() {
        assert!(parse_timestamp(None).is_none());
        assert!(parse_timestamp(Some("")).is_none());
        assert!(parse_timestamp(Some("2024-13-45")).is_none());
        assert!(parse_timestamp(Some("2024-05-01T10:00:00.1234567Z")).is_some());
        assert!(parse_timestamp(Some("2024-05-01T10:00:00+02:00")).is_some());
    }
}
