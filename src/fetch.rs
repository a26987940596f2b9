//! Directory snapshot fetcher. Every collection is fully resolved, from Graph
//! or from files on disk, before classification starts.
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::directory::{ActivityEntry, CredentialEntry, GroupEntry, ObjectKind};
use crate::graph::GraphClient;
use crate::graph::model::{App, Group, SignIn, User};
use crate::snapshot;

/// Which objects carry the credentials an expiry report ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// `/applications`: app registrations.
    AppRegistrations,
    /// `/servicePrincipals`: enterprise applications.
    EnterpriseApps,
}

impl CredentialSource {
    fn kind(self) -> ObjectKind {
        match self {
            CredentialSource::AppRegistrations => ObjectKind::Application,
            CredentialSource::EnterpriseApps => ObjectKind::ServicePrincipal,
        }
    }
}

pub enum Source {
    Graph {
        client: GraphClient,
        /// Upper bound on in-flight per-app sign-in lookups.
        concurrency: usize,
    },
    Snapshot {
        path: PathBuf,
        /// Saved `/auditLogs/signIns` events for the enterprise app report.
        sign_ins: Option<PathBuf>,
    },
}

impl Source {
    pub fn is_offline(&self) -> bool {
        matches!(self, Source::Snapshot { .. })
    }

    pub async fn groups(&self) -> Result<Vec<GroupEntry>> {
        match self {
            Source::Graph { client, .. } => {
                let groups = client.list_groups().await.context("list groups")?;
                Ok(groups.into_iter().map(Group::into_entry).collect())
            }
            Source::Snapshot { path, .. } => snapshot::load_groups(path),
        }
    }

    pub async fn users(&self) -> Result<Vec<ActivityEntry>> {
        match self {
            Source::Graph { client, .. } => {
                let users = client.list_users().await.context("list users")?;
                Ok(users.into_iter().map(User::into_entry).collect())
            }
            Source::Snapshot { path, .. } => snapshot::load_users(path),
        }
    }

    /// Enterprise applications joined with their latest sign-in at or after
    /// `since`. Apps with no sign-in in that window get no activity.
    pub async fn enterprise_app_activity(&self, since: DateTime<Utc>) -> Result<Vec<ActivityEntry>> {
        match self {
            Source::Graph {
                client,
                concurrency,
            } => {
                let apps: Vec<App> = client
                    .list_service_principals()
                    .await
                    .context("list service principals")?
                    .into_iter()
                    .filter(App::is_enterprise_app)
                    .collect();
                let lookups: Vec<(String, String)> = apps
                    .iter()
                    .filter_map(|a| Some((a.id.clone(), a.app_id.clone()?)))
                    .collect();
                info!(
                    "checking sign-ins for {} enterprise applications",
                    lookups.len()
                );
                let mut seen = client.last_sign_ins(&lookups, since, *concurrency).await;
                Ok(apps
                    .into_iter()
                    .map(|a| {
                        let last = seen.remove(&a.id).flatten();
                        a.into_activity_entry(last)
                    })
                    .collect())
            }
            Source::Snapshot { path, sign_ins } => {
                let apps = snapshot::load_apps(path)?;
                let events: Vec<SignIn> = match sign_ins {
                    Some(p) => snapshot::read_collection(p)?,
                    None => {
                        warn!("no sign-in file given; every application counts as inactive");
                        Vec::new()
                    }
                };
                let latest = snapshot::latest_sign_ins(&events, since);
                Ok(apps
                    .into_iter()
                    .filter(App::is_enterprise_app)
                    .map(|a| {
                        let last = a.app_id.as_ref().and_then(|id| latest.get(id).copied());
                        a.into_activity_entry(last)
                    })
                    .collect())
            }
        }
    }

    pub async fn credentials(&self, source: CredentialSource) -> Result<Vec<CredentialEntry>> {
        let apps = match self {
            Source::Graph { client, .. } => match source {
                CredentialSource::AppRegistrations => client
                    .list_applications()
                    .await
                    .context("list applications")?,
                CredentialSource::EnterpriseApps => client
                    .list_service_principals()
                    .await
                    .context("list service principals")?,
            },
            Source::Snapshot { path, .. } => snapshot::load_apps(path)?,
        };
        let kind = source.kind();
        Ok(apps
            .into_iter()
            .map(|a| a.into_credential_entry(kind))
            .collect())
    }
}
