//! Microsoft Graph read client with `@odata.nextLink` pagination.
use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{StreamExt, stream};
use log::{debug, warn};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use url::Url;

use super::error::{GraphError, GraphResult};
use super::model::{App, Group, ODataError, ODataResponse, SignIn, User, parse_timestamp};

pub const DEFAULT_GRAPH_URL: &str = "https://graph.microsoft.com/v1.0";

const GROUP_SELECT: &str = "id,displayName,mail,groupTypes,securityEnabled";
const USER_SELECT: &str = "id,displayName,userPrincipalName,userType,signInActivity";
const APP_SELECT: &str = "id,appId,displayName,passwordCredentials,keyCredentials";
const SERVICE_PRINCIPAL_SELECT: &str =
    "id,appId,displayName,servicePrincipalType,passwordCredentials,keyCredentials";
const PAGE_SIZE: &str = "999";

#[derive(Debug)]
pub struct GraphClient {
    http: reqwest::Client,
    base_url: String,
    token: SecretString,
}

impl GraphClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        token: SecretString,
    ) -> GraphResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Url::parse(&base_url)?;
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    /// HTTP client with the request timeout every Graph call uses.
    pub fn http_client() -> GraphResult<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| GraphError::Config(format!("failed to create HTTP client: {e}")))
    }

    pub fn url(&self, path: &str, query: &[(&str, &str)]) -> GraphResult<Url> {
        let raw = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        Ok(Url::parse_with_params(&raw, query)?)
    }

    /// Single GET. Non-success responses are decoded as `OData` errors when
    /// the body allows it.
    pub async fn get<T: DeserializeOwned>(&self, url: Url) -> GraphResult<T> {
        debug!("GET {url}");
        let response = self
            .http
            .get(url)
            .bearer_auth(self.token.expose_secret())
            .header("ConsistencyLevel", "eventual")
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ODataError>(&body) {
            Ok(e) => Err(GraphError::Api {
                code: e.error.code,
                message: e.error.message,
            }),
            Err(_) => Err(GraphError::Api {
                code: status.to_string(),
                message: body,
            }),
        }
    }

    /// Follow `@odata.nextLink` until the collection is exhausted.
    pub async fn get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> GraphResult<Vec<T>> {
        let mut url = self.url(path, query)?;
        let mut items = Vec::new();
        let mut pages = 0usize;
        loop {
            let page: ODataResponse<T> = self.get(url).await?;
            pages += 1;
            items.extend(page.value);
            match page.next_link {
                Some(next) => url = Url::parse(&next)?,
                None => break,
            }
        }
        debug!("fetched {} items from {path} in {pages} page(s)", items.len());
        Ok(items)
    }

    /// Cheap authenticated read proving the token works against this tenant.
    pub async fn probe(&self) -> GraphResult<()> {
        let url = self.url("organization", &[("$select", "id")])?;
        let _: ODataResponse<serde_json::Value> = self.get(url).await?;
        Ok(())
    }

    pub async fn list_groups(&self) -> GraphResult<Vec<Group>> {
        self.get_all(
            "groups",
            &[
                ("$select", GROUP_SELECT),
                ("$expand", "members($select=id)"),
                ("$top", PAGE_SIZE),
            ],
        )
        .await
    }

    pub async fn list_users(&self) -> GraphResult<Vec<User>> {
        self.get_all("users", &[("$select", USER_SELECT), ("$top", PAGE_SIZE)])
            .await
    }

    pub async fn list_applications(&self) -> GraphResult<Vec<App>> {
        self.get_all("applications", &[("$select", APP_SELECT), ("$top", PAGE_SIZE)])
            .await
    }

    pub async fn list_service_principals(&self) -> GraphResult<Vec<App>> {
        self.get_all(
            "servicePrincipals",
            &[("$select", SERVICE_PRINCIPAL_SELECT), ("$top", PAGE_SIZE)],
        )
        .await
    }

    /// Most recent sign-in for `app_id` at or after `since`, if any.
    pub async fn last_sign_in(
        &self,
        app_id: &str,
        since: DateTime<Utc>,
    ) -> GraphResult<Option<DateTime<Utc>>> {
        let filter = format!(
            "appId eq '{}' and createdDateTime ge {}",
            app_id.replace('\'', "''"),
            since.format("%Y-%m-%dT%H:%M:%SZ")
        );
        let url = self.url(
            "auditLogs/signIns",
            &[("$filter", filter.as_str()), ("$top", "1")],
        )?;
        let page: ODataResponse<SignIn> = self.get(url).await?;
        Ok(page
            .value
            .iter()
            .filter_map(|s| parse_timestamp(s.created_date_time.as_deref()))
            .max())
    }

    /// Sign-in lookups for many apps at once, at most `concurrency` in
    /// flight. Results are keyed by object id. A failed lookup is logged and
    /// recorded as no sign-in.
    pub async fn last_sign_ins(
        &self,
        apps: &[(String, String)],
        since: DateTime<Utc>,
        concurrency: usize,
    ) -> HashMap<String, Option<DateTime<Utc>>> {
        stream::iter(apps)
            .map(|(id, app_id)| async move {
                let seen = match self.last_sign_in(app_id, since).await {
                    Ok(ts) => ts,
                    Err(e) => {
                        warn!("sign-in lookup failed for app {app_id}, treating as inactive: {e}");
                        None
                    }
                };
                (id.clone(), seen)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await
    }
}
