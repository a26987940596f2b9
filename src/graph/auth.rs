//! OAuth2 token acquisition for Microsoft Graph.
//!
//! Three ways in: a bearer token handed over as-is, the client-credentials
//! grant for app registrations with a secret, and the interactive device-code
//! grant that prints a sign-in prompt and polls until the user finishes.
use std::time::{Duration, Instant};

use log::{debug, info};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::{GraphError, GraphResult};

pub const DEFAULT_LOGIN_URL: &str = "https://login.microsoftonline.com";
pub const GRAPH_RESOURCE: &str = "https://graph.microsoft.com";
/// Public client id of the Microsoft Graph command line tools, used for the
/// device-code grant when no client id is configured.
pub const DEFAULT_PUBLIC_CLIENT_ID: &str = "14d82eec-204b-4c2f-b7e8-296a70dab67e";
/// Tenant segment that accepts any work or school account.
pub const DEFAULT_TENANT: &str = "organizations";

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";
/// Added to the poll interval each time the token endpoint answers `slow_down`.
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub enum Credentials {
    AccessToken(SecretString),
    ClientSecret {
        tenant_id: String,
        client_id: String,
        client_secret: SecretString,
    },
    DeviceCode {
        tenant_id: String,
        client_id: String,
        scopes: Vec<String>,
    },
}

impl Credentials {
    /// Pick a flow from whatever was configured: an explicit token wins, then
    /// a client secret (which needs a real tenant and client id), then the
    /// interactive device-code flow.
    pub fn resolve(
        access_token: Option<String>,
        tenant_id: Option<String>,
        client_id: Option<String>,
        client_secret: Option<String>,
        scopes: &[&str],
    ) -> GraphResult<Self> {
        if let Some(token) = access_token.filter(|t| !t.trim().is_empty()) {
            return Ok(Credentials::AccessToken(SecretString::from(token)));
        }
        if let Some(secret) = client_secret.filter(|s| !s.is_empty()) {
            let tenant_id = tenant_id.ok_or_else(|| {
                GraphError::Config("a client secret requires --tenant-id".to_string())
            })?;
            let client_id = client_id.ok_or_else(|| {
                GraphError::Config("a client secret requires --client-id".to_string())
            })?;
            return Ok(Credentials::ClientSecret {
                tenant_id,
                client_id,
                client_secret: SecretString::from(secret),
            });
        }
        Ok(Credentials::DeviceCode {
            tenant_id: tenant_id.unwrap_or_else(|| DEFAULT_TENANT.to_string()),
            client_id: client_id.unwrap_or_else(|| DEFAULT_PUBLIC_CLIENT_ID.to_string()),
            scopes: scopes
                .iter()
                .map(|s| format!("{GRAPH_RESOURCE}/{s}"))
                .collect(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: String,
}

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    message: String,
    expires_in: u64,
    #[serde(default = "default_poll_interval")]
    interval: u64,
}

fn default_poll_interval() -> u64 {
    5
}

/// Acquires bearer tokens against one login endpoint.
#[derive(Debug, Clone)]
pub struct Authenticator {
    http: reqwest::Client,
    login_url: String,
}

impl Authenticator {
    pub fn new(http: reqwest::Client, login_url: impl Into<String>) -> Self {
        Self {
            http,
            login_url: login_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn acquire(&self, credentials: &Credentials) -> GraphResult<SecretString> {
        match credentials {
            Credentials::AccessToken(token) => {
                debug!("using supplied access token");
                Ok(SecretString::from(token.expose_secret().to_string()))
            }
            Credentials::ClientSecret {
                tenant_id,
                client_id,
                client_secret,
            } => {
                self.client_credentials(tenant_id, client_id, client_secret)
                    .await
            }
            Credentials::DeviceCode {
                tenant_id,
                client_id,
                scopes,
            } => self.device_code(tenant_id, client_id, scopes).await,
        }
    }

    fn token_url(&self, tenant_id: &str) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.login_url, tenant_id)
    }

    async fn client_credentials(
        &self,
        tenant_id: &str,
        client_id: &str,
        client_secret: &SecretString,
    ) -> GraphResult<SecretString> {
        let scope = format!("{GRAPH_RESOURCE}/.default");
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", client_secret.expose_secret()),
            ("scope", scope.as_str()),
        ];
        let response = self
            .http
            .post(self.token_url(tenant_id))
            .form(&params)
            .send()
            .await
            .map_err(|e| GraphError::Auth(format!("token request failed: {e}")))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GraphError::Auth(format!(
                "token request failed with status {status}: {}",
                describe_token_error(&body)
            )));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| GraphError::Auth(format!("failed to parse token response: {e}")))?;
        debug!("acquired app-only token, expires in {}s", token.expires_in);
        Ok(SecretString::from(token.access_token))
    }

    async fn device_code(
        &self,
        tenant_id: &str,
        client_id: &str,
        scopes: &[String],
    ) -> GraphResult<SecretString> {
        let scope = scopes.join(" ");
        let response = self
            .http
            .post(format!(
                "{}/{}/oauth2/v2.0/devicecode",
                self.login_url, tenant_id
            ))
            .form(&[("client_id", client_id), ("scope", scope.as_str())])
            .send()
            .await
            .map_err(|e| GraphError::Auth(format!("device code request failed: {e}")))?;
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GraphError::Auth(describe_token_error(&body)));
        }
        let code: DeviceCodeResponse = response
            .json()
            .await
            .map_err(|e| GraphError::Auth(format!("failed to parse device code response: {e}")))?;

        // The prompt has to reach the user even when stdout is redirected.
        eprintln!("{}", code.message);

        let deadline = Instant::now() + Duration::from_secs(code.expires_in);
        let mut interval = Duration::from_secs(code.interval.max(1));
        loop {
            tokio::time::sleep(interval).await;
            if Instant::now() >= deadline {
                return Err(GraphError::DeviceCodeExpired);
            }
            let response = self
                .http
                .post(self.token_url(tenant_id))
                .form(&[
                    ("grant_type", DEVICE_CODE_GRANT),
                    ("client_id", client_id),
                    ("device_code", code.device_code.as_str()),
                ])
                .send()
                .await
                .map_err(|e| GraphError::Auth(format!("token poll failed: {e}")))?;
            if response.status().is_success() {
                let token: TokenResponse = response.json().await.map_err(|e| {
                    GraphError::Auth(format!("failed to parse token response: {e}"))
                })?;
                info!("signed in, token expires in {}s", token.expires_in);
                return Ok(SecretString::from(token.access_token));
            }
            let body = response.text().await.unwrap_or_default();
            match poll_outcome(&body) {
                PollOutcome::Pending => debug!("sign-in still pending"),
                PollOutcome::SlowDown => {
                    interval += SLOW_DOWN_STEP;
                    debug!("asked to slow down, polling every {}s", interval.as_secs());
                }
                PollOutcome::Expired => return Err(GraphError::DeviceCodeExpired),
                PollOutcome::Failed(reason) => return Err(GraphError::Auth(reason)),
            }
        }
    }
}

/// What a failed device-code token poll means for the polling loop.
#[derive(Debug, PartialEq, Eq)]
enum PollOutcome {
    Pending,
    SlowDown,
    Expired,
    Failed(String),
}

fn poll_outcome(body: &str) -> PollOutcome {
    match serde_json::from_str::<TokenErrorResponse>(body) {
        Ok(e) if e.error == "authorization_pending" => PollOutcome::Pending,
        Ok(e) if e.error == "slow_down" => PollOutcome::SlowDown,
        Ok(e) if e.error == "expired_token" => PollOutcome::Expired,
        _ => PollOutcome::Failed(describe_token_error(body)),
    }
}

fn describe_token_error(body: &str) -> String {
    match serde_json::from_str::<TokenErrorResponse>(body) {
        Ok(e) if !e.error_description.is_empty() => {
            format!("{}: {}", e.error, e.error_description)
        }
        Ok(e) => e.error,
        Err(_) => body.to_string(),
    }
}
