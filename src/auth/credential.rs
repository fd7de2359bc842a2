//! Credential sources
//!
//! Static tokens, OAuth2 client credentials, the Azure CLI, and a chain that
//! tries each in turn.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::env;
use std::time::Duration as StdDuration;
use tokio::process::Command;
use tracing::debug;

use super::{AccessToken, CredentialError, TokenProvider};
use crate::utils::truncate;

const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
/// Deadline for a single token fetch unless overridden
const DEFAULT_FETCH_TIMEOUT: StdDuration = StdDuration::from_secs(60);

/// Pre-issued bearer token, used as-is
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Read `APIM_SMOKE_TOKEN`
    pub fn from_env() -> Option<Self> {
        env::var("APIM_SMOKE_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .map(Self::new)
    }
}

#[async_trait]
impl TokenProvider for StaticTokenCredential {
    fn name(&self) -> &str {
        "static"
    }

    async fn get_token(&self, _scope: &str) -> Result<AccessToken, CredentialError> {
        // Expiry is unknown; the gateway decides.
        Ok(AccessToken::new(
            self.token.clone(),
            Utc::now() + Duration::days(365),
        ))
    }
}

/// OAuth2 client-credentials grant against the identity provider
pub struct ClientSecretCredential {
    client: Client,
    authority_host: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
    timeout: StdDuration,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

impl ClientSecretCredential {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_authority_host(mut self, host: impl Into<String>) -> Self {
        self.authority_host = host.into();
        self
    }

    /// Read `AZURE_TENANT_ID`, `AZURE_CLIENT_ID`, `AZURE_CLIENT_SECRET`
    /// and the optional `AZURE_AUTHORITY_HOST`
    pub fn from_env(timeout: StdDuration) -> Option<Self> {
        let var = |name: &str| env::var(name).ok().filter(|v| !v.is_empty());

        let credential = Self::new(
            var("AZURE_TENANT_ID")?,
            var("AZURE_CLIENT_ID")?,
            var("AZURE_CLIENT_SECRET")?,
        )
        .with_timeout(timeout);
        Some(match var("AZURE_AUTHORITY_HOST") {
            Some(host) => credential.with_authority_host(host),
            None => credential,
        })
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        )
    }
}

#[async_trait]
impl TokenProvider for ClientSecretCredential {
    fn name(&self) -> &str {
        "client-secret"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let url = self.token_url();
        debug!("Requesting client-credentials token from {}", url);

        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope),
        ];

        let response = self
            .client
            .post(&url)
            .form(&params)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CredentialError::RequestFailed(format!(
                        "no response within {}s",
                        self.timeout.as_secs()
                    ))
                } else {
                    CredentialError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::Rejected {
                status: status.as_u16(),
                body: truncate(&body, 300),
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CredentialError::InvalidResponse(e.to_string()))?;

        Ok(AccessToken::expires_in(
            token.access_token,
            i64::try_from(token.expires_in).unwrap_or(i64::MAX),
        ))
    }
}

/// Token from the locally signed-in Azure CLI
pub struct AzureCliCredential {
    program: String,
    timeout: StdDuration,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    #[serde(default)]
    expires_on: Option<String>,
    #[serde(default, rename = "expires_on")]
    expires_on_epoch: Option<i64>,
}

impl AzureCliCredential {
    pub fn new() -> Self {
        Self {
            program: "az".to_string(),
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for AzureCliCredential {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse `az account get-access-token --output json`
fn parse_cli_output(stdout: &str) -> Result<AccessToken, CredentialError> {
    let parsed: CliToken = serde_json::from_str(stdout)
        .map_err(|e| CredentialError::InvalidResponse(e.to_string()))?;

    let expires_at = parsed
        .expires_on_epoch
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .or_else(|| {
            // Older CLI versions only report local wall-clock time.
            parsed
                .expires_on
                .as_deref()
                .and_then(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok())
                .and_then(|naive| Local.from_local_datetime(&naive).single())
                .map(|local| local.with_timezone(&Utc))
        })
        .ok_or_else(|| CredentialError::InvalidResponse("missing token expiry".to_string()))?;

    Ok(AccessToken::new(parsed.access_token, expires_at))
}

#[async_trait]
impl TokenProvider for AzureCliCredential {
    fn name(&self) -> &str {
        "azure-cli"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let mut command = Command::new(&self.program);
        command
            .args(["account", "get-access-token", "--scope", scope, "--output", "json"])
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                CredentialError::Unavailable(format!(
                    "{} did not finish within {}s",
                    self.program,
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| CredentialError::Unavailable(format!("{}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CredentialError::Unavailable(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                truncate(stderr.trim(), 300)
            )));
        }

        parse_cli_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Tries each credential in order, returning the first token obtained
pub struct DefaultCredential {
    sources: Vec<Box<dyn TokenProvider>>,
}

impl DefaultCredential {
    pub fn new(sources: Vec<Box<dyn TokenProvider>>) -> Self {
        Self { sources }
    }

    /// Static token, then client secret, then Azure CLI; each fetch is
    /// abandoned after `timeout`
    pub fn from_env(timeout: StdDuration) -> Self {
        let mut sources: Vec<Box<dyn TokenProvider>> = Vec::new();
        if let Some(credential) = StaticTokenCredential::from_env() {
            sources.push(Box::new(credential));
        }
        if let Some(credential) = ClientSecretCredential::from_env(timeout) {
            sources.push(Box::new(credential));
        }
        sources.push(Box::new(AzureCliCredential::new().with_timeout(timeout)));
        Self::new(sources)
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }
}

#[async_trait]
impl TokenProvider for DefaultCredential {
    fn name(&self) -> &str {
        "default"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let mut errors = Vec::new();

        for source in &self.sources {
            match source.get_token(scope).await {
                Ok(token) => {
                    debug!("Obtained token from {} credential", source.name());
                    return Ok(token);
                }
                Err(e) => {
                    debug!("{} credential failed: {}", source.name(), e);
                    errors.push(format!("{}: {e}", source.name()));
                }
            }
        }

        Err(CredentialError::Unavailable(if errors.is_empty() {
            "no credential sources configured".to_string()
        } else {
            errors.join("; ")
        }))
    }
}
