//! HTTP client for the LLM gateway
//!
//! Sends authenticated chat-completion requests to the gateway and classifies
//! every failure into a [`GatewayError`].

use anyhow::{Context, Result};
use reqwest::{header, Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::auth::CredentialError;
use crate::config::AppConfig;
use crate::models::{ChatCompletionRequest, ChatCompletionResponse, FailureKind};
use crate::utils::truncate;

/// Longest error body kept in diagnostics
const MAX_ERROR_BODY: usize = 500;

/// Gateway call errors
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limited ({status}, retry after {}): {body}", .retry_after.as_deref().unwrap_or("unspecified"))]
    RateLimited {
        status: u16,
        retry_after: Option<String>,
        body: String,
    },

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Connection failed to {0}")]
    ConnectionFailed(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Gateway returned {status}: {body}")]
    Status { status: u16, body: String },
}

impl GatewayError {
    /// Failure class recorded in the probe outcome
    pub fn kind(&self) -> FailureKind {
        match self {
            GatewayError::Authentication(_) => FailureKind::Authentication,
            GatewayError::RateLimited { .. } => FailureKind::RateLimited,
            GatewayError::Timeout(_)
            | GatewayError::ConnectionFailed(_)
            | GatewayError::RequestFailed(_) => FailureKind::Transport,
            GatewayError::MalformedResponse(_) => FailureKind::MalformedResponse,
            GatewayError::Status { .. } => FailureKind::Gateway,
        }
    }

    fn from_status(status: StatusCode, retry_after: Option<String>, body: &str) -> Self {
        let body = truncate(body.trim(), MAX_ERROR_BODY);
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                GatewayError::Authentication(format!("{status}: {body}"))
            }
            StatusCode::TOO_MANY_REQUESTS => GatewayError::RateLimited {
                status: status.as_u16(),
                retry_after,
                body,
            },
            _ => GatewayError::Status {
                status: status.as_u16(),
                body,
            },
        }
    }
}

impl From<CredentialError> for GatewayError {
    fn from(err: CredentialError) -> Self {
        GatewayError::Authentication(err.to_string())
    }
}

/// Chat-completion client bound to one gateway deployment
#[derive(Clone)]
pub struct GatewayClient {
    client: Client,
    url: String,
    timeout_secs: u64,
}

impl GatewayClient {
    /// Create a client for the configured endpoint and deployment
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("apim-smoke/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: config.chat_completions_url(),
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one chat-completion request with a bearer token
    pub async fn chat_completion(
        &self,
        token: &str,
        request: &ChatCompletionRequest,
    ) -> std::result::Result<ChatCompletionResponse, GatewayError> {
        debug!("Sending chat completion to {}", self.url);
        let start = std::time::Instant::now();

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(token)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    GatewayError::ConnectionFailed(self.url.clone())
                } else {
                    GatewayError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout(self.timeout_secs)
            } else {
                GatewayError::RequestFailed(format!("Failed to read response body: {e}"))
            }
        })?;

        debug!(
            "Response: {} {} in {}ms",
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
            start.elapsed().as_millis()
        );

        if !status.is_success() {
            return Err(GatewayError::from_status(status, retry_after, &body));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;

        if parsed.choices.is_empty() {
            return Err(GatewayError::MalformedResponse(
                "response contained no choices".to_string(),
            ));
        }

        Ok(parsed)
    }
}
