//! Bearer token acquisition
//!
//! Probes authenticate to the gateway with a short-lived bearer token issued
//! by an external identity provider. Everything here sits behind the
//! [`TokenProvider`] trait; the rest of the crate only asks for "a valid token
//! for scope S".

mod cache;
mod credential;

pub use cache::CachedTokenProvider;
pub use credential::{
    AzureCliCredential, ClientSecretCredential, DefaultCredential, StaticTokenCredential,
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use thiserror::Error;

/// Credential errors
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Credential unavailable: {0}")]
    Unavailable(String),

    #[error("Token request failed: {0}")]
    RequestFailed(String),

    #[error("Identity provider rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid token response: {0}")]
    InvalidResponse(String),
}

/// Bearer token with its expiry
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// Token valid for `secs` seconds from now, saturating at the latest
    /// representable instant
    pub fn expires_in(token: impl Into<String>, secs: i64) -> Self {
        let expires_at = Duration::try_seconds(secs)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self::new(token, expires_at)
    }

    /// True when the token expires within `margin` of `now`
    pub fn is_expiring(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at - margin <= now
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of bearer tokens for a scope
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Short name used in diagnostics
    fn name(&self) -> &str;

    /// Fetch a valid bearer token for `scope`
    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError>;
}
