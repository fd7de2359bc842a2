//! Token caching
//!
//! Reuses a token until it is about to expire.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

use super::{AccessToken, CredentialError, TokenProvider};

/// Caching wrapper around another provider, keyed by scope
pub struct CachedTokenProvider<P> {
    inner: P,
    refresh_margin: Duration,
    // Held across the fetch so concurrent callers share one token request.
    tokens: Mutex<HashMap<String, AccessToken>>,
}

impl<P: TokenProvider> CachedTokenProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            refresh_margin: Duration::minutes(5),
            tokens: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<P: TokenProvider> TokenProvider for CachedTokenProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let mut tokens = self.tokens.lock().await;

        if let Some(token) = tokens.get(scope) {
            if !token.is_expiring(Utc::now(), self.refresh_margin) {
                return Ok(token.clone());
            }
            debug!("Cached token for {} is expiring, refreshing", scope);
        }

        let token = self.inner.get_token(scope).await?;
        tokens.insert(scope.to_string(), token.clone());
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingProvider {
        calls: Arc<AtomicUsize>,
        lifetime_secs: i64,
    }

    #[async_trait]
    impl TokenProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(AccessToken::expires_in(
                format!("{scope}-{n}"),
                self.lifetime_secs,
            ))
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl TokenProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        async fn get_token(&self, _scope: &str) -> Result<AccessToken, CredentialError> {
            Err(CredentialError::Unavailable("no credentials".to_string()))
        }
    }

    #[tokio::test]
    async fn test_reuses_valid_token() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = CachedTokenProvider::new(CountingProvider {
            calls: calls.clone(),
            lifetime_secs: 3600,
        });

        let first = provider.get_token("scope-a").await.unwrap();
        let second = provider.get_token("scope-a").await.unwrap();

        assert_eq!(first.token, second.token);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refreshes_expiring_token() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = CachedTokenProvider::new(CountingProvider {
            calls: calls.clone(),
            lifetime_secs: 30,
        });

        let first = provider.get_token("scope-a").await.unwrap();
        let second = provider.get_token("scope-a").await.unwrap();

        assert_ne!(first.token, second.token);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_scopes_are_cached_separately() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = CachedTokenProvider::new(CountingProvider {
            calls: calls.clone(),
            lifetime_secs: 3600,
        });

        provider.get_token("scope-a").await.unwrap();
        provider.get_token("scope-b").await.unwrap();
        provider.get_token("scope-a").await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = Arc::new(CachedTokenProvider::new(CountingProvider {
            calls: calls.clone(),
            lifetime_secs: 3600,
        }));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let provider = provider.clone();
                tokio::spawn(async move { provider.get_token("scope").await })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let provider = CachedTokenProvider::new(FailingProvider);
        assert!(provider.get_token("scope").await.is_err());
        assert!(provider.get_token("scope").await.is_err());
    }
}
