//! Bearer-token lifecycle for provider credentials.
//!
//! Every gateway call needs a valid OAuth2-style bearer token. Tokens are
//! cached until their expiry instant and refreshed with single-flight
//! coordination: concurrent callers that observe a missing or expired token
//! await one shared authentication exchange instead of each issuing their
//! own.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::{PaymentError, PaymentResult};
use crate::payments::types::ProviderName;

/// A bearer token with its expiry instant.
///
/// Reused only while `now < expires_at`; once expired it is replaced
/// atomically, never handed out.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: Instant,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, ttl: Duration) -> Self {
        Self {
            value: value.into(),
            expires_at: Instant::now() + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// One provider's authentication exchange.
///
/// Implementations perform the credential grant (HTTP basic or
/// client-credentials, depending on the provider) and return a fresh token.
/// They do not retry — retry policy belongs to the caller.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    fn provider(&self) -> ProviderName;

    async fn exchange(&self) -> PaymentResult<AccessToken>;
}

/// Caches the token for one credential and coordinates refreshes.
///
/// The cached slot is guarded by an async mutex held across the exchange,
/// so at most one authentication call is in flight per credential.
pub struct TokenManager<E> {
    exchange: E,
    cached: Mutex<Option<AccessToken>>,
}

impl<E: TokenExchange> TokenManager<E> {
    pub fn new(exchange: E) -> Self {
        Self {
            exchange,
            cached: Mutex::new(None),
        }
    }

    /// Returns a valid bearer token value, refreshing if needed.
    pub async fn bearer(&self) -> PaymentResult<String> {
        let mut slot = self.cached.lock().await;
        if let Some(token) = slot.as_ref() {
            if !token.is_expired() {
                return Ok(token.value.clone());
            }
            tracing::debug!(provider = %self.exchange.provider(), "cached token expired");
        }

        let fresh = self.exchange.exchange().await.map_err(|err| {
            tracing::error!(provider = %self.exchange.provider(), error = %err, "token exchange failed");
            PaymentError::Authentication {
                provider: self.exchange.provider(),
            }
        })?;
        let value = fresh.value.clone();
        *slot = Some(fresh);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct CountingExchange {
        calls: Arc<AtomicU32>,
        ttl: Duration,
        delay: Duration,
    }

    #[async_trait]
    impl TokenExchange for CountingExchange {
        fn provider(&self) -> ProviderName {
            ProviderName::Mpesa
        }

        async fn exchange(&self) -> PaymentResult<AccessToken> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(AccessToken::new(format!("token-{n}"), self.ttl))
        }
    }

    fn manager(calls: Arc<AtomicU32>, ttl: Duration, delay: Duration) -> TokenManager<CountingExchange> {
        TokenManager::new(CountingExchange { calls, ttl, delay })
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_calls_reuse_cached_token() {
        let calls = Arc::new(AtomicU32::new(0));
        let manager = manager(calls.clone(), Duration::from_secs(3600), Duration::ZERO);

        let first = manager.bearer().await.unwrap();
        let second = manager.bearer().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_token_triggers_exactly_one_new_exchange() {
        let calls = Arc::new(AtomicU32::new(0));
        let manager = manager(calls.clone(), Duration::from_secs(3600), Duration::ZERO);

        let first = manager.bearer().await.unwrap();
        tokio::time::advance(Duration::from_secs(3601)).await;
        let second = manager.bearer().await.unwrap();

        assert_ne!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_refresh() {
        let calls = Arc::new(AtomicU32::new(0));
        let manager = Arc::new(manager(
            calls.clone(),
            Duration::from_secs(3600),
            Duration::from_millis(50),
        ));

        let a = Arc::clone(&manager);
        let b = Arc::clone(&manager);
        let (ra, rb) = tokio::join!(
            tokio::spawn(async move { a.bearer().await.unwrap() }),
            tokio::spawn(async move { b.bearer().await.unwrap() }),
        );

        assert_eq!(ra.unwrap(), rb.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    struct FailingExchange;

    #[async_trait]
    impl TokenExchange for FailingExchange {
        fn provider(&self) -> ProviderName {
            ProviderName::Airtel
        }

        async fn exchange(&self) -> PaymentResult<AccessToken> {
            Err(PaymentError::Authentication {
                provider: ProviderName::Airtel,
            })
        }
    }

    #[tokio::test]
    async fn exchange_failure_names_the_provider() {
        let manager = TokenManager::new(FailingExchange);
        let err = manager.bearer().await.unwrap_err();
        assert!(matches!(
            err,
            PaymentError::Authentication {
                provider: ProviderName::Airtel
            }
        ));
    }
}
