//! Lazily refreshed access tokens, one per provider product

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use log::info;

use super::{ProviderError, ServiceProduct};

/// Bearer token issued by a provider
#[derive(Debug, Clone, PartialEq)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenPolicy {
    /// Refresh tokens expiring within this margin
    pub refresh_margin: Duration,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            refresh_margin: Duration::minutes(10),
        }
    }
}

/// Token cache with refresh on demand (no background thread)
#[derive(Debug, Default)]
pub struct TokenCache {
    policy: TokenPolicy,
    tokens: Mutex<HashMap<ServiceProduct, AccessToken>>,
}

impl TokenCache {
    pub fn new(policy: TokenPolicy) -> Self {
        Self {
            policy,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    fn needs_refresh(&self, token: Option<&AccessToken>, now: DateTime<Utc>) -> bool {
        match token {
            None => true,
            Some(t) => t.expires_at <= now + self.policy.refresh_margin,
        }
    }

    /// Cached token for `product`, fetching a new one when missing or expiring soon
    pub fn get_or_refresh<F>(&self, product: ServiceProduct, now: DateTime<Utc>, fetch: F) -> Result<String, ProviderError>
    where
        F: FnOnce(ServiceProduct) -> Result<AccessToken, ProviderError>,
    {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());

        if self.needs_refresh(tokens.get(&product), now) {
            let fresh = fetch(product)?;
            info!("Refreshed {} token, expires {}", product.as_str(), fresh.expires_at);
            tokens.insert(product, fresh);
        }

        tokens
            .get(&product)
            .map(|t| t.value.clone())
            .ok_or(ProviderError::TokenExpired)
    }

    /// Drop the cached token so the next call fetches a new one
    pub fn invalidate(&self, product: ServiceProduct) {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        tokens.remove(&product);
    }

    /// Expiry of the cached token, if any
    pub fn expires_at(&self, product: ServiceProduct) -> Option<DateTime<Utc>> {
        let tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        tokens.get(&product).map(|t| t.expires_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn token(value: &str, expires_at: DateTime<Utc>) -> AccessToken {
        AccessToken {
            value: value.to_string(),
            expires_at,
        }
    }

    #[test]
    fn test_token_is_cached_until_margin() {
        let cache = TokenCache::default();
        let now = Utc::now();
        let fetches = Cell::new(0);

        let fetch = |_: ServiceProduct| -> Result<AccessToken, ProviderError> {
            fetches.set(fetches.get() + 1);
            Ok(token(&format!("t{}", fetches.get()), now + Duration::hours(1)))
        };

        assert_eq!(cache.get_or_refresh(ServiceProduct::Collection, now, fetch).unwrap(), "t1");
        assert_eq!(cache.get_or_refresh(ServiceProduct::Collection, now, fetch).unwrap(), "t1");
        assert_eq!(fetches.get(), 1);

        // 55 minutes later the token is inside the 10 minute margin
        let later = now + Duration::minutes(55);
        assert_eq!(cache.get_or_refresh(ServiceProduct::Collection, later, fetch).unwrap(), "t2");

        // Products have separate tokens
        assert_eq!(cache.get_or_refresh(ServiceProduct::Disbursement, now, fetch).unwrap(), "t3");
    }

    #[test]
    fn test_invalidate_forces_refresh() {
        let cache = TokenCache::default();
        let now = Utc::now();

        cache
            .get_or_refresh(ServiceProduct::Collection, now, |_| Ok(token("a", now + Duration::hours(1))))
            .unwrap();
        cache.invalidate(ServiceProduct::Collection);
        assert!(cache.expires_at(ServiceProduct::Collection).is_none());

        let refreshed = cache
            .get_or_refresh(ServiceProduct::Collection, now, |_| Ok(token("b", now + Duration::hours(1))))
            .unwrap();
        assert_eq!(refreshed, "b");

        let failed = cache.get_or_refresh(ServiceProduct::Disbursement, now, |_| {
            Err(ProviderError::Transient("down".into()))
        });
        assert!(matches!(failed, Err(ProviderError::Transient(_))));
    }
}
