//! Token caching for Firestore authentication.
//!
//! Tokens are refreshed a minute before expiry under a write lock, with a
//! double-check so concurrent callers trigger a single refresh. If a refresh
//! fails while the old token is still usable, the old token is returned.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use gcp_auth::TokenProvider;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{FirestoreError, FirestoreResult};

/// Refresh margin: refresh token 60 seconds before expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Conservative token TTL when expiry is unknown (50 minutes).
const TOKEN_DEFAULT_TTL: Duration = Duration::from_secs(50 * 60);

/// OAuth scope for Firestore/Datastore access.
pub const FIRESTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }

    fn is_usable(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

enum TokenSource {
    Provider(Arc<dyn TokenProvider>),
    /// Pre-issued token (emulators, tests)
    Fixed(String),
}

/// Thread-safe token cache with single-flight refresh.
pub struct TokenCache {
    source: TokenSource,
    cache: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    /// Create a new token cache.
    pub fn new(auth: Arc<dyn TokenProvider>) -> Self {
        Self {
            source: TokenSource::Provider(auth),
            cache: RwLock::new(None),
        }
    }

    /// Cache that always hands out `token`.
    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            source: TokenSource::Fixed(token.into()),
            cache: RwLock::new(None),
        }
    }

    /// Invalidate the cached token.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_token(&self) -> FirestoreResult<String> {
        let auth = match &self.source {
            TokenSource::Fixed(token) => return Ok(token.clone()),
            TokenSource::Provider(auth) => auth,
        };

        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref().filter(|c| c.is_valid()) {
                return Ok(cached.access_token.clone());
            }
        }

        let mut cache = self.cache.write().await;

        // Another task may have refreshed while we waited
        if let Some(cached) = cache.as_ref().filter(|c| c.is_valid()) {
            return Ok(cached.access_token.clone());
        }

        match auth.token(&[FIRESTORE_SCOPE]).await {
            Ok(token) => {
                let access_token = token.as_str().to_string();
                let now = Utc::now();
                let exp = token.expires_at();

                let expires_at = if exp > now {
                    (exp - now)
                        .to_std()
                        .map(|ttl| Instant::now() + ttl)
                        .unwrap_or_else(|_| Instant::now() + TOKEN_DEFAULT_TTL)
                } else {
                    // Force a refresh on the next request
                    Instant::now()
                };

                *cache = Some(CachedToken {
                    access_token: access_token.clone(),
                    expires_at,
                });

                debug!("Refreshed Firestore auth token");
                Ok(access_token)
            }
            Err(e) => {
                if let Some(cached) = cache.as_ref().filter(|c| c.is_usable()) {
                    warn!("Token refresh failed, using existing token: {}", e);
                    return Ok(cached.access_token.clone());
                }

                Err(FirestoreError::auth_error(format!("Failed to obtain auth token: {}", e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_constants() {
        assert_eq!(TOKEN_REFRESH_MARGIN, Duration::from_secs(60));
        assert_eq!(TOKEN_DEFAULT_TTL, Duration::from_secs(50 * 60));
        assert!(FIRESTORE_SCOPE.contains("datastore"));
    }

    #[tokio::test]
    async fn test_fixed_token_survives_invalidate() {
        let cache = TokenCache::fixed("static-token");
        assert_eq!(cache.get_token().await.unwrap(), "static-token");
        cache.invalidate().await;
        assert_eq!(cache.get_token().await.unwrap(), "static-token");
    }

    #[test]
    fn test_cached_token_validity() {
        let fresh = CachedToken {
            access_token: "t".into(),
            expires_at: Instant::now() + Duration::from_secs(600),
        };
        assert!(fresh.is_valid());

        let expiring = CachedToken {
            access_token: "t".into(),
            expires_at: Instant::now() + Duration::from_secs(30),
        };
        assert!(!expiring.is_valid());
        assert!(expiring.is_usable());
    }
}
