use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::application::nonce::NonceService;

/// Longest lifetime a regeneration nonce may be issued with.
pub const MAX_NONCE_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Clone)]
struct IssuedNonce {
    scope: String,
    expires_at: Instant,
}

/// Process-local nonce registry.
///
/// Outstanding nonces expire after `ttl` (clamped to [`MAX_NONCE_TTL`]). At
/// most `capacity` are tracked. Every nonce shares the same lifetime, so the
/// least recently issued one is also the closest to expiry and is dropped
/// first when the registry is full.
#[derive(Debug)]
pub struct InMemoryNonceService {
    ttl: Duration,
    issued: Mutex<LruCache<String, IssuedNonce>>,
}

impl InMemoryNonceService {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            ttl: ttl.min(MAX_NONCE_TTL),
            issued: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub async fn outstanding(&self) -> usize {
        self.issued.lock().await.len()
    }
}

#[async_trait]
impl NonceService for InMemoryNonceService {
    async fn create(&self, scope: &str) -> String {
        let now = Instant::now();
        // Unreachable with the clamped ttl; an unrepresentable deadline is
        // issued already expired.
        let expires_at = now.checked_add(self.ttl).unwrap_or(now);

        let token = Uuid::new_v4().simple().to_string();
        let dropped = self.issued.lock().await.push(
            token.clone(),
            IssuedNonce {
                scope: scope.to_string(),
                expires_at,
            },
        );
        if dropped.is_some() {
            debug!(
                target = "remote_purge::nonce",
                "nonce registry full; oldest nonce dropped"
            );
        }
        token
    }

    async fn verify(&self, token: &str, scope: &str) -> bool {
        let Some(issued) = self.issued.lock().await.pop(token) else {
            debug!(target = "remote_purge::nonce", "unknown or consumed nonce");
            return false;
        };

        if issued.scope != scope {
            debug!(
                target = "remote_purge::nonce",
                expected = scope,
                actual = %issued.scope,
                "nonce scope mismatch"
            );
            return false;
        }

        issued.expires_at > Instant::now()
    }
}
