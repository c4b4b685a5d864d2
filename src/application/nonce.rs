use async_trait::async_trait;

/// Scope bound to nonces that authorize a purge key regeneration.
pub const REGENERATE_SCOPE: &str = "remote_purge_regenerate";

/// Issues and verifies single-use tokens tied to an action scope.
///
/// `verify` consumes the token: a second call with the same value returns
/// `false` regardless of the first result.
#[async_trait]
pub trait NonceService: Send + Sync {
    async fn create(&self, scope: &str) -> String;
    async fn verify(&self, token: &str, scope: &str) -> bool;
}
