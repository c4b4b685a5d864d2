//! Operator-triggered purge key regeneration guarded by a single-use nonce.

use std::sync::Arc;

use metrics::counter;
use tracing::{info, warn};
use url::form_urlencoded;

use crate::application::key_store::{KeyStore, StoreError};
use crate::application::nonce::{NonceService, REGENERATE_SCOPE};

pub const DEFAULT_NONCE_PARAM: &str = "regen";
pub const DEFAULT_STATUS_PARAM: &str = "regenerated";
pub const ERROR_PARAM: &str = "error";
pub const INVALID_NONCE_ERROR: &str = "invalid_nonce";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegenerationOutcome {
    Regenerated,
    InvalidNonce,
}

/// Query parameter names used by the regeneration surface.
#[derive(Debug, Clone)]
pub struct RegenerationParams {
    pub nonce_param: String,
    pub status_param: String,
}

impl Default for RegenerationParams {
    fn default() -> Self {
        Self {
            nonce_param: DEFAULT_NONCE_PARAM.to_string(),
            status_param: DEFAULT_STATUS_PARAM.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct KeyRegenerationGuard {
    keys: KeyStore,
    nonces: Arc<dyn NonceService>,
    params: RegenerationParams,
}

impl KeyRegenerationGuard {
    pub fn new(keys: KeyStore, nonces: Arc<dyn NonceService>, params: RegenerationParams) -> Self {
        Self {
            keys,
            nonces,
            params,
        }
    }

    pub fn params(&self) -> &RegenerationParams {
        &self.params
    }

    /// Consume `nonce` and rotate the key when it verifies.
    ///
    /// `None` means no regeneration was requested. The nonce is spent before
    /// the store is touched, so a failing store never lets it be replayed.
    pub async fn maybe_regenerate(
        &self,
        nonce: Option<&str>,
    ) -> Result<Option<RegenerationOutcome>, StoreError> {
        let Some(nonce) = nonce else {
            return Ok(None);
        };

        if !self.nonces.verify(nonce, REGENERATE_SCOPE).await {
            counter!("remote_purge_nonce_rejections_total").increment(1);
            warn!(
                target = "remote_purge::regeneration",
                "purge key regeneration rejected: invalid nonce"
            );
            return Ok(Some(RegenerationOutcome::InvalidNonce));
        }

        let key = self.keys.regenerate().await?;
        info!(
            target = "remote_purge::regeneration",
            fingerprint = %key.fingerprint(),
            "purge key regenerated by operator"
        );
        Ok(Some(RegenerationOutcome::Regenerated))
    }

    /// Location to redirect to after handling a regeneration request on
    /// `path` with the original `query`.
    pub fn redirect_target(
        &self,
        path: &str,
        query: Option<&str>,
        outcome: RegenerationOutcome,
    ) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (name, value) in form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            if name == self.params.nonce_param
                || name == self.params.status_param
                || name == ERROR_PARAM
            {
                continue;
            }
            serializer.append_pair(&name, &value);
        }

        match outcome {
            RegenerationOutcome::Regenerated => {
                serializer.append_pair(&self.params.status_param, "true");
            }
            RegenerationOutcome::InvalidNonce => {
                serializer.append_pair(&self.params.status_param, "0");
                serializer.append_pair(ERROR_PARAM, INVALID_NONCE_ERROR);
            }
        }

        format!("{path}?{}", serializer.finish())
    }

    /// Link that triggers a regeneration from `path`, carrying a fresh nonce.
    pub async fn regenerate_url(&self, path: &str) -> String {
        let nonce = self.nonces.create(REGENERATE_SCOPE).await;
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair(&self.params.nonce_param, &nonce)
            .finish();
        format!("{path}?{query}")
    }
}
