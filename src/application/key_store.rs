use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::{info, warn};

use crate::application::repos::{OptionStore, RepoError};
use crate::domain::purge_key::PurgeKey;

pub const DEFAULT_OPTION_NAME: &str = "remote_purge_key";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("purge key store unavailable: {0}")]
    Unavailable(#[from] RepoError),
}

/// Owns the current purge key on top of an [`OptionStore`].
#[derive(Clone)]
pub struct KeyStore {
    store: Arc<dyn OptionStore>,
    option_name: String,
}

impl KeyStore {
    pub fn new(store: Arc<dyn OptionStore>) -> Self {
        Self::with_option_name(store, DEFAULT_OPTION_NAME)
    }

    pub fn with_option_name(store: Arc<dyn OptionStore>, option_name: impl Into<String>) -> Self {
        Self {
            store,
            option_name: option_name.into(),
        }
    }

    /// Current key, or `None` when nothing (or only a blank value) is stored.
    pub async fn get(&self) -> Result<Option<PurgeKey>, StoreError> {
        let stored = self.store.read_option(&self.option_name).await?;
        let key = stored.and_then(|value| match PurgeKey::new(value) {
            Ok(key) => Some(key),
            Err(err) => {
                warn!(
                    target = "remote_purge::key_store",
                    option = %self.option_name,
                    error = %err,
                    "ignoring blank stored purge key"
                );
                None
            }
        });
        Ok(key)
    }

    /// Replace the stored key with a freshly generated one.
    pub async fn regenerate(&self) -> Result<PurgeKey, StoreError> {
        let key = PurgeKey::generate();
        self.store
            .write_option(&self.option_name, key.as_str())
            .await?;

        counter!("remote_purge_key_regenerations_total").increment(1);
        info!(
            target = "remote_purge::key_store",
            option = %self.option_name,
            fingerprint = %key.fingerprint(),
            "purge key regenerated"
        );
        Ok(key)
    }

    /// Seed a key on first start; an existing key is left untouched.
    pub async fn ensure_initialized(&self) -> Result<PurgeKey, StoreError> {
        if let Some(existing) = self.get().await? {
            return Ok(existing);
        }

        info!(
            target = "remote_purge::key_store",
            option = %self.option_name,
            "no purge key stored; seeding initial key"
        );
        self.regenerate().await
    }
}
