//! Read-only accessors consumed by the admin settings view and the CLI.

use url::Url;

use crate::application::key_store::{KeyStore, StoreError};

pub const DEFAULT_PURGE_PARAM: &str = "purge";
pub const REGENERATED_NOTICE: &str = "Purge key regenerated successfully!";

#[derive(Clone)]
pub struct PurgePanel {
    keys: KeyStore,
    site_url: Url,
    purge_param: String,
}

impl PurgePanel {
    pub fn new(keys: KeyStore, site_url: Url, purge_param: impl Into<String>) -> Self {
        Self {
            keys,
            site_url,
            purge_param: purge_param.into(),
        }
    }

    /// Public URL that purges the cache, or `None` before a key exists.
    pub async fn purge_url(&self) -> Result<Option<Url>, StoreError> {
        let Some(key) = self.keys.get().await? else {
            return Ok(None);
        };

        let mut url = self.site_url.clone();
        let retained: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(name, _)| name != self.purge_param.as_str())
            .map(|(name, value)| (name.into_owned(), value.into_owned()))
            .collect();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.clear();
            for (name, value) in &retained {
                pairs.append_pair(name, value);
            }
            pairs.append_pair(&self.purge_param, key.as_str());
        }
        Ok(Some(url))
    }
}
