//! In-process option store used when no database is configured.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::application::repos::{OptionStore, RepoError};

/// Options held in memory; values do not survive a restart.
#[derive(Clone, Default)]
pub struct MemoryOptionStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryOptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_option(name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut entries = HashMap::new();
        entries.insert(name.into(), value.into());
        Self {
            entries: Arc::new(RwLock::new(entries)),
        }
    }
}

#[async_trait]
impl OptionStore for MemoryOptionStore {
    async fn read_option(&self, name: &str) -> Result<Option<String>, RepoError> {
        let guard = self.entries.read().await;
        Ok(guard.get(name).cloned())
    }

    async fn write_option(&self, name: &str, value: &str) -> Result<(), RepoError> {
        let mut guard = self.entries.write().await;
        guard.insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_overwrites_previous_value() {
        let store = MemoryOptionStore::with_option("key", "old");
        store.write_option("key", "new").await.expect("write");

        assert_eq!(
            store.read_option("key").await.expect("read").as_deref(),
            Some("new")
        );
        assert!(store.read_option("other").await.expect("read").is_none());
    }
}
