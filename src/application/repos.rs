//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Named key-value options backing the purge key.
///
/// `write` replaces the whole value in a single operation; a concurrent
/// `read` observes either the previous value or the new one.
#[async_trait]
pub trait OptionStore: Send + Sync {
    async fn read_option(&self, name: &str) -> Result<Option<String>, RepoError>;
    async fn write_option(&self, name: &str, value: &str) -> Result<(), RepoError>;
    async fn health_check(&self) -> Result<(), RepoError>;
}
